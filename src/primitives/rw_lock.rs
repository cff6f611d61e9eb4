//! Custom readers-writers lock with writer priority and batch reader wake.
//!
//! Not a replacement for `tokio::sync::RwLock`: the point of this lock is to
//! expose the textbook state machine (active/queued counts, explicit
//! promotion rules) so the readers-writers simulator can visualize it and
//! tests can sample it.
//!
//! # Fairness Contract
//!
//! - A newly arriving reader never jumps ahead of an already-queued writer,
//!   so writers cannot starve behind a continuous stream of readers.
//! - `release_read` promotes exactly one queued writer once the reader count
//!   hits zero.
//! - `release_write` batch-wakes **all** queued readers if any exist,
//!   otherwise promotes exactly one queued writer.
//! - Write-after-write ordering across contending writers is not guaranteed;
//!   only mutual exclusion and no-starvation are.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Point-in-time view of the lock's state machine, for snapshots and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RwLockStats {
    pub active_readers: usize,
    pub active_writer: bool,
    pub queued_readers: usize,
    pub queued_writers: usize,
}

struct LockState {
    active_readers: usize,
    active_writer: bool,
    queued_readers: VecDeque<oneshot::Sender<()>>,
    queued_writers: VecDeque<oneshot::Sender<()>>,
}

/// Many concurrent readers or one exclusive writer.
///
/// All state transitions happen under one internal mutex; no transition is
/// observable half-applied. The promoter updates the state *before* waking a
/// waiter, so a woken task resumes with the lock already granted to it and
/// touches no shared state itself.
///
/// A waiter whose task was cancelled while queued is skipped at promotion
/// time (its wake channel is dead). Counts can go stale only when a task is
/// cancelled *between* being granted the lock and resuming, which simulators
/// confine to shutdown: every run builds a fresh lock.
pub struct FairReadWriteLock {
    inner: Mutex<LockState>,
}

impl FairReadWriteLock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LockState {
                active_readers: 0,
                active_writer: false,
                queued_readers: VecDeque::new(),
                queued_writers: VecDeque::new(),
            }),
        }
    }

    // Lock poisoning carries no meaning here (no invariants survive a panic
    // mid-transition anyway), so recover the guard instead of propagating.
    fn state(&self) -> MutexGuard<'_, LockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquires shared read access.
    ///
    /// Succeeds immediately when no writer is active **and** none is queued;
    /// otherwise the caller queues and resumes only once a `release_write`
    /// batch-wake promotes it.
    pub async fn acquire_read(&self) {
        let wake = {
            let mut s = self.state();
            if !s.active_writer && s.queued_writers.is_empty() {
                s.active_readers += 1;
                return;
            }
            let (tx, rx) = oneshot::channel();
            s.queued_readers.push_back(tx);
            rx
        };
        // Err means the lock itself was dropped; nothing left to guard.
        let _ = wake.await;
    }

    /// Releases shared read access, promoting one queued writer when the
    /// last reader leaves.
    pub fn release_read(&self) {
        let mut s = self.state();
        s.active_readers = s.active_readers.saturating_sub(1);
        if s.active_readers == 0 {
            Self::promote_one_writer(&mut s);
        }
    }

    /// Acquires exclusive write access.
    ///
    /// Succeeds immediately when there is no active reader or writer;
    /// otherwise the caller queues and resumes once a release promotes it.
    pub async fn acquire_write(&self) {
        let wake = {
            let mut s = self.state();
            if s.active_readers == 0 && !s.active_writer {
                s.active_writer = true;
                return;
            }
            let (tx, rx) = oneshot::channel();
            s.queued_writers.push_back(tx);
            rx
        };
        let _ = wake.await;
    }

    /// Releases exclusive write access.
    ///
    /// Queued readers are promoted together (batch wake, matching the "many
    /// readers, one writer" contract); only when none are queued is a single
    /// queued writer promoted instead.
    pub fn release_write(&self) {
        let mut s = self.state();
        s.active_writer = false;
        if !Self::wake_queued_readers(&mut s) {
            Self::promote_one_writer(&mut s);
        }
    }

    /// Samples the state machine.
    pub fn stats(&self) -> RwLockStats {
        let s = self.state();
        RwLockStats {
            active_readers: s.active_readers,
            active_writer: s.active_writer,
            queued_readers: s.queued_readers.len(),
            queued_writers: s.queued_writers.len(),
        }
    }

    fn promote_one_writer(s: &mut LockState) {
        // Skip waiters whose task was cancelled while queued.
        while let Some(tx) = s.queued_writers.pop_front() {
            if tx.send(()).is_ok() {
                s.active_writer = true;
                return;
            }
        }
        // Every queued writer was dead; wake any queued readers instead so a
        // live waiter is never stranded on a free lock.
        Self::wake_queued_readers(s);
    }

    /// Batch-wakes all queued readers. Returns `false` when none were alive.
    fn wake_queued_readers(s: &mut LockState) -> bool {
        let mut woke = false;
        while let Some(tx) = s.queued_readers.pop_front() {
            if tx.send(()).is_ok() {
                s.active_readers += 1;
                woke = true;
            }
        }
        woke
    }
}

impl Default for FairReadWriteLock {
    fn default() -> Self {
        Self::new()
    }
}
