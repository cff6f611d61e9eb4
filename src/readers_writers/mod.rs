//! # Readers-Writers Simulator
//!
//! A fixed population of reader and writer actors contends for one shared
//! value through the [`FairReadWriteLock`]. Each actor cycles
//! `Idle → Waiting → Active → Idle`; writers replace the shared value on
//! entering `Active`, readers only observe it.
//!
//! Per-actor counters increment on every successful `Active` entry, and every
//! read/write is appended to the snapshot's activity log.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::framework::{
    now_ms, ActivityLog, CancelSignal, LogKind, Pacing, SimStatus, Simulation, TaskGroup,
};
use crate::primitives::FairReadWriteLock;
use serde::Serialize;

// Default cadence of the simulation, in milliseconds.
const READ_HOLD_MS: (u64, u64) = (1000, 2000);
const READ_REST_MS: (u64, u64) = (500, 1500);
const WRITE_HOLD_MS: (u64, u64) = (2000, 3000);
const WRITE_REST_MS: (u64, u64) = (1000, 2000);

/// Lifecycle phase of a reader or writer actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActorPhase {
    Idle,
    Waiting,
    Active,
}

/// One reader actor as last published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReaderSnapshot {
    pub id: usize,
    pub phase: ActorPhase,
    pub read_count: u64,
}

/// One writer actor as last published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriterSnapshot {
    pub id: usize,
    pub phase: ActorPhase,
    pub write_count: u64,
}

/// Full observable state of the simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadersWritersSnapshot {
    pub status: SimStatus,
    pub readers: Vec<ReaderSnapshot>,
    pub writers: Vec<WriterSnapshot>,
    /// The value writers replace and readers observe.
    pub shared_value: String,
    pub log: ActivityLog,
}

impl ReadersWritersSnapshot {
    fn initial(config: &ReadersWritersConfig) -> Self {
        Self {
            status: SimStatus::Idle,
            readers: (0..config.readers)
                .map(|id| ReaderSnapshot {
                    id,
                    phase: ActorPhase::Idle,
                    read_count: 0,
                })
                .collect(),
            writers: (0..config.writers)
                .map(|id| WriterSnapshot {
                    id,
                    phase: ActorPhase::Idle,
                    write_count: 0,
                })
                .collect(),
            shared_value: String::new(),
            log: ActivityLog::new(),
        }
    }
}

/// Population and pacing configuration.
#[derive(Debug, Clone)]
pub struct ReadersWritersConfig {
    pub readers: usize,
    pub writers: usize,
    pub pacing: Pacing,
}

impl Default for ReadersWritersConfig {
    fn default() -> Self {
        Self {
            readers: 3,
            writers: 2,
            pacing: Pacing::Random,
        }
    }
}

struct Shared {
    state: watch::Sender<ReadersWritersSnapshot>,
}

impl Shared {
    fn set_reader(&self, id: usize, phase: ActorPhase) {
        self.state.send_modify(|s| {
            if let Some(reader) = s.readers.get_mut(id) {
                reader.phase = phase;
            }
        });
    }

    fn set_writer(&self, id: usize, phase: ActorPhase) {
        self.state.send_modify(|s| {
            if let Some(writer) = s.writers.get_mut(id) {
                writer.phase = phase;
            }
        });
    }

    /// Reader enters `Active`: count the read and log the observed value,
    /// all in one exclusion region.
    fn record_read(&self, id: usize) {
        self.state.send_modify(|s| {
            if let Some(reader) = s.readers.get_mut(id) {
                reader.phase = ActorPhase::Active;
                reader.read_count += 1;
            }
            let value = s.shared_value.clone();
            s.log
                .push(LogKind::Info, format!("Reader {id} reading \"{value}\""));
        });
    }

    /// Writer enters `Active`: install the new value, count the write, log.
    fn record_write(&self, id: usize, value: String) {
        self.state.send_modify(|s| {
            if let Some(writer) = s.writers.get_mut(id) {
                writer.phase = ActorPhase::Active;
                writer.write_count += 1;
            }
            s.shared_value = value.clone();
            s.log
                .push(LogKind::Success, format!("Writer {id} wrote \"{value}\""));
        });
    }
}

/// The readers-writers simulator.
pub struct ReadersWritersSim {
    config: ReadersWritersConfig,
    shared: Arc<Shared>,
    group: Option<TaskGroup>,
}

impl ReadersWritersSim {
    pub fn new(config: ReadersWritersConfig) -> Self {
        let (state, _) = watch::channel(ReadersWritersSnapshot::initial(&config));
        Self {
            config,
            shared: Arc::new(Shared { state }),
            group: None,
        }
    }

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> ReadersWritersSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ReadersWritersSnapshot> {
        self.shared.state.subscribe()
    }

    /// Live actor loops, for idempotence checks.
    pub fn actor_count(&self) -> usize {
        self.group.as_ref().map_or(0, TaskGroup::len)
    }
}

impl Default for ReadersWritersSim {
    fn default() -> Self {
        Self::new(ReadersWritersConfig::default())
    }
}

#[async_trait::async_trait]
impl Simulation for ReadersWritersSim {
    fn name(&self) -> &'static str {
        "readers-writers"
    }

    fn start(&mut self) {
        if self.group.is_some() {
            debug!(sim = self.name(), "Already running");
            return;
        }
        info!(
            sim = self.name(),
            readers = self.config.readers,
            writers = self.config.writers,
            "Starting"
        );

        let mut group = TaskGroup::new();
        // Every run gets a fresh lock so no stale ownership survives a stop.
        let lock = Arc::new(FairReadWriteLock::new());
        let config = self.config.clone();
        self.shared.state.send_modify(|s| {
            *s = ReadersWritersSnapshot::initial(&config);
            s.status = SimStatus::Running;
        });

        for id in 0..self.config.readers {
            let shared = self.shared.clone();
            let lock = lock.clone();
            let pacing = self.config.pacing;
            let signal = group.signal();
            group.spawn(reader_loop(id, shared, lock, pacing, signal));
        }
        for id in 0..self.config.writers {
            let shared = self.shared.clone();
            let lock = lock.clone();
            let pacing = self.config.pacing;
            let signal = group.signal();
            group.spawn(writer_loop(id, shared, lock, pacing, signal));
        }

        self.group = Some(group);
    }

    async fn stop(&mut self) {
        let Some(group) = self.group.take() else {
            debug!(sim = self.name(), "Already stopped");
            return;
        };
        group.shutdown().await;
        let config = self.config.clone();
        self.shared
            .state
            .send_modify(|s| *s = ReadersWritersSnapshot::initial(&config));
        info!(sim = self.name(), "Stopped");
    }

    fn is_running(&self) -> bool {
        self.group.is_some()
    }
}

async fn reader_loop(
    id: usize,
    shared: Arc<Shared>,
    lock: Arc<FairReadWriteLock>,
    pacing: Pacing,
    mut cancel: CancelSignal,
) {
    loop {
        shared.set_reader(id, ActorPhase::Waiting);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = lock.acquire_read() => {}
        }

        shared.record_read(id);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = pacing.rest(READ_HOLD_MS.0, READ_HOLD_MS.1) => {}
        }
        shared.set_reader(id, ActorPhase::Idle);
        lock.release_read();

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = pacing.rest(READ_REST_MS.0, READ_REST_MS.1) => {}
        }
    }
}

async fn writer_loop(
    id: usize,
    shared: Arc<Shared>,
    lock: Arc<FairReadWriteLock>,
    pacing: Pacing,
    mut cancel: CancelSignal,
) {
    loop {
        shared.set_writer(id, ActorPhase::Waiting);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = lock.acquire_write() => {}
        }

        let value = format!("Data written by Writer {id} at {}", now_ms());
        shared.record_write(id, value);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = pacing.rest(WRITE_HOLD_MS.0, WRITE_HOLD_MS.1) => {}
        }
        shared.set_writer(id, ActorPhase::Idle);
        lock.release_write();

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = pacing.rest(WRITE_REST_MS.0, WRITE_REST_MS.1) => {}
        }
    }
}
