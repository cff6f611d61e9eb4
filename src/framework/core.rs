//! # Core Simulation Framework
//!
//! This module defines the generic building blocks shared by every simulator.
//!
//! ## Key Types
//!
//! - [`Simulation`]: The control surface every simulator exposes to the outside.
//! - [`TaskGroup`]: Owns the spawned actor loops of one simulator run and tears
//!   them down on shutdown.
//! - [`CancelSignal`]: Cooperative cancellation checked at every suspension point.
//! - [`SimStatus`]: The observable lifecycle status of a simulator.
//! - [`SimError`]: Common errors surfaced by actor loops.

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::primitives::{ForkTableError, PoolError};

// =============================================================================
// 1. STATUS & ERRORS
// =============================================================================

/// Observable lifecycle status of a simulator (or of one side of one, for the
/// message-passing simulator where producer and consumer run independently).
///
/// # State Machine
/// `Idle → Running → Idle` in the normal case. An actor-loop failure moves the
/// status to `Error`; the simulator stops making progress but does not crash
/// the process, and an explicit `stop()` + `start()` is required to recover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SimStatus {
    /// Not running; all state is at its initial value.
    Idle,
    /// Actor loops are live.
    Running,
    /// An actor loop failed. The message is the only error channel that
    /// crosses the engine boundary.
    Error(String),
}

impl SimStatus {
    /// Whether the status represents a live simulator.
    pub fn is_running(&self) -> bool {
        matches!(self, SimStatus::Running)
    }
}

/// Errors that can occur inside an actor loop.
///
/// # Architecture Note
/// Actor loops return `Result<(), SimError>`. The spawn wrapper in each
/// simulator catches the `Err` at the loop boundary and converts it into
/// [`SimStatus::Error`] on that simulator's snapshot. Errors never propagate
/// to other simulators and never panic.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SimError {
    /// A resource pool was misused (e.g. released beyond capacity).
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// The fork table was misused (e.g. releasing forks that were not held).
    #[error(transparent)]
    ForkTable(#[from] ForkTableError),
    /// A hand-off channel closed while the loop still needed it.
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
    /// A fault injected for demonstration purposes.
    #[error("injected fault: {0}")]
    Fault(String),
}

// =============================================================================
// 2. CANCELLATION
// =============================================================================

/// Cooperative cancellation signal handed to every actor loop.
///
/// Loops race their blocking operations against [`CancelSignal::cancelled`]
/// with `tokio::select!`, so a `stop()` call interrupts them at the next
/// suspension point rather than waiting for the current cycle to finish.
#[derive(Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// Whether shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been requested.
    ///
    /// Also resolves if the owning [`TaskGroup`] was dropped, which only
    /// happens during teardown.
    pub async fn cancelled(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                break;
            }
        }
    }
}

// =============================================================================
// 3. TASK GROUP
// =============================================================================

/// Owns the spawned actor loops of one simulator run.
///
/// # Architecture Note
/// This is the engine's answer to "no leaked blocked actors": `start()`
/// creates a fresh group and registers every loop in it; `stop()` consumes the
/// group, flips the cancellation signal and then **awaits every handle**
/// before returning. After shutdown there is nothing left running and the
/// simulator can rebuild its shared state for the next run.
pub struct TaskGroup {
    cancel_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl TaskGroup {
    /// Creates an empty group with an un-flipped cancellation signal.
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            cancel_tx,
            handles: Vec::new(),
        }
    }

    /// A fresh cancellation signal tied to this group.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal(self.cancel_tx.subscribe())
    }

    /// Spawns a future on the tokio runtime and registers its handle.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handles.push(tokio::spawn(future));
    }

    /// Number of registered actor loops. Used by idempotence checks.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the group has no registered loops.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signals cancellation and awaits every registered loop.
    ///
    /// A panicked loop is logged and otherwise ignored: the caller is tearing
    /// the whole run down anyway and will rebuild state from scratch.
    pub async fn shutdown(mut self) {
        debug!(tasks = self.handles.len(), "Task group shutting down");
        let _ = self.cancel_tx.send(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = ?e, "Actor loop panicked during shutdown");
            }
        }
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// 4. THE SIMULATION TRAIT
// =============================================================================

/// The control/observation surface a simulator exposes to its presentation
/// layer.
///
/// # Architecture Note
/// The presentation layer holds one `Box<dyn Simulation>` per screen and only
/// ever starts, stops and observes. Snapshots are exposed by each concrete
/// simulator (they differ per problem); this trait covers the part that is
/// uniform.
///
/// Both operations are idempotent:
/// - `start()` is a no-op while the simulator is already running (the actor
///   population never grows past the configured one).
/// - `stop()` is a no-op while idle, and a second call observes the same
///   reset state as the first.
#[async_trait::async_trait]
pub trait Simulation: Send {
    /// Stable human-readable name, used in logs.
    fn name(&self) -> &'static str;

    /// Spawns the configured actor population. No-op if already running.
    fn start(&mut self);

    /// Cancels every actor loop, awaits full teardown and resets all state
    /// to its initial value before returning.
    async fn stop(&mut self);

    /// Whether actor loops are currently live.
    fn is_running(&self) -> bool;
}
