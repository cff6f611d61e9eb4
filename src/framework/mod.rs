//! Generic plumbing shared by every simulator.
//!
//! # Main Components
//!
//! - [`Simulation`] - The uniform start/stop control surface
//! - [`TaskGroup`] / [`CancelSignal`] - Actor-loop ownership and cooperative cancellation
//! - [`SimStatus`] / [`SimError`] - Observable status and loop-boundary errors
//! - [`Pacing`] - Injectable delay policy (deterministic in tests)
//! - [`ActivityLog`] - Capped observational log carried in snapshots

pub mod core;
pub mod log;
pub mod pacing;

// Re-export core types for convenience
pub use self::core::*;
pub use self::log::{now_ms, ActivityLog, LogEntry, LogKind, LOG_CAPACITY};
pub use self::pacing::Pacing;
