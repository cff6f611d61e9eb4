//! # Observability & Tracing
//!
//! Structured logging for the engine via the `tracing` crate.
//!
//! Every simulator logs its lifecycle (`Starting`, `Stopped`) and its actor
//! loops log failures with structured fields (`sim`, `role`, `error`). The
//! in-snapshot [`ActivityLog`](crate::framework::ActivityLog) is separate:
//! that one is part of the observable state and is what a presentation layer
//! renders; `tracing` output is for developers.
//!
//! ## Usage
//!
//! ```bash
//! # Compact logs
//! RUST_LOG=info cargo test -- --nocapture
//!
//! # Per-module filtering
//! RUST_LOG=sync_sim::barber=debug cargo test -- --nocapture
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // Don't show module paths - the `sim` field carries context
        .compact()
        .init();
}
