//! Orchestration of the full simulator suite.
//!
//! # Main Components
//!
//! - [`SimSuite`] - Owns one instance of every simulator and tears them all
//!   down together
//! - [`setup_tracing`](tracing::setup_tracing) - Structured-logging setup

pub mod sim_suite;
pub mod tracing;

pub use self::sim_suite::SimSuite;
pub use self::tracing::setup_tracing;
