#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Sync-Sim
//!
//! > **A simulation engine for five classic synchronization problems.**
//!
//! This crate simulates the bounded-buffer producer/consumer, message-passing
//! producer/consumer, readers-writers, dining-philosophers and sleeping-barber
//! problems, and exposes their evolving internal state for observation. The
//! interesting part is not the visualization (there is none here; that is a
//! collaborator's job) but the correctness of each simulator's concurrency
//! control: mutual exclusion, fairness, deadlock avoidance and bounded-resource
//! backpressure under independently-timed actors.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Primitives own their state
//!
//! All shared mutable state (lock counters, pool counts, fork availability)
//! lives inside the primitive that owns it and is mutated only under that
//! primitive's own exclusion region. Actors never touch shared state directly.
//!
//! ### Snapshots out, nothing in
//!
//! Each simulator publishes an immutable snapshot through a `tokio::sync::watch`
//! channel after every state transition. External readers get copies (or a
//! watch receiver); they never hold a live reference into simulation-internal
//! storage, and no simulator reads another's state.
//!
//! ### Teardown is synchronous
//!
//! `stop()` cancels every actor loop through an explicit cancellation signal
//! checked at every suspension point, **awaits** full teardown and resets all
//! state before returning. A subsequent `start()` begins from a clean slate:
//! no leaked blocked actors, no stale resource ownership.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Plumbing ([`framework`])
//! The uniform [`Simulation`](framework::Simulation) trait, task-group
//! cancellation, the injectable [`Pacing`](framework::Pacing) delay policy and
//! the capped [`ActivityLog`](framework::ActivityLog).
//!
//! ### 2. The Primitives ([`primitives`])
//! - [`BoundedResourcePool`](primitives::BoundedResourcePool): counting
//!   semaphore over interchangeable units (chairs, buffer slots).
//! - [`FairReadWriteLock`](primitives::FairReadWriteLock): many readers or one
//!   writer, writer priority, batch reader wake, and no starvation.
//! - [`ForkTable`](primitives::ForkTable): atomic paired acquisition; the
//!   dining philosophers' deadlock never forms.
//!
//! ### 3. The Simulators
//! [`bounded_buffer`], [`message_passing`], [`readers_writers`], [`dining`]
//! and [`barber`]: each an independent actor system built from the pieces
//! above, with its own snapshot type and tests.
//!
//! ### 4. The Orchestrator ([`lifecycle`])
//! [`SimSuite`](lifecycle::SimSuite) wires up one instance of everything and
//! tears it all down together; [`setup_tracing`](lifecycle::setup_tracing)
//! configures structured logging.
//!
//! ## 🚀 Quick Start
//!
//! ```ignore
//! use sync_sim::framework::{Pacing, Simulation};
//! use sync_sim::lifecycle::SimSuite;
//!
//! let mut suite = SimSuite::new(Pacing::Random);
//! suite.dining.start();
//!
//! let snapshot = suite.dining.snapshot();
//! println!("{:?}", snapshot.philosophers);
//!
//! suite.shutdown().await;
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod barber;
pub mod bounded_buffer;
pub mod dining;
pub mod framework;
pub mod lifecycle;
pub mod message_passing;
pub mod primitives;
pub mod readers_writers;
