//! Synchronization primitives the simulators are built from.
//!
//! Each primitive owns its state exclusively and mutates it only inside its
//! own exclusion region; actors never touch the state directly, and snapshot
//! accessors return copies.
//!
//! # Main Components
//!
//! - [`BoundedResourcePool`] - Counting-semaphore pool of interchangeable units
//! - [`FairReadWriteLock`] - Many readers / one writer with writer priority
//! - [`ForkTable`] - Atomic paired acquisition for the dining philosophers

pub mod fork_table;
pub mod pool;
pub mod rw_lock;

pub use fork_table::{ForkTable, ForkTableError};
pub use pool::{BoundedResourcePool, PoolError};
pub use rw_lock::{FairReadWriteLock, RwLockStats};
