//! Counting-semaphore pool over a fixed number of interchangeable units.
//!
//! Used wherever plain mutual-exclusion-over-a-count suffices: waiting-room
//! chairs and buffer slots. There is no priority policy; any blocked acquirer
//! may be woken.

use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors from misusing a [`BoundedResourcePool`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PoolError {
    /// More units were released than the pool holds. A release must always
    /// pair with a prior acquisition, so this is a defect signal.
    #[error("released more units than the pool capacity of {0}")]
    ReleaseOverflow(usize),
    /// The pool was torn down while a caller was still blocked on it.
    #[error("pool closed while waiting for a unit")]
    Closed,
}

/// A pool of `capacity` interchangeable resource units.
///
/// `acquire` blocks until a unit is free and takes it; `release` returns a
/// unit and wakes at most one waiter. Capacity is fixed at construction.
pub struct BoundedResourcePool {
    capacity: usize,
    units: Semaphore,
}

impl BoundedResourcePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            units: Semaphore::new(capacity),
        }
    }

    /// Blocks until a unit is available, then takes it.
    pub async fn acquire(&self) -> Result<(), PoolError> {
        // The permit is forgotten rather than held in a guard: release is an
        // explicit, separately-timed operation in every simulator that uses
        // the pool.
        let permit = self.units.acquire().await.map_err(|_| PoolError::Closed)?;
        permit.forget();
        Ok(())
    }

    /// Takes a unit without blocking, if one is available.
    pub fn try_acquire(&self) -> bool {
        match self.units.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Returns a unit, waking at most one blocked acquirer.
    pub fn release(&self) -> Result<(), PoolError> {
        if self.units.available_permits() >= self.capacity {
            return Err(PoolError::ReleaseOverflow(self.capacity));
        }
        self.units.add_permits(1);
        Ok(())
    }

    /// Units currently free.
    pub fn available(&self) -> usize {
        self.units.available_permits()
    }

    /// Fixed capacity set at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
