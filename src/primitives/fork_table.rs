//! Atomic paired-resource acquisition for the dining philosophers.
//!
//! Seat `i` needs forks `i` and `(i + 1) % N`. Both are taken in a single
//! check-and-take under one exclusion region, or neither is: a philosopher
//! never holds one fork while waiting for the other, which removes the
//! circular wait that causes the classic deadlock. The pair is evaluated in
//! ascending fork order, giving every seat the same global acquisition order.

use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors from misusing a [`ForkTable`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ForkTableError {
    /// A pair release did not match a prior paired acquisition. A philosopher
    /// holding zero or one of its forks at release time is a defect signal,
    /// never a recoverable condition.
    #[error("fork pair ({0}, {1}) released without being held")]
    NotHeld(usize, usize),
}

/// `N` forks arranged in a ring, acquired and released strictly in pairs.
pub struct ForkTable {
    slots: Mutex<Vec<bool>>, // true = available
}

impl ForkTable {
    pub fn new(seats: usize) -> Self {
        Self {
            slots: Mutex::new(vec![true; seats]),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Vec<bool>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The two fork indices seat `seat` contends for, lower index first.
    pub fn pair_for(&self, seat: usize) -> (usize, usize) {
        let n = self.len();
        let left = seat % n;
        let right = (seat + 1) % n;
        (left.min(right), left.max(right))
    }

    /// Atomically takes both forks of `seat`, or neither.
    ///
    /// Returns `false` without side effects when either fork is taken; the
    /// caller retries later.
    pub fn try_acquire_pair(&self, seat: usize) -> bool {
        let (first, second) = self.pair_for(seat);
        let mut slots = self.slots();
        if slots[first] && slots[second] {
            slots[first] = false;
            slots[second] = false;
            true
        } else {
            false
        }
    }

    /// Atomically frees both forks of `seat`.
    ///
    /// Errors when either fork was not held, because that means a prior
    /// acquisition was not paired.
    pub fn release_pair(&self, seat: usize) -> Result<(), ForkTableError> {
        let (first, second) = self.pair_for(seat);
        let mut slots = self.slots();
        if slots[first] || slots[second] {
            return Err(ForkTableError::NotHeld(first, second));
        }
        slots[first] = true;
        slots[second] = true;
        Ok(())
    }

    /// Availability of every fork, for snapshots.
    pub fn available(&self) -> Vec<bool> {
        self.slots().clone()
    }

    /// Number of seats (and forks) at the table.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_both_forks_or_neither() {
        let table = ForkTable::new(5);
        assert!(table.try_acquire_pair(0)); // forks 0 and 1

        // Seat 1 needs fork 1, which seat 0 holds: nothing may be taken.
        assert!(!table.try_acquire_pair(1));
        assert_eq!(table.available(), vec![false, false, true, true, true]);

        // Seat 2 (forks 2 and 3) is unaffected.
        assert!(table.try_acquire_pair(2));
    }

    #[test]
    fn ring_wraps_at_the_last_seat() {
        let table = ForkTable::new(5);
        assert_eq!(table.pair_for(4), (0, 4));
        assert!(table.try_acquire_pair(4));
        // Fork 0 is now taken, so seat 0 cannot eat.
        assert!(!table.try_acquire_pair(0));
    }

    #[test]
    fn release_restores_both_forks() {
        let table = ForkTable::new(5);
        assert!(table.try_acquire_pair(3));
        table.release_pair(3).unwrap();
        assert_eq!(table.available(), vec![true; 5]);
        assert!(table.try_acquire_pair(3));
    }

    #[test]
    fn unpaired_release_is_a_defect() {
        let table = ForkTable::new(5);
        assert_eq!(table.release_pair(0), Err(ForkTableError::NotHeld(0, 1)));

        // Holding only one of the two forks is equally invalid.
        assert!(table.try_acquire_pair(1)); // takes forks 1 and 2
        assert_eq!(table.release_pair(0), Err(ForkTableError::NotHeld(0, 1)));
    }

    #[test]
    fn forks_held_is_always_even() {
        let table = ForkTable::new(5);
        assert!(table.try_acquire_pair(0));
        assert!(table.try_acquire_pair(2));
        let held = table.available().iter().filter(|free| !**free).count();
        assert_eq!(held % 2, 0);
        assert_eq!(held, 4);
    }
}
