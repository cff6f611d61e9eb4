//! Injectable delay policy for actor pacing.
//!
//! Delays model thinking/processing time and are never correctness-relevant,
//! so the policy is injected through every simulator config: production code
//! uses [`Pacing::Random`], tests use [`Pacing::Zero`] (or [`Pacing::Fixed`])
//! to run deterministically.

use rand::Rng;
use std::time::Duration;

/// Duration-range delay policy, sampled once per actor cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// Uniform random duration inside each requested range.
    Random,
    /// Every requested range collapses to the given duration. Useful for
    /// tests that need progress without wall-clock randomness.
    Fixed(Duration),
    /// No delay at all; still yields to the scheduler so loops stay
    /// cooperative.
    Zero,
}

impl Pacing {
    /// Samples a delay from the given millisecond range.
    ///
    /// A degenerate range (`max_ms <= min_ms`) collapses to `min_ms`.
    pub fn sample(&self, min_ms: u64, max_ms: u64) -> Duration {
        match self {
            Pacing::Random => {
                let upper = max_ms.max(min_ms.saturating_add(1));
                Duration::from_millis(rand::thread_rng().gen_range(min_ms..upper))
            }
            Pacing::Fixed(d) => *d,
            Pacing::Zero => Duration::ZERO,
        }
    }

    /// A delay of exactly `ms` under this policy.
    ///
    /// Used by simulators whose cadence is a tunable fixed interval rather
    /// than a range; `Zero` and `Fixed` still override it so tests control
    /// the clock.
    pub fn fixed(&self, ms: u64) -> Duration {
        match self {
            Pacing::Random => Duration::from_millis(ms),
            Pacing::Fixed(d) => *d,
            Pacing::Zero => Duration::ZERO,
        }
    }

    /// Sleeps for a sampled delay from the given range.
    ///
    /// Always an await point, even for a zero delay: pacing is one of the
    /// suspension points at which cancellation is observed.
    pub async fn rest(&self, min_ms: u64, max_ms: u64) {
        Self::pause(self.sample(min_ms, max_ms)).await;
    }

    /// Sleeps for exactly `ms` under this policy.
    pub async fn rest_fixed(&self, ms: u64) {
        Self::pause(self.fixed(ms)).await;
    }

    async fn pause(delay: Duration) {
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_sample_stays_in_range() {
        let pacing = Pacing::Random;
        for _ in 0..100 {
            let d = pacing.sample(100, 200);
            assert!(d >= Duration::from_millis(100));
            assert!(d < Duration::from_millis(200));
        }
    }

    #[test]
    fn degenerate_range_collapses_to_its_lower_bound() {
        let pacing = Pacing::Random;
        assert_eq!(pacing.sample(500, 500), Duration::from_millis(500));
        assert_eq!(pacing.sample(500, 100), Duration::from_millis(500));
    }

    #[test]
    fn zero_and_fixed_override_the_range() {
        assert_eq!(Pacing::Zero.sample(1000, 3000), Duration::ZERO);
        assert_eq!(Pacing::Zero.fixed(1000), Duration::ZERO);
        let fixed = Pacing::Fixed(Duration::from_millis(5));
        assert_eq!(fixed.sample(1000, 3000), Duration::from_millis(5));
        assert_eq!(fixed.fixed(1000), Duration::from_millis(5));
    }
}
