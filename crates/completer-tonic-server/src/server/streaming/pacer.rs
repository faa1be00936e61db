//! Delay distributions used between delta events.
//!
//! A [`Pacer`] only decides *how long* to wait; the coordinator performs the
//! wait so it can abandon it the moment the caller disconnects.
//!
//! # Example
//! ```ignore
//! let pacer = UniformJitter::new(Duration::from_millis(300), Duration::from_secs(1));
//! let pause = pacer.next_delay();
//! assert!(pause >= Duration::from_millis(300) && pause <= Duration::from_secs(1));
//! ```

use core::time::Duration;
use rand::Rng;
use std::sync::Arc;

/// Source of the pause taken before each delta event.
///
/// Implementations must be cheap to call and safe to share between streams.
pub trait Pacer: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniformly distributed delay in `[min, max]`, drawn from the thread-local
/// RNG on every call.
#[derive(Debug, Clone, Copy)]
pub struct UniformJitter {
    min: Duration,
    max: Duration,
}

impl UniformJitter {
    /// `min` and `max` are swapped if given in the wrong order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }
}

impl Pacer for UniformJitter {
    fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }

        let nanos = rand::rng().random_range(self.min.as_nanos()..=self.max.as_nanos());
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// The same delay every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Pacer for FixedDelay {
    fn next_delay(&self) -> Duration {
        self.0
    }
}

/// No delay at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Pacer for Immediate {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Picks the cheapest pacer for the configured bounds.
pub fn pacer_for(min: Duration, max: Duration) -> Arc<dyn Pacer> {
    if max.is_zero() {
        Arc::new(Immediate)
    } else if min == max {
        Arc::new(FixedDelay(min))
    } else {
        Arc::new(UniformJitter::new(min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_jitter_stays_within_bounds() {
        let min = Duration::from_millis(300);
        let max = Duration::from_millis(1000);
        let pacer = UniformJitter::new(min, max);

        for _ in 0..10_000 {
            let delay = pacer.next_delay();
            assert!(delay >= min && delay <= max, "{delay:?} out of range");
        }
    }

    #[test]
    fn uniform_jitter_actually_varies() {
        let pacer = UniformJitter::new(Duration::from_millis(300), Duration::from_millis(1000));
        let first = pacer.next_delay();
        assert!((0..1_000).any(|_| pacer.next_delay() != first));
    }

    #[test]
    fn uniform_jitter_with_equal_bounds_is_constant() {
        let pacer = UniformJitter::new(Duration::from_millis(5), Duration::from_millis(5));
        assert_eq!(pacer.next_delay(), Duration::from_millis(5));
    }

    #[test]
    fn uniform_jitter_orders_bounds() {
        let pacer = UniformJitter::new(Duration::from_millis(20), Duration::from_millis(10));
        for _ in 0..1_000 {
            let delay = pacer.next_delay();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn fixed_and_immediate() {
        assert_eq!(FixedDelay(Duration::from_secs(2)).next_delay(), Duration::from_secs(2));
        assert_eq!(Immediate.next_delay(), Duration::ZERO);
    }

    #[test]
    fn pacer_for_picks_by_bounds() {
        let ms = Duration::from_millis;
        assert_eq!(pacer_for(ms(0), ms(0)).next_delay(), Duration::ZERO);
        assert_eq!(pacer_for(ms(250), ms(250)).next_delay(), ms(250));

        let jitter = pacer_for(ms(300), ms(1000));
        let delay = jitter.next_delay();
        assert!(delay >= ms(300) && delay <= ms(1000));
    }
}
