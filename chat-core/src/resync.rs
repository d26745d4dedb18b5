//! Resync timing policy.
//!
//! Each participant re-announces itself once per fixed interval. There are no
//! acknowledgements to count, so there is no retry logic: the interval alone
//! bounds how long a lost datagram can leave peers diverged.
//!
//! The first tick is delayed by a random phase in `[0, interval)`, chosen once,
//! so participants started together do not announce in lockstep. The period
//! itself never changes.

use std::time::Duration;

/// Default re-announcement interval.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(5);

/// When to fire resync ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncSchedule {
    interval: Duration,
    first_delay: Duration,
}

impl ResyncSchedule {
    /// Fixed interval with a random initial phase.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            first_delay: random_phase(interval),
        }
    }

    /// Fixed interval, first tick after exactly one interval.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            first_delay: interval,
        }
    }

    /// The period between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Delay before the first tick.
    pub fn first_delay(&self) -> Duration {
        self.first_delay
    }
}

impl Default for ResyncSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_RESYNC_INTERVAL)
    }
}

/// Random offset in `[0, interval)`. Zero if the OS RNG is unavailable.
fn random_phase(interval: Duration) -> Duration {
    let millis = interval.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }

    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    let random = u64::from_le_bytes(bytes);
    Duration::from_millis(random % millis)
}
