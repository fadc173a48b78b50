#![forbid(unsafe_code)]

//! Time source for debounce deadlines.
//!
//! In production the host reads `web_time::Instant::now()`. Tests share a
//! [`LabClock`] with the host and advance it by hand, which makes debounce
//! behavior fully deterministic.
//!
//! # Example
//!
//! ```
//! use formbind_core::{Clock, LabClock};
//! use web_time::Duration;
//!
//! let lab = LabClock::new();
//! let clock = Clock::Lab(lab.clone());
//! let t0 = clock.now();
//! lab.advance(Duration::from_millis(250));
//! assert_eq!(clock.now() - t0, Duration::from_millis(250));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use web_time::{Duration, Instant};

/// Where the host gets "now" from.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// Real wall-clock time.
    #[default]
    Real,
    /// Deterministic lab clock for testing.
    Lab(LabClock),
}

impl Clock {
    /// Current instant according to this source.
    #[must_use]
    pub fn now(&self) -> Instant {
        match self {
            Self::Real => Instant::now(),
            Self::Lab(lab) => lab.now(),
        }
    }
}

/// A manually-advanceable clock.
///
/// All clones share the same offset, so a test can keep one clone and hand
/// another to the host.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Arc<AtomicU64>,
}

impl LabClock {
    /// Create a lab clock frozen at `Instant::now()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let us = delta.as_micros().min(u128::from(u64::MAX)) as u64;
        self.offset_us.fetch_add(us, Ordering::Release);
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        let offset = Duration::from_micros(self.offset_us.load(Ordering::Acquire));
        self.epoch + offset
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_clock_is_frozen_until_advanced() {
        let lab = LabClock::new();
        let a = lab.now();
        let b = lab.now();
        assert_eq!(a, b);
        lab.advance(Duration::from_millis(5));
        assert_eq!(lab.now() - a, Duration::from_millis(5));
    }

    #[test]
    fn clones_share_offset() {
        let lab = LabClock::new();
        let clock = Clock::Lab(lab.clone());
        let start = clock.now();
        lab.advance(Duration::from_secs(1));
        assert_eq!(clock.now() - start, Duration::from_secs(1));
    }

    #[test]
    fn real_clock_is_monotonic() {
        let clock = Clock::Real;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
