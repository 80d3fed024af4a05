//! # Timeline Types
//!
//! The engine runs on a single microsecond timeline shared by the receive
//! path and the periodic query path:
//!
//! - **TimePoint**: absolute microseconds since the UNIX epoch
//! - **Microseconds**: a non-negative span on that timeline
//!
//! ## Noise Bins
//!
//! Time is quantized into fixed `bin_size` slots. A time point maps to its
//! absolute bin by integer division:
//!
//! ```text
//!   bin 0      bin 1      bin 2      bin 3
//! |----------|----------|----------|----------|
//! 0         20         40         60         80   (µs, bin_size = 20)
//!                       ^
//!                       40 -> bin 2 (start semantics)
//!                       40 -> bin 1 (end semantics, exclusive)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Rem, Sub};
use std::time::{SystemTime, UNIX_EPOCH};

/// A span of time in whole microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Microseconds(pub u64);

impl Microseconds {
    /// Zero-length span.
    pub const ZERO: Microseconds = Microseconds(0);

    /// Create a span from a microsecond count.
    #[inline]
    pub const fn new(us: u64) -> Self {
        Self(us)
    }

    /// Create a span from milliseconds.
    #[inline]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000)
    }

    /// Microsecond count.
    #[inline]
    pub const fn count(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Convert to a std duration (for socket timeouts and sleeps).
    #[inline]
    pub fn to_std(&self) -> std::time::Duration {
        std::time::Duration::from_micros(self.0)
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Microseconds) -> Microseconds {
        Microseconds(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Microseconds {
    type Output = Microseconds;
    fn add(self, rhs: Microseconds) -> Microseconds {
        Microseconds(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Microseconds {
    type Output = Microseconds;
    fn sub(self, rhs: Microseconds) -> Microseconds {
        Microseconds(self.0.saturating_sub(rhs.0))
    }
}

impl Mul<u64> for Microseconds {
    type Output = Microseconds;
    fn mul(self, rhs: u64) -> Microseconds {
        Microseconds(self.0.saturating_mul(rhs))
    }
}

impl Mul<Microseconds> for u64 {
    type Output = Microseconds;
    fn mul(self, rhs: Microseconds) -> Microseconds {
        Microseconds(self.saturating_mul(rhs.0))
    }
}

impl Div<Microseconds> for Microseconds {
    type Output = u64;
    fn div(self, rhs: Microseconds) -> u64 {
        self.0 / rhs.0
    }
}

impl Rem for Microseconds {
    type Output = Microseconds;
    fn rem(self, rhs: Microseconds) -> Microseconds {
        Microseconds(self.0 % rhs.0)
    }
}

impl fmt::Display for Microseconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} usec", self.0)
    }
}

/// Absolute time in microseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimePoint(u64);

impl TimePoint {
    /// The epoch itself.
    pub const EPOCH: TimePoint = TimePoint(0);

    /// Create a time point from microseconds since the epoch.
    #[inline]
    pub const fn from_micros(us: u64) -> Self {
        Self(us)
    }

    /// Create a time point from whole seconds since the epoch.
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1_000_000)
    }

    /// Wall-clock now.
    pub fn now() -> Self {
        let us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self(us)
    }

    /// Microseconds since the epoch.
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Span since the epoch.
    #[inline]
    pub const fn since_epoch(&self) -> Microseconds {
        Microseconds(self.0)
    }

    /// Absolute difference between two time points.
    #[inline]
    pub fn abs_diff(&self, other: TimePoint) -> Microseconds {
        Microseconds(self.0.abs_diff(other.0))
    }

    /// Absolute bin index of this time point for the given bin size.
    ///
    /// With `adjust_end` set, a non-zero time lying exactly on a bin boundary
    /// maps to the preceding bin, which gives exclusive-end semantics for
    /// interval ends.
    #[inline]
    pub fn absolute_bin(&self, bin_size: Microseconds, adjust_end: bool) -> u64 {
        let bin = self.0 / bin_size.0;
        if adjust_end && self.0 != 0 && self.0 % bin_size.0 == 0 {
            bin - 1
        } else {
            bin
        }
    }

    /// Start time of an absolute bin.
    #[inline]
    pub fn from_bin(bin: u64, bin_size: Microseconds) -> Self {
        Self(bin.saturating_mul(bin_size.0))
    }
}

impl Add<Microseconds> for TimePoint {
    type Output = TimePoint;
    fn add(self, rhs: Microseconds) -> TimePoint {
        TimePoint(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign<Microseconds> for TimePoint {
    fn add_assign(&mut self, rhs: Microseconds) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub<Microseconds> for TimePoint {
    type Output = TimePoint;
    fn sub(self, rhs: Microseconds) -> TimePoint {
        TimePoint(self.0.saturating_sub(rhs.0))
    }
}

impl Sub<TimePoint> for TimePoint {
    type Output = Microseconds;
    /// Saturates at zero when `rhs` is later than `self`.
    fn sub(self, rhs: TimePoint) -> Microseconds {
        Microseconds(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}
