//! Engine errors
//!
//! Accumulator errors never escape a single message: the receive combiner
//! maps them to the spectrum clamp drop cause. Query errors surface to the
//! scheduler, which logs and skips the frequency.

use crate::time::{Microseconds, TimePoint};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpectrumError {
    #[error("segment offset {offset} exceeds max {max}")]
    OffsetClamp { offset: Microseconds, max: Microseconds },

    #[error("segment duration {duration} exceeds max {max}")]
    DurationClamp {
        duration: Microseconds,
        max: Microseconds,
    },

    #[error("propagation delay {delay} exceeds max {max}")]
    PropagationClamp { delay: Microseconds, max: Microseconds },

    #[error("segment/power size mismatch: {segments} segments, {powers} powers")]
    SizeMismatch { segments: usize, powers: usize },

    #[error("frequency {0} Hz has never been observed")]
    UnknownFrequency(u64),

    #[error("query start {start} before window start {window_start}")]
    StartBeforeWindow {
        start: TimePoint,
        window_start: TimePoint,
    },

    #[error("query end {end} before start {start}")]
    EndBeforeStart { start: TimePoint, end: TimePoint },

    #[error("bin end index {end_index} before start index {start_index}")]
    InvertedRange { start_index: usize, end_index: usize },

    #[error("bin index out of range: {index} >= {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, SpectrumError>;

/// Configuration errors, fatal at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(String),

    #[error("failed to read config: {0}")]
    ReadError(String),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    ValidationError(String),
}
