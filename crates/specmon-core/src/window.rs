//! Spectrum windows and max-bin queries.

use crate::error::{Result, SpectrumError};
use crate::time::{Microseconds, TimePoint};
use crate::units::mw_to_dbm;

/// A contiguous run of noise bins for one frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumWindow {
    /// Energy per bin in mW
    pub bins: Vec<f64>,
    /// Start time of the first bin
    pub start: TimePoint,
    pub bin_size: Microseconds,
}

impl SpectrumWindow {
    /// Time just past the last bin.
    pub fn end(&self) -> TimePoint {
        self.start + self.bin_size * self.bins.len() as u64
    }
}

/// Largest bin value over `[start, end]`.
///
/// `end` is inclusive and interpreted with exclusive-boundary semantics: a
/// time exactly on a bin boundary belongs to the preceding bin. Without
/// `end` the range runs to the last bin of the window.
pub fn max_noise_bin(window: &SpectrumWindow, start: TimePoint, end: Option<TimePoint>) -> Result<f64> {
    if start < window.start {
        return Err(SpectrumError::StartBeforeWindow {
            start,
            window_start: window.start,
        });
    }

    let len = window.bins.len();
    if len == 0 {
        return Err(SpectrumError::IndexOutOfRange { index: 0, len });
    }

    let window_bin = window.start.absolute_bin(window.bin_size, false);
    let start_index = (start.absolute_bin(window.bin_size, false) - window_bin) as usize;

    let end_index = match end {
        Some(end) if end < start => {
            return Err(SpectrumError::EndBeforeStart { start, end });
        }
        Some(end) => {
            let end_bin = end.absolute_bin(window.bin_size, true);
            if end_bin < window_bin + start_index as u64 {
                return Err(SpectrumError::InvertedRange {
                    start_index,
                    end_index: end_bin.saturating_sub(window_bin) as usize,
                });
            }
            (end_bin - window_bin) as usize
        }
        None => len - 1,
    };

    if start_index >= len {
        return Err(SpectrumError::IndexOutOfRange {
            index: start_index,
            len,
        });
    }
    if end_index >= len {
        return Err(SpectrumError::IndexOutOfRange {
            index: end_index,
            len,
        });
    }
    Ok(window.bins[start_index..=end_index]
        .iter()
        .copied()
        .fold(0.0, f64::max))
}

/// Noise floor in dBm over `[start, end]`: the max bin energy plus the
/// receiver sensitivity.
pub fn max_noise_floor_dbm(
    window: &SpectrumWindow,
    rx_sensitivity_mw: f64,
    start: TimePoint,
    end: Option<TimePoint>,
) -> Result<f64> {
    Ok(mw_to_dbm(max_noise_bin(window, start, end)? + rx_sensitivity_mw))
}
