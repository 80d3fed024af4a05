//! Per-frequency noise history
//!
//! A fixed ring of noise bins, each tagged with the absolute bin it holds.
//! The ring spans the longest interval a reception can reach into the
//! future or the past relative to its transmission time:
//!
//! ```text
//!   slots = (max offset + max propagation + 2 * max duration) / bin size
//!
//!   absolute bin:  ... 997  998  999 1000 1001 1002 ...
//!   slot:          ... b%N  b%N  b%N  b%N  b%N  b%N ...
//! ```
//!
//! Writing a bin whose slot still holds an older bin resets that slot
//! first, which is how expired history is reclaimed. A write for a bin
//! older than the one its slot already holds is too late to matter and is
//! skipped.

use crate::time::{Microseconds, TimePoint};

const EMPTY: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub struct NoiseRecorder {
    bin_size: Microseconds,
    frequency_hz: u64,
    bandwidth_hz: u64,
    bins: Vec<f64>,
    tags: Vec<u64>,
}

impl NoiseRecorder {
    pub fn new(
        bin_size: Microseconds,
        max_offset: Microseconds,
        max_propagation: Microseconds,
        max_duration: Microseconds,
        frequency_hz: u64,
        bandwidth_hz: u64,
    ) -> Self {
        let bin = bin_size.count().max(1);
        let span = (max_offset + max_propagation + 2 * max_duration).count();
        let slots = (span / bin).max(1) as usize;
        Self {
            bin_size: Microseconds(bin),
            frequency_hz,
            bandwidth_hz,
            bins: vec![0.0; slots],
            tags: vec![EMPTY; slots],
        }
    }

    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    pub fn bandwidth_hz(&self) -> u64 {
        self.bandwidth_hz
    }

    pub fn bin_size(&self) -> Microseconds {
        self.bin_size
    }

    /// Number of slots in the ring.
    pub fn slot_count(&self) -> usize {
        self.bins.len()
    }

    /// Add `energy_mw` to every bin overlapping `[start, end)`.
    ///
    /// Returns the inclusive absolute bin range written, or `None` for an
    /// empty interval or zero energy.
    pub fn update(&mut self, start: TimePoint, end: TimePoint, energy_mw: f64) -> Option<(u64, u64)> {
        if end <= start || energy_mw == 0.0 {
            return None;
        }

        let start_bin = start.absolute_bin(self.bin_size, false);
        let end_bin = end.absolute_bin(self.bin_size, true);
        let slots = self.bins.len() as u64;

        // Only the newest `slots` bins of an oversized span fit in the ring
        let first = start_bin.max((end_bin + 1).saturating_sub(slots));

        for bin in first..=end_bin {
            let slot = (bin % slots) as usize;
            let held = self.tags[slot];
            if held == bin {
                self.bins[slot] += energy_mw;
            } else if held == EMPTY || held < bin {
                self.tags[slot] = bin;
                self.bins[slot] = energy_mw;
            }
        }

        Some((start_bin, end_bin))
    }

    /// Bins covering `[timepoint, timepoint + duration)`, with `timepoint`
    /// defaulting to `now`. Returns the values and the start time of the
    /// first bin. Bins never written, or already reclaimed, read as zero.
    pub fn get(
        &self,
        now: TimePoint,
        duration: Microseconds,
        timepoint: Option<TimePoint>,
    ) -> (Vec<f64>, TimePoint) {
        let timepoint = timepoint.unwrap_or(now);
        let start_bin = timepoint.absolute_bin(self.bin_size, false);
        let end_bin = (timepoint + duration)
            .absolute_bin(self.bin_size, true)
            .max(start_bin);

        let count = ((end_bin - start_bin + 1) as usize).min(self.bins.len());
        let slots = self.bins.len() as u64;

        let values = (start_bin..start_bin + count as u64)
            .map(|bin| {
                let slot = (bin % slots) as usize;
                if self.tags[slot] == bin {
                    self.bins[slot]
                } else {
                    0.0
                }
            })
            .collect();

        (values, TimePoint::from_bin(start_bin, self.bin_size))
    }

    /// Every populated bin as `(absolute bin, energy mW)`, oldest first.
    pub fn dump(&self) -> Vec<(u64, f64)> {
        let mut entries: Vec<(u64, f64)> = self
            .tags
            .iter()
            .zip(self.bins.iter())
            .filter(|(tag, _)| **tag != EMPTY)
            .map(|(tag, value)| (*tag, *value))
            .collect();
        entries.sort_by_key(|(tag, _)| *tag);
        entries
    }
}
