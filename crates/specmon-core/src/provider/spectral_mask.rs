//! Spectral mask overlap.
//!
//! A mask is a list of bands relative to the transmit centre frequency,
//! each at a level relative to the in-band power. The overlap of a mask
//! with a receiver passband yields one `(ratio, multiplier)` pair per
//! overlapping band:
//!
//! ```text
//!              tx centre
//!                  |
//!    [-30 dB ][     0 dB     ][-30 dB ]      mask bands
//!                [=====rx passband=====]
//!                 ^^^^^^^^^^^^^^^^^ ^^^^
//!                 ratio 0.8 x 1.0   ratio 0.1 x 0.001
//! ```
//!
//! Mask index 0 is the rectangular mask covering exactly the transmit
//! bandwidth at 0 dB.

use crate::units::db_to_linear;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::SpectralMaskIndex;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskBand {
    /// Lower edge relative to the transmit centre, Hz
    pub lower_offset_hz: i64,
    /// Upper edge relative to the transmit centre, Hz
    pub upper_offset_hz: i64,
    pub level_db: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralMask {
    pub bands: Vec<MaskBand>,
}

/// One overlapping band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapSegment {
    /// Overlapped width over transmit bandwidth
    pub ratio: f64,
    /// Linear band level
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaskOverlap {
    pub segments: Vec<OverlapSegment>,
    pub lower_hz: f64,
    pub upper_hz: f64,
}

impl MaskOverlap {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Scale a linear power by every overlapping band.
    pub fn energy_mw(&self, power_mw: f64) -> f64 {
        self.segments
            .iter()
            .map(|s| power_mw * s.ratio * s.multiplier)
            .sum()
    }
}

/// Registered masks, shared read-only between accumulators.
#[derive(Debug, Clone, Default)]
pub struct SpectralMaskTable {
    masks: HashMap<SpectralMaskIndex, SpectralMask>,
}

impl SpectralMaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mask. Index 0 is reserved for the rectangular mask.
    pub fn insert(&mut self, index: SpectralMaskIndex, mask: SpectralMask) -> bool {
        if index == 0 {
            return false;
        }
        self.masks.insert(index, mask);
        true
    }

    pub fn contains(&self, index: SpectralMaskIndex) -> bool {
        index == 0 || self.masks.contains_key(&index)
    }

    pub fn overlap(
        &self,
        tx_frequency_hz: u64,
        rx_frequency_hz: u64,
        tx_bandwidth_hz: u64,
        rx_bandwidth_hz: u64,
        mask_index: SpectralMaskIndex,
    ) -> MaskOverlap {
        let tx_bw = tx_bandwidth_hz as f64;
        if tx_bw <= 0.0 {
            return MaskOverlap::default();
        }

        let half_tx = (tx_bandwidth_hz / 2) as i64;
        let rectangular = [MaskBand {
            lower_offset_hz: -half_tx,
            upper_offset_hz: half_tx,
            level_db: 0.0,
        }];

        let bands: &[MaskBand] = match self.masks.get(&mask_index) {
            Some(mask) if mask_index != 0 => &mask.bands,
            _ => &rectangular,
        };

        let tx_centre = tx_frequency_hz as f64;
        let rx_lower = rx_frequency_hz as f64 - rx_bandwidth_hz as f64 / 2.0;
        let rx_upper = rx_frequency_hz as f64 + rx_bandwidth_hz as f64 / 2.0;

        let mut overlap = MaskOverlap {
            segments: Vec::new(),
            lower_hz: f64::MAX,
            upper_hz: f64::MIN,
        };

        for band in bands {
            let lower = (tx_centre + band.lower_offset_hz as f64).max(rx_lower);
            let upper = (tx_centre + band.upper_offset_hz as f64).min(rx_upper);
            if upper <= lower {
                continue;
            }
            overlap.segments.push(OverlapSegment {
                ratio: (upper - lower) / tx_bw,
                multiplier: db_to_linear(band.level_db),
            });
            overlap.lower_hz = overlap.lower_hz.min(lower);
            overlap.upper_hz = overlap.upper_hz.max(upper);
        }

        if overlap.segments.is_empty() {
            return MaskOverlap::default();
        }
        overlap
    }
}
