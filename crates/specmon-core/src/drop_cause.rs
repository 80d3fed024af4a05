//! Reasons a received message contributes no energy.
//!
//! Codes are stable and index the per-cause statistics. Code 2 is
//! reserved for a receiver sensitivity drop, which this engine leaves to
//! the accumulator and never reports.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropCause {
    OutOfBand,
    PropagationModel,
    GainManagerLocation,
    GainManagerHorizon,
    GainManagerAntennaProfile,
    NotFoi,
    SpectrumClamp,
    FadingManagerLocation,
    FadingManagerAlgorithm,
    FadingManagerSelection,
    GainManagerAntennaIndex,
    AntennaFreqIndex,
    MissingControl,
}

impl DropCause {
    pub const ALL: [DropCause; 13] = [
        DropCause::OutOfBand,
        DropCause::PropagationModel,
        DropCause::GainManagerLocation,
        DropCause::GainManagerHorizon,
        DropCause::GainManagerAntennaProfile,
        DropCause::NotFoi,
        DropCause::SpectrumClamp,
        DropCause::FadingManagerLocation,
        DropCause::FadingManagerAlgorithm,
        DropCause::FadingManagerSelection,
        DropCause::GainManagerAntennaIndex,
        DropCause::AntennaFreqIndex,
        DropCause::MissingControl,
    ];

    pub fn code(&self) -> u16 {
        match self {
            DropCause::OutOfBand => 1,
            DropCause::PropagationModel => 3,
            DropCause::GainManagerLocation => 4,
            DropCause::GainManagerHorizon => 5,
            DropCause::GainManagerAntennaProfile => 6,
            DropCause::NotFoi => 7,
            DropCause::SpectrumClamp => 8,
            DropCause::FadingManagerLocation => 9,
            DropCause::FadingManagerAlgorithm => 10,
            DropCause::FadingManagerSelection => 11,
            DropCause::GainManagerAntennaIndex => 12,
            DropCause::AntennaFreqIndex => 13,
            DropCause::MissingControl => 14,
        }
    }

    /// Statistics table label.
    pub fn label(&self) -> &'static str {
        match self {
            DropCause::OutOfBand => "Out-of-Band",
            DropCause::PropagationModel => "Propagation Model",
            DropCause::GainManagerLocation => "Gain Location",
            DropCause::GainManagerHorizon => "Gain Horizon",
            DropCause::GainManagerAntennaProfile => "Gain Profile",
            DropCause::NotFoi => "Not FOI",
            DropCause::SpectrumClamp => "Spectrum Clamp",
            DropCause::FadingManagerLocation => "Fade Location",
            DropCause::FadingManagerAlgorithm => "Fade Algorithm",
            DropCause::FadingManagerSelection => "Fade Select",
            DropCause::GainManagerAntennaIndex => "Gain Antenna Index",
            DropCause::AntennaFreqIndex => "Antenna Freq Index",
            DropCause::MissingControl => "Missing Control",
        }
    }

    /// Out-of-band is expected traffic, everything else is an error drop.
    pub fn is_error(&self) -> bool {
        !matches!(self, DropCause::OutOfBand)
    }
}

impl fmt::Display for DropCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
