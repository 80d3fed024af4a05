//! Spectrum Energy Report Messages
//!
//! Wire format of one periodic energy report, defined with prost derive
//! macros.
//!
//! ```text
//! SpectrumEnergy (start, bin duration, sensitivity, sequence)
//!   └── Entry (per sub-id, receiver bandwidth)
//!         └── Energy (per frequency, one dBm value per summary bin)
//! ```

use prost::Message;

/// Topic sent ahead of every published report.
pub const SPECTRUM_ENERGY_TOPIC: &str = "EMANE.SpectrumTools.MonitorPhy.SpectrumEnergy";

/// One query period worth of energy for every tracked frequency
#[derive(Clone, PartialEq, Message)]
pub struct SpectrumEnergy {
    /// Start of the first summary bin, microseconds since the epoch
    #[prost(uint64, tag = "1")]
    pub start_time: u64,

    /// Duration of each summary bin in microseconds
    #[prost(uint64, tag = "2")]
    pub duration: u64,

    #[prost(double, tag = "3")]
    pub receiver_sensitivity_dbm: f64,

    /// Increments by one per report
    #[prost(uint64, tag = "4")]
    pub sequence: u64,

    #[prost(message, repeated, tag = "5")]
    pub entries: Vec<Entry>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Entry {
    #[prost(uint32, tag = "1")]
    pub subid: u32,

    #[prost(uint64, tag = "2")]
    pub bandwidth_hz: u64,

    #[prost(message, repeated, tag = "3")]
    pub energies: Vec<Energy>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Energy {
    #[prost(uint64, tag = "1")]
    pub frequency_hz: u64,

    /// Maximum energy per summary bin, noise floor included
    #[prost(double, repeated, tag = "2")]
    pub energy_dbm: Vec<f64>,
}

impl SpectrumEnergy {
    /// Summary bins of one frequency on one sub-id.
    pub fn energy(&self, subid: u16, frequency_hz: u64) -> Option<&[f64]> {
        self.entries
            .iter()
            .find(|e| e.subid == u32::from(subid))?
            .energies
            .iter()
            .find(|e| e.frequency_hz == frequency_hz)
            .map(|e| e.energy_dbm.as_slice())
    }

    /// Number of frequencies across all entries.
    pub fn frequency_count(&self) -> usize {
        self.entries.iter().map(|e| e.energies.len()).sum()
    }

    /// Decode a payload received from the publish socket or a record file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }
}
