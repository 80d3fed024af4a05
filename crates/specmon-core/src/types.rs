//! Core types for inbound transmissions
//!
//! A received message describes one transmission as seen by the local node:
//!
//! ```text
//!  PhyHeader
//!  ├── transmitters       [(NEM 3, 20 dBm), (NEM 7, 20 dBm)]   collaborating
//!  ├── transmit_antennas  [ant 0 -> group 0, ant 1 -> group 1]  MIMO
//!  └── frequency_groups
//!        group 0: [seg(2.40 GHz, +0 µs, 10 ms), seg(2.41 GHz, +10 ms, 10 ms)]
//!        group 1: [seg(2.45 GHz, +0 µs, 20 ms)]
//! ```
//!
//! Each transmit antenna selects one frequency group. Every transmitter in
//! the list contributes to every segment of that group.

use crate::time::{Microseconds, TimePoint};
use serde::{Deserialize, Serialize};

/// Emulated node identifier.
pub type NemId = u16;

/// Antenna index on a node.
pub type AntennaIndex = u16;

/// Waveform/channel configuration identifier sharing one receiver.
pub type SubId = u16;

/// Spectral mask identifier. Zero is the rectangular mask of the
/// transmit bandwidth.
pub type SpectralMaskIndex = u16;

/// A time/frequency sub-region of one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencySegment {
    /// Centre frequency in Hz
    pub frequency_hz: u64,
    /// Segment-local bandwidth in Hz (0 uses the antenna bandwidth)
    #[serde(default)]
    pub bandwidth_hz: u64,
    /// Offset from message start
    pub offset: Microseconds,
    /// Segment on-air duration
    pub duration: Microseconds,
    /// Explicit transmit power overriding the transmitter nominal power
    #[serde(default)]
    pub power_dbm: Option<f64>,
}

impl FrequencySegment {
    pub fn new(frequency_hz: u64, offset: Microseconds, duration: Microseconds) -> Self {
        Self {
            frequency_hz,
            bandwidth_hz: 0,
            offset,
            duration,
            power_dbm: None,
        }
    }

    pub fn with_power(mut self, power_dbm: f64) -> Self {
        self.power_dbm = Some(power_dbm);
        self
    }

    pub fn with_bandwidth(mut self, bandwidth_hz: u64) -> Self {
        self.bandwidth_hz = bandwidth_hz;
        self
    }
}

/// A collaborating transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transmitter {
    pub nem_id: NemId,
    /// Nominal transmit power in dBm
    pub power_dbm: f64,
}

impl Transmitter {
    pub fn new(nem_id: NemId, power_dbm: f64) -> Self {
        Self { nem_id, power_dbm }
    }
}

/// A transmit antenna and the frequency group it radiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitAntenna {
    pub index: AntennaIndex,
    pub frequency_group_index: usize,
    pub bandwidth_hz: u64,
    #[serde(default)]
    pub spectral_mask_index: SpectralMaskIndex,
}

impl TransmitAntenna {
    pub fn new(index: AntennaIndex, frequency_group_index: usize, bandwidth_hz: u64) -> Self {
        Self {
            index,
            frequency_group_index,
            bandwidth_hz,
            spectral_mask_index: 0,
        }
    }
}

/// Control header of an inbound transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhyHeader {
    pub sub_id: SubId,
    /// Nominal transmission start
    pub tx_time: TimePoint,
    pub transmitters: Vec<Transmitter>,
    pub transmit_antennas: Vec<TransmitAntenna>,
    pub frequency_groups: Vec<Vec<FrequencySegment>>,
}

impl PhyHeader {
    /// Single transmitter, single antenna, single frequency group.
    pub fn simple(
        sub_id: SubId,
        tx_time: TimePoint,
        transmitter: Transmitter,
        bandwidth_hz: u64,
        segments: Vec<FrequencySegment>,
    ) -> Self {
        Self {
            sub_id,
            tx_time,
            transmitters: vec![transmitter],
            transmit_antennas: vec![TransmitAntenna::new(0, 0, bandwidth_hz)],
            frequency_groups: vec![segments],
        }
    }

    /// Every segment frequency across all groups.
    pub fn frequencies(&self) -> impl Iterator<Item = u64> + '_ {
        self.frequency_groups
            .iter()
            .flat_map(|group| group.iter().map(|s| s.frequency_hz))
    }

    /// Largest antenna bandwidth, used to resync a sub-id's bandwidth.
    pub fn bandwidth_hz(&self) -> Option<u64> {
        self.transmit_antennas.iter().map(|a| a.bandwidth_hz).max()
    }
}
