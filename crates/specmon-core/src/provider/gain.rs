//! Combined transmit/receive antenna gain.
//!
//! Antennas are either fixed gain or reference an antenna profile. A
//! profile radiates its peak gain above a minimum elevation (the horizon)
//! and nothing below it. Profile antennas need both node positions.
//!
//! A transmitter with no antennas registered radiates from the default
//! omni antenna at index 0 with 0 dBi. Once any antenna is registered for
//! a transmitter, only registered indices resolve.

use super::location::LocationInfo;
use crate::geo::look_angle;
use crate::types::{AntennaIndex, NemId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type AntennaProfileId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntennaProfile {
    pub peak_gain_dbi: f64,
    /// Elevation below which the antenna cannot see the peer
    #[serde(default = "default_horizon")]
    pub horizon_deg: f64,
}

fn default_horizon() -> f64 {
    -90.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntennaPattern {
    Fixed(f64),
    Profile(AntennaProfileId),
}

/// An antenna on some node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Antenna {
    pub index: AntennaIndex,
    pub pattern: AntennaPattern,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntennaGain {
    pub tx_gain_dbi: f64,
    pub rx_gain_dbi: f64,
    /// Served from the gain cache
    pub cache_hit: bool,
}

impl AntennaGain {
    pub fn total_dbi(&self) -> f64 {
        self.tx_gain_dbi + self.rx_gain_dbi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GainError {
    #[error("antenna profile needs a location")]
    Location,
    #[error("unknown antenna profile {0}")]
    AntennaProfile(AntennaProfileId),
    #[error("peer below antenna horizon")]
    Horizon,
    #[error("unknown antenna index {0}")]
    AntennaIndex(AntennaIndex),
}

#[derive(Debug, Clone)]
pub struct GainManager {
    rx_antenna: AntennaPattern,
    profiles: HashMap<AntennaProfileId, AntennaProfile>,
    antennas: HashMap<NemId, HashMap<AntennaIndex, Antenna>>,
    cache: HashMap<(NemId, AntennaIndex), (u64, AntennaGain)>,
}

impl GainManager {
    /// Receive side uses a fixed gain.
    pub fn with_fixed_rx_gain(gain_dbi: f64) -> Self {
        Self::new(AntennaPattern::Fixed(gain_dbi))
    }

    pub fn new(rx_antenna: AntennaPattern) -> Self {
        Self {
            rx_antenna,
            profiles: HashMap::new(),
            antennas: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    pub fn set_rx_antenna(&mut self, pattern: AntennaPattern) {
        self.rx_antenna = pattern;
        self.cache.clear();
    }

    pub fn add_profile(&mut self, id: AntennaProfileId, profile: AntennaProfile) {
        self.profiles.insert(id, profile);
        self.cache.clear();
    }

    /// Register or replace a transmitter antenna.
    pub fn set_antenna(&mut self, nem_id: NemId, antenna: Antenna) {
        self.antennas
            .entry(nem_id)
            .or_default()
            .insert(antenna.index, antenna);
        self.cache.retain(|(tx, _), _| *tx != nem_id);
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Gain from `tx` antenna `index` to the local receiver. Cached results
    /// are reused while the location generation is unchanged.
    pub fn gain(
        &mut self,
        tx: NemId,
        index: AntennaIndex,
        location: Option<&LocationInfo>,
        location_generation: u64,
    ) -> Result<AntennaGain, GainError> {
        if let Some((generation, gain)) = self.cache.get(&(tx, index)) {
            if *generation == location_generation {
                return Ok(AntennaGain {
                    cache_hit: true,
                    ..*gain
                });
            }
        }

        let tx_pattern = match self.antennas.get(&tx) {
            Some(antennas) => antennas
                .get(&index)
                .map(|a| a.pattern)
                .ok_or(GainError::AntennaIndex(index))?,
            None if index == 0 => AntennaPattern::Fixed(0.0),
            None => return Err(GainError::AntennaIndex(index)),
        };

        let tx_gain_dbi = self.pattern_gain(tx_pattern, location, true)?;
        let rx_gain_dbi = self.pattern_gain(self.rx_antenna, location, false)?;

        let gain = AntennaGain {
            tx_gain_dbi,
            rx_gain_dbi,
            cache_hit: false,
        };
        self.cache.insert((tx, index), (location_generation, gain));
        Ok(gain)
    }

    fn pattern_gain(
        &self,
        pattern: AntennaPattern,
        location: Option<&LocationInfo>,
        transmit_side: bool,
    ) -> Result<f64, GainError> {
        match pattern {
            AntennaPattern::Fixed(gain) => Ok(gain),
            AntennaPattern::Profile(id) => {
                let profile = self.profiles.get(&id).ok_or(GainError::AntennaProfile(id))?;
                let location = location.ok_or(GainError::Location)?;
                let angle = if transmit_side {
                    look_angle(&location.tx, &location.rx)
                } else {
                    look_angle(&location.rx, &location.tx)
                };
                if angle.elevation_deg < profile.horizon_deg {
                    return Err(GainError::Horizon);
                }
                Ok(profile.peak_gain_dbi)
            }
        }
    }
}
