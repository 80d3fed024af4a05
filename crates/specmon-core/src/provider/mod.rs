//! Signal model providers
//!
//! The receive combiner consults these for every transmitter of every
//! message:
//!
//! - [`LocationManager`]: node positions and tx/rx geometry
//! - [`PropagationModel`]: per-segment pathloss
//! - [`GainManager`]: combined antenna gain, cached per antenna
//! - [`FadingManager`]: fading model selection and algorithms
//! - [`SpectralMaskTable`]: mask overlap, injected into each accumulator
//!
//! Variants are picked once at configuration time.

pub mod fading;
pub mod gain;
pub mod location;
pub mod propagation;
pub mod spectral_mask;

pub use fading::{
    FadingAlgorithm, FadingAlgorithmStore, FadingManager, FadingMode, FadingModel, FadingParams,
    FadingSelection,
};
pub use gain::{
    Antenna, AntennaGain, AntennaPattern, AntennaProfile, AntennaProfileId, GainError, GainManager,
};
pub use location::{LocationInfo, LocationManager};
pub use propagation::{PropagationKind, PropagationModel};
pub use spectral_mask::{MaskBand, MaskOverlap, OverlapSegment, SpectralMask, SpectralMaskTable};

use crate::config::MonitorConfig;
use crate::types::NemId;

/// The per-node provider set handed to the receive combiner.
#[derive(Debug)]
pub struct SignalModels {
    pub locations: LocationManager,
    pub propagation: PropagationModel,
    pub gains: GainManager,
    pub fading: FadingManager,
}

impl SignalModels {
    pub fn new(
        local: NemId,
        propagation: PropagationModel,
        gains: GainManager,
        fading: FadingManager,
    ) -> Self {
        Self {
            locations: LocationManager::new(local),
            propagation,
            gains,
            fading,
        }
    }

    /// Providers as selected by configuration.
    pub fn from_config(local: NemId, config: &MonitorConfig) -> Self {
        let rx_antenna = if config.fixedantennagainenable {
            AntennaPattern::Fixed(config.fixedantennagain)
        } else {
            AntennaPattern::Profile(config.antennaprofileid)
        };
        let mut gains = GainManager::new(rx_antenna);
        for (id, profile) in &config.antennaprofiles {
            gains.add_profile(*id, *profile);
        }
        Self::new(
            local,
            PropagationModel::new(config.propagationmodel),
            gains,
            FadingManager::new(config.fading.model, config.fading.params.clone()),
        )
    }
}
