//! Fading model resolution.
//!
//! The configured mode either applies one model to every transmitter or
//! defers to per-transmitter selection events. Algorithms are registered in
//! a [`FadingAlgorithmStore`]; the `none` model needs no algorithm and
//! converts dBm straight to milliwatts.

use crate::types::NemId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadingModel {
    None,
    Nakagami,
}

/// How a transmitter's fading model is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadingMode {
    /// No fading for anyone
    #[default]
    None,
    /// Per-transmitter selection events
    Event,
    /// Nakagami for everyone
    Nakagami,
}

/// Model-specific named parameters.
pub type FadingParams = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct FadingSelection {
    pub model: FadingModel,
    pub params: FadingParams,
}

/// A fading algorithm turning a received power into linear milliwatts.
pub trait FadingAlgorithm: Send {
    fn apply(&mut self, power_dbm: f64, distance_m: f64, params: &FadingParams) -> f64;
}

#[derive(Default)]
pub struct FadingAlgorithmStore {
    algorithms: HashMap<FadingModel, Box<dyn FadingAlgorithm>>,
}

impl FadingAlgorithmStore {
    pub fn register(&mut self, model: FadingModel, algorithm: Box<dyn FadingAlgorithm>) {
        self.algorithms.insert(model, algorithm);
    }

    pub fn get_mut(&mut self, model: FadingModel) -> Option<&mut (dyn FadingAlgorithm + 'static)> {
        self.algorithms.get_mut(&model).map(|a| a.as_mut())
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }
}

impl std::fmt::Debug for FadingAlgorithmStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FadingAlgorithmStore")
            .field("models", &self.algorithms.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct FadingManager {
    mode: FadingMode,
    params: FadingParams,
    selections: HashMap<NemId, FadingSelection>,
    store: FadingAlgorithmStore,
}

impl FadingManager {
    pub fn new(mode: FadingMode, params: FadingParams) -> Self {
        Self {
            mode,
            params,
            selections: HashMap::new(),
            store: FadingAlgorithmStore::default(),
        }
    }

    pub fn mode(&self) -> FadingMode {
        self.mode
    }

    pub fn register(&mut self, model: FadingModel, algorithm: Box<dyn FadingAlgorithm>) {
        self.store.register(model, algorithm);
    }

    /// Apply a fading selection event.
    pub fn select(&mut self, tx: NemId, selection: FadingSelection) {
        self.selections.insert(tx, selection);
    }

    /// Model and parameters in effect for a transmitter, `None` when the
    /// mode is event driven and no selection has arrived.
    pub fn resolve(&self, tx: NemId) -> Option<FadingSelection> {
        match self.mode {
            FadingMode::None => Some(FadingSelection {
                model: FadingModel::None,
                params: FadingParams::new(),
            }),
            FadingMode::Nakagami => Some(FadingSelection {
                model: FadingModel::Nakagami,
                params: self.params.clone(),
            }),
            FadingMode::Event => self.selections.get(&tx).cloned(),
        }
    }

    pub fn algorithm(&mut self, model: FadingModel) -> Option<&mut (dyn FadingAlgorithm + 'static)> {
        self.store.get_mut(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Halve;

    impl FadingAlgorithm for Halve {
        fn apply(&mut self, power_dbm: f64, _distance_m: f64, _params: &FadingParams) -> f64 {
            crate::units::dbm_to_mw(power_dbm) / 2.0
        }
    }

    #[test]
    fn test_event_mode_needs_selection() {
        let mut fading = FadingManager::new(FadingMode::Event, FadingParams::new());
        assert!(fading.resolve(4).is_none());
        fading.select(
            4,
            FadingSelection {
                model: FadingModel::Nakagami,
                params: FadingParams::new(),
            },
        );
        assert_eq!(fading.resolve(4).unwrap().model, FadingModel::Nakagami);
        assert!(fading.algorithm(FadingModel::Nakagami).is_none());
    }

    #[test]
    fn test_registered_algorithm() {
        let mut fading = FadingManager::new(FadingMode::Nakagami, FadingParams::new());
        fading.register(FadingModel::Nakagami, Box::new(Halve));
        let mw = fading
            .algorithm(FadingModel::Nakagami)
            .unwrap()
            .apply(0.0, 100.0, &FadingParams::new());
        assert_eq!(mw, 0.5);
        assert_eq!(fading.resolve(9).unwrap().model, FadingModel::Nakagami);
    }
}
