//! Propagation pathloss variants.
//!
//! The variant is chosen once from configuration. `Precomputed` serves
//! pathloss events per transmitter and ignores geometry; the distance
//! based variants need a resolved location.

use super::location::LocationInfo;
use crate::geo::{free_space_pathloss_db, two_ray_pathloss_db};
use crate::types::{FrequencySegment, NemId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configured propagation model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PropagationKind {
    #[default]
    #[serde(rename = "precomputed")]
    Precomputed,
    #[serde(rename = "freespace")]
    FreeSpace,
    #[serde(rename = "2ray")]
    TwoRay,
}

#[derive(Debug, Clone)]
pub enum PropagationModel {
    /// Pathloss in dB from each transmitter to the local node
    Precomputed(HashMap<NemId, f64>),
    FreeSpace,
    TwoRay,
}

impl PropagationModel {
    pub fn new(kind: PropagationKind) -> Self {
        match kind {
            PropagationKind::Precomputed => PropagationModel::Precomputed(HashMap::new()),
            PropagationKind::FreeSpace => PropagationModel::FreeSpace,
            PropagationKind::TwoRay => PropagationModel::TwoRay,
        }
    }

    pub fn kind(&self) -> PropagationKind {
        match self {
            PropagationModel::Precomputed(_) => PropagationKind::Precomputed,
            PropagationModel::FreeSpace => PropagationKind::FreeSpace,
            PropagationModel::TwoRay => PropagationKind::TwoRay,
        }
    }

    /// Apply a pathloss event. Only the precomputed variant keeps it;
    /// returns whether it was used.
    pub fn set_pathloss(&mut self, tx: NemId, pathloss_db: f64) -> bool {
        match self {
            PropagationModel::Precomputed(table) => {
                table.insert(tx, pathloss_db);
                true
            }
            _ => false,
        }
    }

    /// One pathloss per segment, or `None` when the model cannot resolve
    /// this transmitter.
    pub fn pathloss(
        &self,
        tx: NemId,
        location: Option<&LocationInfo>,
        segments: &[FrequencySegment],
    ) -> Option<Vec<f64>> {
        match self {
            PropagationModel::Precomputed(table) => {
                let pathloss = *table.get(&tx)?;
                Some(vec![pathloss; segments.len()])
            }
            PropagationModel::FreeSpace => {
                let location = location?;
                Some(
                    segments
                        .iter()
                        .map(|s| free_space_pathloss_db(location.distance_m, s.frequency_hz as f64))
                        .collect(),
                )
            }
            PropagationModel::TwoRay => {
                let location = location?;
                let two_ray = two_ray_pathloss_db(
                    location.distance_m,
                    location.tx.altitude_m,
                    location.rx.altitude_m,
                )?;
                // Inside the crossover distance free space dominates
                Some(
                    segments
                        .iter()
                        .map(|s| {
                            free_space_pathloss_db(location.distance_m, s.frequency_hz as f64)
                                .max(two_ray)
                        })
                        .collect(),
                )
            }
        }
    }
}
