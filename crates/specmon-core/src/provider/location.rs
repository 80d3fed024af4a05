//! Node positions from location events.

use crate::geo::Position;
use crate::types::NemId;
use std::collections::HashMap;

/// Geometry between one transmitter and the local receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationInfo {
    /// Slant range in meters
    pub distance_m: f64,
    pub tx: Position,
    pub rx: Position,
}

/// Latest known position of every node.
#[derive(Debug, Clone)]
pub struct LocationManager {
    local: NemId,
    positions: HashMap<NemId, Position>,
    generation: u64,
}

impl LocationManager {
    pub fn new(local: NemId) -> Self {
        Self {
            local,
            positions: HashMap::new(),
            generation: 0,
        }
    }

    pub fn local(&self) -> NemId {
        self.local
    }

    /// Record a position. Every call advances the generation.
    pub fn update(&mut self, nem_id: NemId, position: Position) {
        self.positions.insert(nem_id, position);
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn position(&self, nem_id: NemId) -> Option<&Position> {
        self.positions.get(&nem_id)
    }

    /// Changes whenever any position changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Geometry from `tx` to the local node, `None` unless both positions
    /// are known.
    pub fn location_info(&self, tx: NemId) -> Option<LocationInfo> {
        let tx_pos = self.positions.get(&tx)?;
        let rx_pos = self.positions.get(&self.local)?;
        Some(LocationInfo {
            distance_m: tx_pos.to_ecef().distance_to(&rx_pos.to_ecef()),
            tx: *tx_pos,
            rx: *rx_pos,
        })
    }
}
