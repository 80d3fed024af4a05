//! Spectrum map: one accumulator and one receive combiner per sub-id,
//! created on first use and kept for the life of the node.

use specmon_core::provider::SpectralMaskTable;
use specmon_core::{
    AntennaIndex, ConfigError, MonitorLimits, ReceiveProcessor, SpectrumMonitor, SubId,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct SpectrumMapEntry {
    pub monitor: SpectrumMonitor,
    pub processor: ReceiveProcessor,
}

impl SpectrumMapEntry {
    pub fn bandwidth_hz(&self) -> u64 {
        self.monitor.bandwidth_hz()
    }
}

#[derive(Debug)]
pub struct SpectrumMap {
    limits: MonitorLimits,
    masks: Arc<SpectralMaskTable>,
    rx_antenna: AntennaIndex,
    populate_receive_power_map: bool,
    entries: BTreeMap<SubId, SpectrumMapEntry>,
}

impl SpectrumMap {
    pub fn new(
        limits: MonitorLimits,
        masks: Arc<SpectralMaskTable>,
        rx_antenna: AntennaIndex,
        populate_receive_power_map: bool,
    ) -> Result<Self, ConfigError> {
        limits.validate()?;
        Ok(Self {
            limits,
            masks,
            rx_antenna,
            populate_receive_power_map,
            entries: BTreeMap::new(),
        })
    }

    /// Entry for `sub_id`, created if missing. The receiver bandwidth is
    /// resynced to `bandwidth_hz` on every call.
    pub fn entry(
        &mut self,
        sub_id: SubId,
        bandwidth_hz: u64,
    ) -> Result<&mut SpectrumMapEntry, ConfigError> {
        use std::collections::btree_map::Entry;

        let entry = match self.entries.entry(sub_id) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let monitor =
                    SpectrumMonitor::new(sub_id, self.limits, bandwidth_hz, self.masks.clone())?;
                tracing::debug!(sub_id, bandwidth_hz, "spectrum map entry created");
                vacant.insert(SpectrumMapEntry {
                    monitor,
                    processor: ReceiveProcessor::new(
                        sub_id,
                        self.rx_antenna,
                        self.populate_receive_power_map,
                    ),
                })
            }
        };

        if entry.monitor.bandwidth_hz() != bandwidth_hz {
            tracing::debug!(
                sub_id,
                from = entry.monitor.bandwidth_hz(),
                to = bandwidth_hz,
                "receiver bandwidth resynced"
            );
            entry.monitor.set_bandwidth(bandwidth_hz);
        }
        Ok(entry)
    }

    pub fn get(&self, sub_id: SubId) -> Option<&SpectrumMapEntry> {
        self.entries.get(&sub_id)
    }

    /// Entries in ascending sub-id order.
    pub fn iter(&self) -> impl Iterator<Item = (SubId, &SpectrumMapEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked frequencies summed over every sub-id.
    pub fn frequency_count(&self) -> usize {
        self.entries.values().map(|e| e.monitor.frequency_count()).sum()
    }
}
