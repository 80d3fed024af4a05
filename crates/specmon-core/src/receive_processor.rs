//! Receive combiner
//!
//! Turns one inbound transmission into per-segment noise contributions:
//!
//! ```text
//! for each transmit antenna
//!     group = frequency_groups[antenna.frequency_group_index]
//!     for each transmitter
//!         pathloss[]  <- propagation(tx, location, group)
//!         gain        <- gain(tx, antenna.index, location)
//!         fading      <- fading selection for tx
//!         for each segment
//!             dBm = tx power + gain - pathloss[segment]
//!             mW[segment] += fade(dBm)
//!     monitor.update(group, mW[], delay, ...)
//! ```
//!
//! The first failing stage drops the whole message. Antennas already
//! submitted to the monitor stay submitted; the remaining ones are not
//! processed.

use crate::drop_cause::DropCause;
use crate::provider::{FadingModel, GainError, SignalModels};
use crate::spectrum_monitor::{Reception, SpectrumMonitor, SpectrumUpdate};
use crate::time::{Microseconds, TimePoint};
use crate::types::{AntennaIndex, NemId, PhyHeader, SubId};
use crate::units::{dbm_to_mw, mw_to_dbm, propagation_delay_us};
use std::collections::BTreeMap;

/// Key of a receive power table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceivePowerKey {
    pub transmitter: NemId,
    pub rx_antenna: AntennaIndex,
    pub tx_antenna: AntennaIndex,
    pub frequency_hz: u64,
}

/// Link budget of one transmitter on one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceivePowerEntry {
    pub power_dbm: f64,
    pub tx_gain_dbi: f64,
    pub rx_gain_dbi: f64,
    pub tx_power_dbm: f64,
    pub pathloss_db: f64,
}

pub type ReceivePowerMap = BTreeMap<ReceivePowerKey, ReceivePowerEntry>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReceiveReport {
    pub gain_cache_hits: usize,
    pub gain_cache_misses: usize,
    /// One monitor update per transmit antenna
    pub updates: Vec<SpectrumUpdate>,
    /// Populated only when enabled
    pub receive_power_map: ReceivePowerMap,
}

impl ReceiveReport {
    pub fn time_synced(&self) -> bool {
        self.updates.iter().any(|u| u.time_synced)
    }

    pub fn segments_updated(&self) -> usize {
        self.updates.iter().map(|u| u.updated).sum()
    }

    pub fn new_frequencies(&self) -> usize {
        self.updates.iter().map(|u| u.new_frequencies).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropReport {
    pub cause: DropCause,
    pub antenna: Option<AntennaIndex>,
    pub transmitter: Option<NemId>,
    pub detail: String,
}

impl DropReport {
    pub fn new(cause: DropCause) -> Self {
        Self {
            cause,
            antenna: None,
            transmitter: None,
            detail: String::new(),
        }
    }

    fn antenna(mut self, antenna: AntennaIndex) -> Self {
        self.antenna = Some(antenna);
        self
    }

    fn transmitter(mut self, transmitter: NemId) -> Self {
        self.transmitter = Some(transmitter);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    Success(ReceiveReport),
    Dropped(DropReport),
}

impl ProcessResult {
    pub fn drop_cause(&self) -> Option<DropCause> {
        match self {
            ProcessResult::Success(_) => None,
            ProcessResult::Dropped(report) => Some(report.cause),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessResult::Success(_))
    }
}

impl From<GainError> for DropCause {
    fn from(err: GainError) -> Self {
        match err {
            GainError::Location => DropCause::GainManagerLocation,
            GainError::AntennaProfile(_) => DropCause::GainManagerAntennaProfile,
            GainError::Horizon => DropCause::GainManagerHorizon,
            GainError::AntennaIndex(_) => DropCause::GainManagerAntennaIndex,
        }
    }
}

#[derive(Debug)]
pub struct ReceiveProcessor {
    sub_id: SubId,
    rx_antenna: AntennaIndex,
    populate_receive_power_map: bool,
    sequence: u64,
}

impl ReceiveProcessor {
    pub fn new(sub_id: SubId, rx_antenna: AntennaIndex, populate_receive_power_map: bool) -> Self {
        Self {
            sub_id,
            rx_antenna,
            populate_receive_power_map,
            sequence: 0,
        }
    }

    pub fn sub_id(&self) -> SubId {
        self.sub_id
    }

    /// Messages processed so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn process(
        &mut self,
        now: TimePoint,
        header: &PhyHeader,
        models: &mut SignalModels,
        monitor: &mut SpectrumMonitor,
    ) -> ProcessResult {
        self.sequence += 1;

        if header.transmitters.is_empty() || header.transmit_antennas.is_empty() {
            return ProcessResult::Dropped(
                DropReport::new(DropCause::MissingControl).detail("no transmitters or transmit antennas"),
            );
        }

        let transmitters: Vec<NemId> = header.transmitters.iter().map(|t| t.nem_id).collect();
        let location_generation = models.locations.generation();

        let mut report = ReceiveReport::default();

        for antenna in &header.transmit_antennas {
            let segments = match header.frequency_groups.get(antenna.frequency_group_index) {
                Some(segments) => segments,
                None => {
                    return ProcessResult::Dropped(
                        DropReport::new(DropCause::AntennaFreqIndex)
                            .antenna(antenna.index)
                            .detail(format!(
                                "frequency group {} of {}",
                                antenna.frequency_group_index,
                                header.frequency_groups.len()
                            )),
                    );
                }
            };

            let mut powers_mw = vec![0.0; segments.len()];
            let mut propagation_delay: Option<Microseconds> = None;

            for transmitter in &header.transmitters {
                let tx = transmitter.nem_id;
                let dropped = |cause: DropCause| DropReport::new(cause).antenna(antenna.index).transmitter(tx);

                let location = models.locations.location_info(tx);

                let pathloss = match models.propagation.pathloss(tx, location.as_ref(), segments) {
                    Some(pathloss) => pathloss,
                    None => return ProcessResult::Dropped(dropped(DropCause::PropagationModel)),
                };

                let gain = match models.gains.gain(tx, antenna.index, location.as_ref(), location_generation) {
                    Ok(gain) => gain,
                    Err(err) => {
                        return ProcessResult::Dropped(dropped(err.into()).detail(err.to_string()));
                    }
                };

                if gain.cache_hit {
                    report.gain_cache_hits += 1;
                } else {
                    report.gain_cache_misses += 1;
                }

                let fading = match models.fading.resolve(tx) {
                    Some(fading) => fading,
                    None => return ProcessResult::Dropped(dropped(DropCause::FadingManagerSelection)),
                };

                for ((segment, pathloss_db), total_mw) in
                    segments.iter().zip(&pathloss).zip(powers_mw.iter_mut())
                {
                    let tx_power_dbm = segment.power_dbm.unwrap_or(transmitter.power_dbm);
                    let power_dbm = tx_power_dbm + gain.total_dbi() - pathloss_db;

                    let power_mw = match fading.model {
                        FadingModel::None => dbm_to_mw(power_dbm),
                        model => {
                            let location = match location.as_ref() {
                                Some(location) => location,
                                None => {
                                    return ProcessResult::Dropped(dropped(DropCause::FadingManagerLocation))
                                }
                            };
                            match models.fading.algorithm(model) {
                                Some(algorithm) => {
                                    algorithm.apply(power_dbm, location.distance_m, &fading.params)
                                }
                                None => {
                                    return ProcessResult::Dropped(
                                        dropped(DropCause::FadingManagerAlgorithm)
                                            .detail(format!("no {:?} algorithm", model)),
                                    )
                                }
                            }
                        }
                    };

                    *total_mw += power_mw;

                    if self.populate_receive_power_map {
                        report.receive_power_map.insert(
                            ReceivePowerKey {
                                transmitter: tx,
                                rx_antenna: self.rx_antenna,
                                tx_antenna: antenna.index,
                                frequency_hz: segment.frequency_hz,
                            },
                            ReceivePowerEntry {
                                power_dbm: mw_to_dbm(power_mw),
                                tx_gain_dbi: gain.tx_gain_dbi,
                                rx_gain_dbi: gain.rx_gain_dbi,
                                tx_power_dbm,
                                pathloss_db: *pathloss_db,
                            },
                        );
                    }
                }

                // collaborating transmitters are co-timed, the first located one sets the delay
                if propagation_delay.is_none() {
                    if let Some(location) = location.as_ref() {
                        propagation_delay = Some(Microseconds(propagation_delay_us(location.distance_m)));
                    }
                }
            }

            let reception = Reception {
                tx_time: header.tx_time,
                propagation_delay: propagation_delay.unwrap_or(Microseconds::ZERO),
                segments,
                bandwidth_hz: antenna.bandwidth_hz,
                powers_mw: &powers_mw,
                transmitters: &transmitters,
                antenna_index: antenna.index,
                spectral_mask_index: antenna.spectral_mask_index,
            };

            match monitor.update(now, &reception) {
                Ok(update) => report.updates.push(update),
                Err(err) => {
                    return ProcessResult::Dropped(
                        DropReport::new(DropCause::SpectrumClamp)
                            .antenna(antenna.index)
                            .detail(err.to_string()),
                    );
                }
            }
        }

        let out_of_band: usize = report.updates.iter().map(|u| u.out_of_band).sum();
        if out_of_band > 0 && report.segments_updated() == 0 {
            return ProcessResult::Dropped(
                DropReport::new(DropCause::OutOfBand)
                    .detail(format!("{} segments outside the passband", out_of_band)),
            );
        }

        ProcessResult::Success(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Position;
    use crate::provider::{
        Antenna, AntennaPattern, FadingAlgorithm, FadingManager, FadingMode, FadingParams,
        FadingSelection, GainManager, MaskBand, PropagationKind, PropagationModel, SpectralMask,
        SpectralMaskTable,
    };
    use crate::spectrum_monitor::MonitorLimits;
    use crate::types::{FrequencySegment, TransmitAntenna, Transmitter};
    use crate::window::max_noise_bin;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    const LOCAL: NemId = 1;
    const FREQ: u64 = 2_400_000_000;
    const BW: u64 = 1_000_000;

    fn limits() -> MonitorLimits {
        MonitorLimits {
            bin_size: Microseconds(20),
            max_offset: Microseconds(300_000),
            max_propagation: Microseconds(200_000),
            max_duration: Microseconds(1_000_000),
            time_sync_threshold: Microseconds(10_000),
            max_clamp: false,
        }
    }

    fn monitor_with(masks: SpectralMaskTable) -> SpectrumMonitor {
        SpectrumMonitor::new(0, limits(), BW, Arc::new(masks)).unwrap()
    }

    fn models(kind: PropagationKind, fading: FadingMode) -> SignalModels {
        SignalModels::new(
            LOCAL,
            PropagationModel::new(kind),
            GainManager::with_fixed_rx_gain(0.0),
            FadingManager::new(fading, FadingParams::new()),
        )
    }

    fn header(now: TimePoint) -> PhyHeader {
        PhyHeader::simple(
            0,
            now,
            Transmitter::new(2, 20.0),
            BW,
            vec![FrequencySegment::new(FREQ, Microseconds(0), Microseconds(100_000))],
        )
    }

    #[test]
    fn test_end_to_end_single_segment() {
        let now = TimePoint::from_secs(1_000);
        let mut models = models(PropagationKind::Precomputed, FadingMode::None);
        models.propagation.set_pathloss(2, 60.0);
        let mut monitor = monitor_with(SpectralMaskTable::new());
        let mut processor = ReceiveProcessor::new(0, 0, true);

        let result = processor.process(now, &header(now), &mut models, &mut monitor);
        let report = match result {
            ProcessResult::Success(report) => report,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(report.segments_updated(), 1);
        assert_eq!(report.gain_cache_misses, 1);

        let entry = report.receive_power_map.values().next().unwrap();
        assert_relative_eq!(entry.power_dbm, -40.0, epsilon = 1e-9);
        assert_relative_eq!(entry.pathloss_db, 60.0);

        let window = monitor
            .request(now, FREQ, Microseconds(100_000), Some(now))
            .unwrap();
        assert_eq!(window.bins.len(), 5_000);
        assert!(window.bins.iter().all(|b| (*b - 1.0e-4).abs() < 1e-12));

        let max = max_noise_bin(&window, now, Some(now + Microseconds(100_000))).unwrap();
        assert_relative_eq!(max, dbm_to_mw(-40.0), max_relative = 1e-12);

        // second message hits the gain cache
        match processor.process(now, &header(now), &mut models, &mut monitor) {
            ProcessResult::Success(report) => assert_eq!(report.gain_cache_hits, 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(processor.sequence(), 2);
    }

    #[test]
    fn test_antenna_freq_index_wins() {
        let now = TimePoint::from_secs(1_000);
        // no pathloss, no fading selection, no locations: every later stage would fail
        let mut models = models(PropagationKind::FreeSpace, FadingMode::Event);
        let mut monitor = monitor_with(SpectralMaskTable::new());
        let mut processor = ReceiveProcessor::new(0, 0, false);

        let mut header = header(now);
        header.transmit_antennas[0].frequency_group_index = 1;

        for _ in 0..3 {
            let result = processor.process(now, &header, &mut models, &mut monitor);
            assert_eq!(result.drop_cause(), Some(DropCause::AntennaFreqIndex));
        }
        assert_eq!(monitor.frequency_count(), 0);
    }

    #[test]
    fn test_missing_control() {
        let now = TimePoint::from_secs(1_000);
        let mut models = models(PropagationKind::Precomputed, FadingMode::None);
        let mut monitor = monitor_with(SpectralMaskTable::new());
        let mut processor = ReceiveProcessor::new(0, 0, false);

        let mut header = header(now);
        header.transmitters.clear();
        let result = processor.process(now, &header, &mut models, &mut monitor);
        assert_eq!(result.drop_cause(), Some(DropCause::MissingControl));
    }

    #[test]
    fn test_stage_order() {
        let now = TimePoint::from_secs(1_000);
        let mut monitor = monitor_with(SpectralMaskTable::new());
        let mut processor = ReceiveProcessor::new(0, 0, false);

        // pathloss unavailable
        let mut m = models(PropagationKind::Precomputed, FadingMode::Event);
        let result = processor.process(now, &header(now), &mut m, &mut monitor);
        assert_eq!(result.drop_cause(), Some(DropCause::PropagationModel));

        // gain: unknown antenna index
        m.propagation.set_pathloss(2, 60.0);
        let mut h = header(now);
        h.transmit_antennas[0].index = 3;
        let result = processor.process(now, &h, &mut m, &mut monitor);
        assert_eq!(result.drop_cause(), Some(DropCause::GainManagerAntennaIndex));

        // gain: profile antenna without a location
        m.gains.set_antenna(
            2,
            Antenna {
                index: 0,
                pattern: AntennaPattern::Profile(1),
            },
        );
        m.gains.add_profile(
            1,
            crate::provider::AntennaProfile {
                peak_gain_dbi: 3.0,
                horizon_deg: -90.0,
            },
        );
        let result = processor.process(now, &header(now), &mut m, &mut monitor);
        assert_eq!(result.drop_cause(), Some(DropCause::GainManagerLocation));

        // fading selection missing
        m.gains.set_antenna(
            2,
            Antenna {
                index: 0,
                pattern: AntennaPattern::Fixed(0.0),
            },
        );
        let result = processor.process(now, &header(now), &mut m, &mut monitor);
        assert_eq!(result.drop_cause(), Some(DropCause::FadingManagerSelection));

        // nakagami selected, no location
        m.fading.select(
            2,
            FadingSelection {
                model: FadingModel::Nakagami,
                params: FadingParams::new(),
            },
        );
        let result = processor.process(now, &header(now), &mut m, &mut monitor);
        assert_eq!(result.drop_cause(), Some(DropCause::FadingManagerLocation));

        // location known, no algorithm registered
        m.locations.update(LOCAL, Position::new(0.0, 0.0, 0.0));
        m.locations.update(2, Position::new(0.0, 0.01, 0.0));
        let result = processor.process(now, &header(now), &mut m, &mut monitor);
        assert_eq!(result.drop_cause(), Some(DropCause::FadingManagerAlgorithm));
        assert_eq!(monitor.frequency_count(), 0);
    }

    struct Fixed(f64);

    impl FadingAlgorithm for Fixed {
        fn apply(&mut self, _power_dbm: f64, _distance_m: f64, _params: &FadingParams) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_fading_algorithm_and_delay() {
        let now = TimePoint::from_secs(1_000);
        let mut m = models(PropagationKind::Precomputed, FadingMode::Nakagami);
        m.fading.register(FadingModel::Nakagami, Box::new(Fixed(2.0)));
        m.propagation.set_pathloss(2, 60.0);
        m.locations.update(LOCAL, Position::new(0.0, 0.0, 0.0));
        m.locations.update(2, Position::new(0.0, 0.0, 3000.0));

        let mut monitor = monitor_with(SpectralMaskTable::new());
        let mut processor = ReceiveProcessor::new(0, 0, false);
        let report = match processor.process(now, &header(now), &mut m, &mut monitor) {
            ProcessResult::Success(report) => report,
            other => panic!("unexpected {:?}", other),
        };
        // 3 km ~ 10 us
        assert_eq!(report.updates[0].propagation_delay, Microseconds(10));

        let window = monitor
            .request(now, FREQ, Microseconds(20), Some(now + Microseconds(20)))
            .unwrap();
        assert_eq!(window.bins, vec![2.0]);
    }

    #[test]
    fn test_collaborating_transmitters_add() {
        let now = TimePoint::from_secs(1_000);
        let mut m = models(PropagationKind::Precomputed, FadingMode::None);
        m.propagation.set_pathloss(2, 60.0);
        m.propagation.set_pathloss(3, 60.0);
        let mut monitor = monitor_with(SpectralMaskTable::new());
        let mut processor = ReceiveProcessor::new(0, 0, false);

        let mut h = header(now);
        h.transmitters.push(Transmitter::new(3, 20.0));
        assert!(processor.process(now, &h, &mut m, &mut monitor).is_success());

        let window = monitor.request(now, FREQ, Microseconds(20), Some(now)).unwrap();
        assert_relative_eq!(window.bins[0], 2.0e-4, max_relative = 1e-12);
    }

    #[test]
    fn test_clamp_maps_to_drop() {
        let now = TimePoint::from_secs(1_000);
        let mut m = models(PropagationKind::Precomputed, FadingMode::None);
        m.propagation.set_pathloss(2, 60.0);
        let mut monitor = monitor_with(SpectralMaskTable::new());
        let mut processor = ReceiveProcessor::new(0, 0, false);

        let mut h = header(now);
        h.frequency_groups[0][0].duration = Microseconds(2_000_000);
        let result = processor.process(now, &h, &mut m, &mut monitor);
        assert_eq!(result.drop_cause(), Some(DropCause::SpectrumClamp));
    }

    #[test]
    fn test_out_of_band() {
        let now = TimePoint::from_secs(1_000);
        let mut m = models(PropagationKind::Precomputed, FadingMode::None);
        m.propagation.set_pathloss(2, 60.0);

        let mut masks = SpectralMaskTable::new();
        masks.insert(
            5,
            SpectralMask {
                bands: vec![MaskBand {
                    lower_offset_hz: 5_000_000,
                    upper_offset_hz: 6_000_000,
                    level_db: 0.0,
                }],
            },
        );
        let mut monitor = monitor_with(masks);
        let mut processor = ReceiveProcessor::new(0, 0, false);

        let mut h = header(now);
        h.transmit_antennas = vec![TransmitAntenna {
            index: 0,
            frequency_group_index: 0,
            bandwidth_hz: BW,
            spectral_mask_index: 5,
        }];
        let result = processor.process(now, &h, &mut m, &mut monitor);
        assert_eq!(result.drop_cause(), Some(DropCause::OutOfBand));
        assert!(!DropCause::OutOfBand.is_error());
    }
}
