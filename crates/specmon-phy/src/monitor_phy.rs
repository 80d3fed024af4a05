//! Monitor PHY
//!
//! Entry point for everything a node receives: inbound transmissions are
//! filtered against the frequencies of interest, routed to the spectrum
//! map entry of their sub-id and combined into the accumulator. Provider
//! events (positions, pathloss, antennas, fading selections) update the
//! shared signal models.
//!
//! Every outcome lands in [`MonitorMetrics`]. Drops are logged at debug.

use specmon_core::geo::Position;
use specmon_core::observe::MonitorMetrics;
use specmon_core::provider::{
    Antenna, AntennaPattern, AntennaProfile, AntennaProfileId, FadingSelection,
};
use specmon_core::{
    ConfigError, DropCause, DropReport, MonitorConfig, NemId, PhyHeader, ProcessResult,
    ReceivePowerMap, SignalModels, TimePoint,
};
use std::sync::Arc;
use std::time::Instant;

use crate::spectrum_map::SpectrumMap;

/// Provider updates delivered alongside inbound messages.
#[derive(Debug, Clone, PartialEq)]
pub enum PhyEvent {
    Location { nem_id: NemId, position: Position },
    Pathloss { nem_id: NemId, pathloss_db: f64 },
    AntennaProfile { id: AntennaProfileId, profile: AntennaProfile },
    Antenna { nem_id: NemId, antenna: Antenna },
    RxAntenna(AntennaPattern),
    FadingSelection { nem_id: NemId, selection: FadingSelection },
}

#[derive(Debug)]
pub struct MonitorPhy {
    config: MonitorConfig,
    models: SignalModels,
    map: SpectrumMap,
    metrics: Arc<MonitorMetrics>,
    receive_powers: ReceivePowerMap,
    growth_warned: bool,
}

impl MonitorPhy {
    /// Validates the configuration and builds providers from it.
    pub fn new(config: MonitorConfig) -> Result<Self, ConfigError> {
        let models = SignalModels::from_config(config.nemid, &config);
        Self::with_models(config, models)
    }

    /// Use externally built providers, e.g. with registered fading algorithms.
    pub fn with_models(config: MonitorConfig, models: SignalModels) -> Result<Self, ConfigError> {
        config.validate()?;
        let map = SpectrumMap::new(
            config.limits(),
            Arc::new(config.spectral_mask_table()),
            0,
            config.receivepowertableenable,
        )?;

        tracing::info!(
            nemid = config.nemid,
            bin_size = %config.noisebinsize,
            clamp = config.noisemaxclampenable,
            propagation = ?config.propagationmodel,
            rx_sensitivity_dbm = config.receiver_sensitivity_dbm(),
            "monitor phy configured"
        );

        Ok(Self {
            config,
            models,
            map,
            metrics: Arc::new(MonitorMetrics::new()),
            receive_powers: ReceivePowerMap::new(),
            growth_warned: false,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn models(&self) -> &SignalModels {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut SignalModels {
        &mut self.models
    }

    pub fn spectrum_map(&self) -> &SpectrumMap {
        &self.map
    }

    pub fn metrics(&self) -> Arc<MonitorMetrics> {
        self.metrics.clone()
    }

    /// Latest link budget per (transmitter, antennas, frequency). Empty
    /// unless `receivepowertableenable` is set.
    pub fn receive_power_table(&self) -> &ReceivePowerMap {
        &self.receive_powers
    }

    pub fn receiver_sensitivity_dbm(&self) -> f64 {
        self.config.receiver_sensitivity_dbm()
    }

    /// Process one inbound transmission.
    pub fn process_upstream(&mut self, now: TimePoint, header: &PhyHeader) -> ProcessResult {
        let started = Instant::now();
        self.metrics.messages_in.inc();

        let result = self.combine(now, header);

        match &result {
            ProcessResult::Success(report) => {
                self.metrics.messages_accepted.inc();
                self.metrics
                    .gain_cache_hits
                    .inc_by(report.gain_cache_hits as u64);
                self.metrics
                    .gain_cache_misses
                    .inc_by(report.gain_cache_misses as u64);
                if report.time_synced() {
                    self.metrics.time_sync_rewrites.inc();
                }
                if self.config.receivepowertableenable {
                    self.receive_powers
                        .extend(report.receive_power_map.iter().map(|(k, v)| (*k, *v)));
                }
                if report.new_frequencies() > 0 {
                    self.track_growth();
                }
            }
            ProcessResult::Dropped(report) => {
                self.metrics.record_drop(report.cause);
                tracing::debug!(
                    sub_id = header.sub_id,
                    cause = %report.cause,
                    code = report.cause.code(),
                    transmitter = ?report.transmitter,
                    antenna = ?report.antenna,
                    detail = %report.detail,
                    "message dropped"
                );
            }
        }

        self.metrics
            .process_latency_us
            .observe(started.elapsed().as_secs_f64() * 1e6);
        result
    }

    fn combine(&mut self, now: TimePoint, header: &PhyHeader) -> ProcessResult {
        // missing control outranks every other drop cause
        if header.transmitters.is_empty() || header.transmit_antennas.is_empty() {
            return ProcessResult::Dropped(
                DropReport::new(DropCause::MissingControl)
                    .detail("no transmitters or transmit antennas"),
            );
        }

        let foi = &self.config.frequenciesofinterest;
        if !foi.is_empty() {
            if let Some(frequency) = header.frequencies().find(|f| !foi.contains(f)) {
                return ProcessResult::Dropped(
                    DropReport::new(DropCause::NotFoi)
                        .detail(format!("{} Hz not a frequency of interest", frequency)),
                );
            }
        }

        let bandwidth = header.bandwidth_hz().unwrap_or(self.config.bandwidth);
        let entry = match self.map.entry(header.sub_id, bandwidth) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(sub_id = header.sub_id, error = %e, "cannot create accumulator");
                return ProcessResult::Dropped(
                    DropReport::new(DropCause::SpectrumClamp).detail(e.to_string()),
                );
            }
        };

        entry
            .processor
            .process(now, header, &mut self.models, &mut entry.monitor)
    }

    fn track_growth(&mut self) {
        let tracked = self.map.frequency_count();
        self.metrics.tracked_frequencies.set(tracked as i64);
        self.metrics.tracked_sub_ids.set(self.map.len() as i64);

        if tracked > self.config.maxtrackedfrequencies && !self.growth_warned {
            self.growth_warned = true;
            tracing::warn!(
                tracked,
                limit = self.config.maxtrackedfrequencies,
                "tracked frequencies exceed limit, accumulators are never evicted"
            );
        }
    }

    pub fn handle_event(&mut self, event: PhyEvent) {
        match event {
            PhyEvent::Location { nem_id, position } => {
                self.models.locations.update(nem_id, position);
            }
            PhyEvent::Pathloss {
                nem_id,
                pathloss_db,
            } => {
                if !self.models.propagation.set_pathloss(nem_id, pathloss_db) {
                    tracing::debug!(
                        nem_id,
                        model = ?self.models.propagation.kind(),
                        "pathloss event ignored by location based model"
                    );
                }
            }
            PhyEvent::AntennaProfile { id, profile } => {
                self.models.gains.add_profile(id, profile);
            }
            PhyEvent::Antenna { nem_id, antenna } => {
                self.models.gains.set_antenna(nem_id, antenna);
            }
            PhyEvent::RxAntenna(pattern) => {
                self.models.gains.set_rx_antenna(pattern);
            }
            PhyEvent::FadingSelection { nem_id, selection } => {
                self.models.fading.select(nem_id, selection);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use specmon_core::provider::PropagationKind;
    use specmon_core::{FrequencySegment, Microseconds, Transmitter};
    use std::collections::BTreeSet;

    const FREQ: u64 = 2_400_000_000;

    fn header(sub_id: u16, now: TimePoint, frequency: u64) -> PhyHeader {
        PhyHeader::simple(
            sub_id,
            now,
            Transmitter::new(2, 20.0),
            1_000_000,
            vec![FrequencySegment::new(frequency, Microseconds(0), Microseconds(100_000))],
        )
    }

    fn phy(config: MonitorConfig) -> MonitorPhy {
        let mut phy = MonitorPhy::new(config).unwrap();
        phy.handle_event(PhyEvent::Pathloss {
            nem_id: 2,
            pathloss_db: 60.0,
        });
        phy
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MonitorConfig {
            noisebinsize: Microseconds(7),
            ..Default::default()
        };
        assert!(MonitorPhy::new(config).is_err());
    }

    #[test]
    fn test_accepted_message_counts() {
        let mut phy = phy(MonitorConfig::default());
        let now = TimePoint::from_secs(100);

        assert!(phy.process_upstream(now, &header(0, now, FREQ)).is_success());
        assert!(phy.process_upstream(now, &header(0, now, FREQ)).is_success());

        let snapshot = phy.metrics().snapshot();
        assert_eq!(snapshot.messages_in, 2);
        assert_eq!(snapshot.messages_accepted, 2);
        assert_eq!(snapshot.gain_cache_misses, 1);
        assert_eq!(snapshot.gain_cache_hits, 1);
        assert_eq!(snapshot.tracked_frequencies, 1);
        assert_eq!(snapshot.process_latency_count, 2);
    }

    #[test]
    fn test_not_foi_drop() {
        let config = MonitorConfig {
            frequenciesofinterest: BTreeSet::from([FREQ]),
            ..Default::default()
        };
        let mut phy = phy(config);
        let now = TimePoint::from_secs(100);

        let result = phy.process_upstream(now, &header(0, now, 2_500_000_000));
        assert_eq!(result.drop_cause(), Some(DropCause::NotFoi));
        assert!(phy.spectrum_map().is_empty());
        assert_eq!(phy.metrics().drops(DropCause::NotFoi), 1);

        assert!(phy.process_upstream(now, &header(0, now, FREQ)).is_success());
    }

    #[test]
    fn test_missing_control_precedes_not_foi() {
        let config = MonitorConfig {
            frequenciesofinterest: BTreeSet::from([FREQ]),
            ..Default::default()
        };
        let mut phy = phy(config);
        let now = TimePoint::from_secs(100);

        let mut h = header(0, now, 2_500_000_000);
        h.transmitters.clear();
        let result = phy.process_upstream(now, &h);
        assert_eq!(result.drop_cause(), Some(DropCause::MissingControl));
        assert_eq!(phy.metrics().drops(DropCause::MissingControl), 1);
        assert_eq!(phy.metrics().drops(DropCause::NotFoi), 0);
        assert!(phy.spectrum_map().is_empty());

        let mut h = header(0, now, 2_500_000_000);
        h.transmit_antennas.clear();
        let result = phy.process_upstream(now, &h);
        assert_eq!(result.drop_cause(), Some(DropCause::MissingControl));
    }

    #[test]
    fn test_propagation_drop_counted() {
        let mut phy = MonitorPhy::new(MonitorConfig::default()).unwrap();
        let now = TimePoint::from_secs(100);
        let result = phy.process_upstream(now, &header(0, now, FREQ));
        assert_eq!(result.drop_cause(), Some(DropCause::PropagationModel));
        assert_eq!(phy.metrics().snapshot().error_drops(), 1);
    }

    #[test]
    fn test_sub_ids_get_own_accumulators() {
        let mut phy = phy(MonitorConfig::default());
        let now = TimePoint::from_secs(100);
        phy.process_upstream(now, &header(1, now, FREQ));
        phy.process_upstream(now, &header(2, now, FREQ + 1_000_000));

        let map = phy.spectrum_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(1).map(|e| e.monitor.frequencies().collect::<Vec<_>>()), Some(vec![FREQ]));
        assert_eq!(map.frequency_count(), 2);
        assert_eq!(phy.metrics().snapshot().tracked_sub_ids, 2);
    }

    #[test]
    fn test_receive_power_table() {
        let config = MonitorConfig {
            receivepowertableenable: true,
            ..Default::default()
        };
        let mut phy = phy(config);
        let now = TimePoint::from_secs(100);
        phy.process_upstream(now, &header(0, now, FREQ));

        let table = phy.receive_power_table();
        assert_eq!(table.len(), 1);
        let (key, entry) = table.iter().next().unwrap();
        assert_eq!(key.transmitter, 2);
        assert_eq!(key.frequency_hz, FREQ);
        assert_relative_eq!(entry.power_dbm, -40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pathloss_event_ignored_by_freespace() {
        let config = MonitorConfig {
            propagationmodel: PropagationKind::FreeSpace,
            ..Default::default()
        };
        let mut phy = MonitorPhy::new(config).unwrap();
        phy.handle_event(PhyEvent::Pathloss {
            nem_id: 2,
            pathloss_db: 60.0,
        });

        // No positions yet, so the location based model cannot answer.
        let now = TimePoint::from_secs(100);
        let result = phy.process_upstream(now, &header(0, now, FREQ));
        assert_eq!(result.drop_cause(), Some(DropCause::PropagationModel));

        phy.handle_event(PhyEvent::Location {
            nem_id: 1,
            position: Position::new(40.0, -74.0, 10.0),
        });
        phy.handle_event(PhyEvent::Location {
            nem_id: 2,
            position: Position::new(40.01, -74.0, 10.0),
        });
        assert!(phy.process_upstream(now, &header(0, now, FREQ)).is_success());
    }

    #[test]
    fn test_growth_warning_once() {
        let config = MonitorConfig {
            maxtrackedfrequencies: 1,
            ..Default::default()
        };
        let mut phy = phy(config);
        let now = TimePoint::from_secs(100);
        for i in 0..3 {
            phy.process_upstream(now, &header(0, now, FREQ + i * 1_000_000));
        }
        assert!(phy.growth_warned);
        assert_eq!(phy.metrics().snapshot().tracked_frequencies, 3);
    }
}
