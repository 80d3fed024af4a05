//! Per sub-id noise accumulator set
//!
//! A [`SpectrumMonitor`] owns one [`NoiseRecorder`] per observed frequency
//! and applies the timing policy to every reception before it reaches a
//! recorder:
//!
//! 1. Segment and power counts must match, otherwise nothing is written.
//! 2. A transmission time further than the sync threshold from `now` is
//!    replaced by `now`.
//! 3. Propagation delay, segment offsets and durations above their
//!    ceilings are clamped when clamping is enabled and rejected otherwise.
//!    Every segment is checked before any bin is touched.
//! 4. Segments with zero power are skipped; the rest are scaled by the
//!    spectral mask overlap and added over
//!    `[tx + offset + delay, tx + offset + delay + duration)`.

use crate::error::{ConfigError, Result, SpectrumError};
use crate::noise_recorder::NoiseRecorder;
use crate::provider::SpectralMaskTable;
use crate::time::{Microseconds, TimePoint};
use crate::types::{AntennaIndex, FrequencySegment, NemId, SpectralMaskIndex, SubId};
use crate::window::SpectrumWindow;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Timing ceilings and policy shared by every recorder of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorLimits {
    pub bin_size: Microseconds,
    pub max_offset: Microseconds,
    pub max_propagation: Microseconds,
    pub max_duration: Microseconds,
    pub time_sync_threshold: Microseconds,
    /// Clamp values above their ceiling instead of rejecting the reception
    pub max_clamp: bool,
}

impl MonitorLimits {
    /// The ring span must be a whole number of bins.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.bin_size.is_zero() {
            return Err(ConfigError::ValidationError(
                "noisebinsize must be > 0".to_string(),
            ));
        }
        let span = self.max_offset + self.max_propagation + 2 * self.max_duration;
        if !(span % self.bin_size).is_zero() {
            return Err(ConfigError::ValidationError(format!(
                "noisemaxsegmentoffset + noisemaxmessagepropagation + 2 * noisemaxsegmentduration \
                 ({}) is not a multiple of noisebinsize ({})",
                span, self.bin_size
            )));
        }
        Ok(())
    }

    fn clamp(
        &self,
        value: Microseconds,
        max: Microseconds,
        err: impl FnOnce() -> SpectrumError,
    ) -> Result<Microseconds> {
        if value <= max {
            Ok(value)
        } else if self.max_clamp {
            Ok(max)
        } else {
            Err(err())
        }
    }
}

/// One reception to accumulate, for a single transmit antenna.
#[derive(Debug, Clone, Copy)]
pub struct Reception<'a> {
    pub tx_time: TimePoint,
    pub propagation_delay: Microseconds,
    pub segments: &'a [FrequencySegment],
    /// Transmit bandwidth used when a segment carries none
    pub bandwidth_hz: u64,
    pub powers_mw: &'a [f64],
    pub transmitters: &'a [NemId],
    pub antenna_index: AntennaIndex,
    pub spectral_mask_index: SpectralMaskIndex,
}

/// What an update did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumUpdate {
    /// Transmission time after sync correction
    pub tx_time: TimePoint,
    pub time_synced: bool,
    /// Propagation delay after clamping
    pub propagation_delay: Microseconds,
    /// Segments added to a recorder
    pub updated: usize,
    /// Nonzero segments with no passband overlap
    pub out_of_band: usize,
    /// Recorders created by this update
    pub new_frequencies: usize,
    /// Earliest start and latest end of reception written
    pub span: Option<(TimePoint, TimePoint)>,
}

#[derive(Debug)]
pub struct SpectrumMonitor {
    sub_id: SubId,
    limits: MonitorLimits,
    bandwidth_hz: u64,
    masks: Arc<SpectralMaskTable>,
    recorders: BTreeMap<u64, NoiseRecorder>,
}

impl SpectrumMonitor {
    /// Fails when the limits cannot form a whole-bin ring.
    pub fn new(
        sub_id: SubId,
        limits: MonitorLimits,
        bandwidth_hz: u64,
        masks: Arc<SpectralMaskTable>,
    ) -> std::result::Result<Self, ConfigError> {
        limits.validate()?;
        Ok(Self {
            sub_id,
            limits,
            bandwidth_hz,
            masks,
            recorders: BTreeMap::new(),
        })
    }

    pub fn sub_id(&self) -> SubId {
        self.sub_id
    }

    pub fn limits(&self) -> &MonitorLimits {
        &self.limits
    }

    pub fn bandwidth_hz(&self) -> u64 {
        self.bandwidth_hz
    }

    /// Receiver passband used for mask overlap.
    pub fn set_bandwidth(&mut self, bandwidth_hz: u64) {
        self.bandwidth_hz = bandwidth_hz;
    }

    /// Frequencies observed so far, ascending.
    pub fn frequencies(&self) -> impl Iterator<Item = u64> + '_ {
        self.recorders.keys().copied()
    }

    pub fn frequency_count(&self) -> usize {
        self.recorders.len()
    }

    pub fn update(&mut self, now: TimePoint, reception: &Reception<'_>) -> Result<SpectrumUpdate> {
        if reception.segments.len() != reception.powers_mw.len() {
            return Err(SpectrumError::SizeMismatch {
                segments: reception.segments.len(),
                powers: reception.powers_mw.len(),
            });
        }

        let limits = self.limits;

        let time_synced = now.abs_diff(reception.tx_time) > limits.time_sync_threshold;
        let tx_time = if time_synced { now } else { reception.tx_time };

        let delay = limits.clamp(reception.propagation_delay, limits.max_propagation, || {
            SpectrumError::PropagationClamp {
                delay: reception.propagation_delay,
                max: limits.max_propagation,
            }
        })?;

        let mut timing = Vec::with_capacity(reception.segments.len());
        for segment in reception.segments {
            let offset = limits.clamp(segment.offset, limits.max_offset, || {
                SpectrumError::OffsetClamp {
                    offset: segment.offset,
                    max: limits.max_offset,
                }
            })?;
            let duration = limits.clamp(segment.duration, limits.max_duration, || {
                SpectrumError::DurationClamp {
                    duration: segment.duration,
                    max: limits.max_duration,
                }
            })?;
            timing.push((offset, duration));
        }

        let mut result = SpectrumUpdate {
            tx_time,
            time_synced,
            propagation_delay: delay,
            ..Default::default()
        };

        for ((segment, &power_mw), &(offset, duration)) in reception
            .segments
            .iter()
            .zip(reception.powers_mw)
            .zip(&timing)
        {
            if power_mw == 0.0 {
                continue;
            }

            let tx_bandwidth = if segment.bandwidth_hz > 0 {
                segment.bandwidth_hz
            } else {
                reception.bandwidth_hz
            };

            let overlap = self.masks.overlap(
                segment.frequency_hz,
                segment.frequency_hz,
                tx_bandwidth,
                self.bandwidth_hz,
                reception.spectral_mask_index,
            );

            if overlap.is_empty() {
                result.out_of_band += 1;
                continue;
            }

            let energy_mw = overlap.energy_mw(power_mw);

            let recorder = match self.recorders.entry(segment.frequency_hz) {
                std::collections::btree_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::btree_map::Entry::Vacant(e) => {
                    result.new_frequencies += 1;
                    e.insert(NoiseRecorder::new(
                        limits.bin_size,
                        limits.max_offset,
                        limits.max_propagation,
                        limits.max_duration,
                        segment.frequency_hz,
                        tx_bandwidth,
                    ))
                }
            };

            let start = tx_time + offset + delay;
            let end = start + duration;

            if recorder.update(start, end, energy_mw).is_some() {
                result.updated += 1;
                result.span = Some(match result.span {
                    Some((sor, eor)) => (sor.min(start), eor.max(end)),
                    None => (start, end),
                });
            }

            trace!(
                sub_id = self.sub_id,
                frequency_hz = segment.frequency_hz,
                antenna = reception.antenna_index,
                transmitters = ?reception.transmitters,
                energy_mw,
                lower_hz = overlap.lower_hz,
                upper_hz = overlap.upper_hz,
                start = %start,
                end = %end,
                "noise update"
            );
        }

        Ok(result)
    }

    /// Bin history of one frequency over `[timepoint, timepoint + duration)`.
    pub fn request(
        &self,
        now: TimePoint,
        frequency_hz: u64,
        duration: Microseconds,
        timepoint: Option<TimePoint>,
    ) -> Result<SpectrumWindow> {
        let limits = self.limits;
        let duration = limits.clamp(duration, limits.max_duration, || {
            SpectrumError::DurationClamp {
                duration,
                max: limits.max_duration,
            }
        })?;

        let recorder = self
            .recorders
            .get(&frequency_hz)
            .ok_or(SpectrumError::UnknownFrequency(frequency_hz))?;

        let (bins, start) = recorder.get(now, duration, timepoint);
        Ok(SpectrumWindow {
            bins,
            start,
            bin_size: limits.bin_size,
        })
    }

    /// Raw populated bins of one frequency.
    pub fn dump(&self, frequency_hz: u64) -> Vec<(u64, f64)> {
        self.recorders
            .get(&frequency_hz)
            .map(NoiseRecorder::dump)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MaskBand, SpectralMask};
    use crate::window::max_noise_bin;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const FREQ: u64 = 2_400_000_000;

    fn limits(max_clamp: bool) -> MonitorLimits {
        MonitorLimits {
            bin_size: Microseconds(20),
            max_offset: Microseconds(300_000),
            max_propagation: Microseconds(200_000),
            max_duration: Microseconds(1_000_000),
            time_sync_threshold: Microseconds(10_000),
            max_clamp,
        }
    }

    fn monitor(max_clamp: bool) -> SpectrumMonitor {
        SpectrumMonitor::new(1, limits(max_clamp), 1_000_000, Arc::new(SpectralMaskTable::new()))
            .unwrap()
    }

    fn reception<'a>(
        tx_time: TimePoint,
        delay: Microseconds,
        segments: &'a [FrequencySegment],
        powers: &'a [f64],
    ) -> Reception<'a> {
        Reception {
            tx_time,
            propagation_delay: delay,
            segments,
            bandwidth_hz: 1_000_000,
            powers_mw: powers,
            transmitters: &[7],
            antenna_index: 0,
            spectral_mask_index: 0,
        }
    }

    #[test]
    fn test_startup_divisibility() {
        let mut bad = limits(false);
        bad.max_offset = Microseconds(300_010);
        let err = SpectrumMonitor::new(1, bad, 1_000_000, Arc::new(SpectralMaskTable::new()));
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));

        bad.bin_size = Microseconds::ZERO;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_zero_power_not_recorded() {
        let mut m = monitor(false);
        let now = TimePoint::from_secs(100);
        let segments = [
            FrequencySegment::new(FREQ, Microseconds(0), Microseconds(1000)),
            FrequencySegment::new(FREQ + 5_000_000, Microseconds(0), Microseconds(1000)),
        ];
        let update = m
            .update(now, &reception(now, Microseconds(0), &segments, &[0.0, 1e-9]))
            .unwrap();
        assert_eq!(update.updated, 1);
        assert!(m.dump(FREQ).is_empty());
        assert!(matches!(
            m.request(now, FREQ, Microseconds(1000), Some(now)),
            Err(SpectrumError::UnknownFrequency(FREQ))
        ));
        assert_eq!(m.frequencies().collect::<Vec<_>>(), vec![FREQ + 5_000_000]);
    }

    #[test]
    fn test_size_mismatch_writes_nothing() {
        let mut m = monitor(true);
        let now = TimePoint::from_secs(100);
        let segments = [FrequencySegment::new(FREQ, Microseconds(0), Microseconds(1000))];
        let err = m.update(now, &reception(now, Microseconds(0), &segments, &[1.0, 1.0]));
        assert_eq!(
            err,
            Err(SpectrumError::SizeMismatch {
                segments: 1,
                powers: 2
            })
        );
        assert_eq!(m.frequency_count(), 0);
    }

    #[test]
    fn test_clamp_enabled() {
        let mut m = monitor(true);
        let now = TimePoint::from_secs(100);
        let segments = [FrequencySegment::new(FREQ, Microseconds(400_000), Microseconds(2_000_000))];
        let update = m
            .update(now, &reception(now, Microseconds(250_000), &segments, &[1.0]))
            .unwrap();
        assert_eq!(update.propagation_delay, Microseconds(200_000));
        let start = now + Microseconds(300_000) + Microseconds(200_000);
        assert_eq!(update.span, Some((start, start + Microseconds(1_000_000))));
    }

    #[test]
    fn test_clamp_disabled() {
        let mut m = monitor(false);
        let now = TimePoint::from_secs(100);

        let segments = [FrequencySegment::new(FREQ, Microseconds(0), Microseconds(1000))];
        assert!(matches!(
            m.update(now, &reception(now, Microseconds(250_000), &segments, &[1.0])),
            Err(SpectrumError::PropagationClamp { .. })
        ));

        // the first segment is fine, the second is not: nothing is written
        let segments = [
            FrequencySegment::new(FREQ, Microseconds(0), Microseconds(1000)),
            FrequencySegment::new(FREQ, Microseconds(400_000), Microseconds(1000)),
        ];
        assert!(matches!(
            m.update(now, &reception(now, Microseconds(0), &segments, &[1.0, 1.0])),
            Err(SpectrumError::OffsetClamp { .. })
        ));
        assert_eq!(m.frequency_count(), 0);

        let segments = [FrequencySegment::new(FREQ, Microseconds(0), Microseconds(1_000_001))];
        assert!(matches!(
            m.update(now, &reception(now, Microseconds(0), &segments, &[1.0])),
            Err(SpectrumError::DurationClamp { .. })
        ));
        assert!(matches!(
            m.request(now, FREQ, Microseconds(1_000_001), None),
            Err(SpectrumError::DurationClamp { .. })
        ));
    }

    #[test]
    fn test_time_sync_rewrites_tx_time() {
        let mut m = monitor(false);
        let now = TimePoint::from_secs(100);
        let segments = [FrequencySegment::new(FREQ, Microseconds(0), Microseconds(20))];

        let skewed = now - Microseconds(10_001);
        let update = m
            .update(now, &reception(skewed, Microseconds(0), &segments, &[1.0]))
            .unwrap();
        assert!(update.time_synced);
        assert_eq!(update.tx_time, now);

        let close = now - Microseconds(10_000);
        let update = m
            .update(now, &reception(close, Microseconds(0), &segments, &[1.0]))
            .unwrap();
        assert!(!update.time_synced);
        assert_eq!(update.tx_time, close);
    }

    #[test]
    fn test_single_update_max_bin() {
        let mut m = monitor(false);
        let now = TimePoint::from_secs(100);
        let segments = [FrequencySegment::new(FREQ, Microseconds(0), Microseconds(20))];
        m.update(now, &reception(now, Microseconds(0), &segments, &[4.5]))
            .unwrap();

        let window = m.request(now, FREQ, Microseconds(20), Some(now)).unwrap();
        let max = max_noise_bin(&window, now, Some(now + Microseconds(19))).unwrap();
        assert_eq!(max, 4.5);
    }

    #[test]
    fn test_request_unknown_frequency_and_clamp() {
        let now = TimePoint::from_secs(100);
        let segments = [FrequencySegment::new(FREQ, Microseconds(0), Microseconds(20))];

        let mut strict = monitor(false);
        strict
            .update(now, &reception(now, Microseconds(0), &segments, &[1.0]))
            .unwrap();
        assert_eq!(
            strict.request(now, FREQ + 1, Microseconds(20), Some(now)),
            Err(SpectrumError::UnknownFrequency(FREQ + 1))
        );
        assert!(matches!(
            strict.request(now, FREQ, Microseconds(1_000_020), Some(now)),
            Err(SpectrumError::DurationClamp { .. })
        ));

        let mut lenient = monitor(true);
        lenient
            .update(now, &reception(now, Microseconds(0), &segments, &[1.0]))
            .unwrap();
        let window = lenient
            .request(now, FREQ, Microseconds(1_000_020), Some(now))
            .unwrap();
        assert_eq!(window.bins.len(), 50_000);
    }

    #[test]
    fn test_disjoint_updates_commute() {
        let now = TimePoint::from_secs(100);
        let a = [FrequencySegment::new(FREQ, Microseconds(0), Microseconds(200))];
        let b = [FrequencySegment::new(FREQ, Microseconds(400), Microseconds(300))];

        let mut first = monitor(false);
        first.update(now, &reception(now, Microseconds(0), &a, &[1.0])).unwrap();
        first.update(now, &reception(now, Microseconds(0), &b, &[2.0])).unwrap();

        let mut second = monitor(false);
        second.update(now, &reception(now, Microseconds(0), &b, &[2.0])).unwrap();
        second.update(now, &reception(now, Microseconds(0), &a, &[1.0])).unwrap();

        assert_eq!(first.dump(FREQ), second.dump(FREQ));
        let w1 = first.request(now, FREQ, Microseconds(1000), Some(now)).unwrap();
        let w2 = second.request(now, FREQ, Microseconds(1000), Some(now)).unwrap();
        assert_eq!(w1, w2);
    }

    #[test]
    fn test_jittered_updates_sum_per_bin() {
        let now = TimePoint::from_secs(100);
        let mut rng = StdRng::seed_from_u64(7);
        let mut m = monitor(false);
        let mut expected = vec![0.0; 50];

        for _ in 0..200 {
            let offset = rng.gen_range(0..40u64) * 20;
            let duration = rng.gen_range(1..10u64) * 20;
            let power = rng.gen_range(1..5) as f64;
            let segments = [FrequencySegment::new(FREQ, Microseconds(offset), Microseconds(duration))];
            m.update(now, &reception(now, Microseconds(0), &segments, &[power]))
                .unwrap();
            for bin in (offset / 20)..((offset + duration) / 20) {
                expected[bin as usize] += power;
            }
        }

        let window = m.request(now, FREQ, Microseconds(1000), Some(now)).unwrap();
        assert_eq!(window.bins, expected);
    }

    #[test]
    fn test_out_of_band_mask() {
        let mut table = SpectralMaskTable::new();
        table.insert(
            2,
            SpectralMask {
                bands: vec![MaskBand {
                    lower_offset_hz: 3_000_000,
                    upper_offset_hz: 4_000_000,
                    level_db: 0.0,
                }],
            },
        );
        let mut m = SpectrumMonitor::new(1, limits(false), 1_000_000, Arc::new(table)).unwrap();
        let now = TimePoint::from_secs(100);
        let segments = [FrequencySegment::new(FREQ, Microseconds(0), Microseconds(100))];
        let mut r = reception(now, Microseconds(0), &segments, &[1.0]);
        r.spectral_mask_index = 2;
        let update = m.update(now, &r).unwrap();
        assert_eq!(update.out_of_band, 1);
        assert_eq!(update.updated, 0);
        assert_eq!(m.frequency_count(), 0);
    }
}
