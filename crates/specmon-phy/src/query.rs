//! Periodic spectrum query
//!
//! ```text
//!        first tick                 tick with index > last
//!  IDLE ────────────► ARMED(last) ─────────────────────────► ARMED(index)
//!                        │  ▲            build report
//!                        └──┘
//!                  tick within same index
//! ```
//!
//! Every tick re-arms for the start of the next query period, whether or
//! not a report was built. A report always covers exactly one period,
//! starting at the last armed index, however late the tick fires. The
//! window requested for it spans every elapsed period, capped at the
//! accumulator's max segment duration.
//!
//! Reported energies are the raw max-bin power in dBm; an empty bin is
//! negative infinity. Receiver sensitivity travels in its own field.

use specmon_core::units::mw_to_dbm;
use specmon_core::{max_noise_bin, Microseconds, SpectrumQueryConfig, TimePoint};

use crate::proto::{Energy, Entry, SpectrumEnergy};
use crate::spectrum_map::SpectrumMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Armed { last_index: u64 },
}

/// Outcome of one timer fire.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTick {
    pub report: Option<SpectrumEnergy>,
    /// When the next tick is due
    pub next_fire: TimePoint,
    /// Frequencies skipped because their window could not be summarized
    pub errors: usize,
}

#[derive(Debug)]
pub struct SpectrumQuery {
    rate: Microseconds,
    bin_size: Microseconds,
    rx_sensitivity_dbm: f64,
    sequence: u64,
    state: QueryState,
}

impl SpectrumQuery {
    /// `config` must already be validated: non-zero bin size dividing the rate.
    pub fn new(config: &SpectrumQueryConfig, rx_sensitivity_dbm: f64) -> Self {
        Self {
            rate: config.rate,
            bin_size: config.binsize,
            rx_sensitivity_dbm,
            sequence: 0,
            state: QueryState::Idle,
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Reports built so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn rate(&self) -> Microseconds {
        self.rate
    }

    fn index(&self, now: TimePoint) -> u64 {
        now.since_epoch() / self.rate
    }

    /// Start of the query period after the one containing `now`.
    pub fn next_fire(&self, now: TimePoint) -> TimePoint {
        TimePoint::EPOCH + self.rate * (self.index(now) + 1)
    }

    pub fn tick(&mut self, now: TimePoint, map: &SpectrumMap) -> QueryTick {
        let index = self.index(now);
        let next_fire = self.next_fire(now);

        let last_index = match self.state {
            QueryState::Idle => {
                self.state = QueryState::Armed { last_index: index };
                tracing::debug!(index, %next_fire, "spectrum query armed");
                return QueryTick {
                    report: None,
                    next_fire,
                    errors: 0,
                };
            }
            QueryState::Armed { last_index } => last_index,
        };

        if index <= last_index {
            return QueryTick {
                report: None,
                next_fire,
                errors: 0,
            };
        }

        let start = TimePoint::EPOCH + self.rate * last_index;
        let span = self.rate * (index - last_index);
        let (report, errors) = self.build(now, start, span, map);
        self.state = QueryState::Armed { last_index: index };

        QueryTick {
            report: Some(report),
            next_fire,
            errors,
        }
    }

    fn build(
        &mut self,
        now: TimePoint,
        start: TimePoint,
        span: Microseconds,
        map: &SpectrumMap,
    ) -> (SpectrumEnergy, usize) {
        let bins = self.rate / self.bin_size;
        let mut errors = 0;
        let mut entries = Vec::with_capacity(map.len());

        for (sub_id, entry) in map.iter() {
            let mut energies = Vec::new();
            // never below one period once the config is validated
            let span = span.min(entry.monitor.limits().max_duration);

            for frequency_hz in entry.monitor.frequencies() {
                let summary = entry
                    .monitor
                    .request(now, frequency_hz, span, Some(start))
                    .and_then(|window| {
                        (0..bins)
                            .map(|i| {
                                let bin_start = start + self.bin_size * i;
                                let bin_end = bin_start + self.bin_size - Microseconds(1);
                                max_noise_bin(&window, bin_start, Some(bin_end))
                                    .map(mw_to_dbm)
                            })
                            .collect::<Result<Vec<f64>, _>>()
                    });

                match summary {
                    Ok(energy_dbm) => energies.push(Energy {
                        frequency_hz,
                        energy_dbm,
                    }),
                    Err(e) => {
                        errors += 1;
                        tracing::warn!(sub_id, frequency_hz, error = %e, "spectrum query skipped");
                    }
                }
            }

            entries.push(Entry {
                subid: u32::from(sub_id),
                bandwidth_hz: entry.bandwidth_hz(),
                energies,
            });
        }

        let report = SpectrumEnergy {
            start_time: start.as_micros(),
            duration: self.bin_size.count(),
            receiver_sensitivity_dbm: self.rx_sensitivity_dbm,
            sequence: self.sequence,
            entries,
        };
        self.sequence += 1;
        (report, errors)
    }
}
