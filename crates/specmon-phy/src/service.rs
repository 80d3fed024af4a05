//! Monitor Service
//!
//! Single-threaded event loop for one node. Inbound messages and provider
//! events arrive on an `mpsc` queue; the loop waits on the queue only
//! until the next scheduled query, so message handling and query ticks
//! never overlap and the query schedule does not drift.
//!
//! ## Example
//!
//! ```rust,no_run
//! use specmon_core::MonitorConfig;
//! use specmon_phy::{MonitorPhy, MonitorService, ServiceMessage, TcpPublisher};
//! use std::sync::mpsc;
//!
//! let config = MonitorConfig::load().unwrap();
//! let publisher = TcpPublisher::bind(&config.spectrumquery.publishendpoint).unwrap();
//! let mut service = MonitorService::new(MonitorPhy::new(config).unwrap(), Box::new(publisher)).unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! let handle = std::thread::spawn(move || service.run(rx));
//! tx.send(ServiceMessage::Shutdown).unwrap();
//! handle.join().unwrap();
//! ```

use prost::Message;
use specmon_core::{ConfigError, PhyHeader, TimePoint};
use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use thiserror::Error;

use crate::monitor_phy::{MonitorPhy, PhyEvent};
use crate::proto::{SpectrumEnergy, SPECTRUM_ENERGY_TOPIC};
use crate::publish::EnergyPublisher;
use crate::query::SpectrumQuery;
use crate::recorder::EnergyRecorder;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot open record file: {0}")]
    Recorder(#[source] io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceMessage {
    Upstream(PhyHeader),
    Event(PhyEvent),
    Shutdown,
}

pub struct MonitorService {
    phy: MonitorPhy,
    query: SpectrumQuery,
    publisher: Box<dyn EnergyPublisher>,
    recorder: Option<EnergyRecorder>,
    next_fire: Option<TimePoint>,
}

impl std::fmt::Debug for MonitorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorService")
            .field("phy", &self.phy)
            .field("query", &self.query)
            .field("recorder", &self.recorder)
            .field("next_fire", &self.next_fire)
            .finish_non_exhaustive()
    }
}

impl MonitorService {
    /// Opens the record file when `spectrumquery.recorderfile` is set.
    pub fn new(phy: MonitorPhy, publisher: Box<dyn EnergyPublisher>) -> Result<Self, ServiceError> {
        let query_config = &phy.config().spectrumquery;
        let query = SpectrumQuery::new(query_config, phy.receiver_sensitivity_dbm());
        let recorder = query_config
            .recorderfile
            .as_ref()
            .map(|path| EnergyRecorder::create(path))
            .transpose()
            .map_err(ServiceError::Recorder)?;

        Ok(Self {
            phy,
            query,
            publisher,
            recorder,
            next_fire: None,
        })
    }

    pub fn phy(&self) -> &MonitorPhy {
        &self.phy
    }

    pub fn phy_mut(&mut self) -> &mut MonitorPhy {
        &mut self.phy
    }

    pub fn query(&self) -> &SpectrumQuery {
        &self.query
    }

    pub fn next_fire(&self) -> Option<TimePoint> {
        self.next_fire
    }

    /// Handle one queued message. Returns `false` on shutdown.
    pub fn handle(&mut self, now: TimePoint, message: ServiceMessage) -> bool {
        match message {
            ServiceMessage::Upstream(header) => {
                self.phy.process_upstream(now, &header);
            }
            ServiceMessage::Event(event) => self.phy.handle_event(event),
            ServiceMessage::Shutdown => return false,
        }
        true
    }

    /// Run the query scheduler; publishes and records any report it builds.
    pub fn on_timer(&mut self, now: TimePoint) -> TimePoint {
        let tick = self.query.tick(now, self.phy.spectrum_map());
        let metrics = self.phy.metrics();
        metrics.query_errors.inc_by(tick.errors as u64);

        if let Some(report) = tick.report {
            self.emit(&report);
        }

        self.next_fire = Some(tick.next_fire);
        tick.next_fire
    }

    fn emit(&mut self, report: &SpectrumEnergy) {
        let metrics = self.phy.metrics();
        let payload = report.encode_to_vec();

        match self.publisher.publish(SPECTRUM_ENERGY_TOPIC, &payload) {
            Ok(subscribers) => {
                metrics.reports_published.inc();
                tracing::trace!(
                    sequence = report.sequence,
                    frequencies = report.frequency_count(),
                    subscribers,
                    "energy report published"
                );
            }
            Err(e) => {
                metrics.publish_errors.inc();
                tracing::error!(sequence = report.sequence, error = %e, "energy report publish failed");
            }
        }

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.record(&payload) {
                metrics.record_errors.inc();
                tracing::error!(
                    path = %recorder.path().display(),
                    error = %e,
                    "energy report record failed"
                );
            }
        }
    }

    /// Block on `rx` until shutdown or until every sender is gone.
    pub fn run(&mut self, rx: Receiver<ServiceMessage>) {
        tracing::info!(rate = %self.query.rate(), "monitor service started");

        loop {
            let now = TimePoint::now();
            let next_fire = match self.next_fire {
                Some(next_fire) if next_fire > now => next_fire,
                _ => self.on_timer(now),
            };

            match rx.recv_timeout((next_fire - TimePoint::now()).to_std()) {
                Ok(message) => {
                    if !self.handle(TimePoint::now(), message) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!(
            reports = self.query.sequence(),
            messages = self.phy.metrics().messages_in.get(),
            "monitor service stopped"
        );
    }
}
