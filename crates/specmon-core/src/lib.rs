//! # Spectrum Monitor Engine
//!
//! Estimates the received power of every inbound transmission and keeps a
//! per-frequency, time-binned history of aggregate noise energy that can be
//! queried for the maximum energy over any sub-interval.
//!
//! ## Signal Flow
//!
//! ```text
//! PhyHeader ──► ReceiveProcessor ──► SpectrumMonitor::update ──► NoiseRecorder bins
//!                  │ location, pathloss,                               │
//!                  │ gain, fading                                      ▼
//!                  ▼                         SpectrumMonitor::request ──► max_noise_bin
//!              DropCause (first failing stage)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use specmon_core::prelude::*;
//!
//! let config = MonitorConfig::default();
//! let mut models = SignalModels::from_config(1, &config);
//! models.propagation.set_pathloss(2, 60.0);
//!
//! let masks = Arc::new(config.spectral_mask_table());
//! let mut monitor = SpectrumMonitor::new(0, config.limits(), 1_000_000, masks).unwrap();
//! let mut processor = ReceiveProcessor::new(0, 0, false);
//!
//! let now = TimePoint::from_secs(1_000);
//! let header = PhyHeader::simple(
//!     0,
//!     now,
//!     Transmitter::new(2, 20.0),
//!     1_000_000,
//!     vec![FrequencySegment::new(2_400_000_000, Microseconds(0), Microseconds(100_000))],
//! );
//! assert!(processor.process(now, &header, &mut models, &mut monitor).is_success());
//!
//! let window = monitor.request(now, 2_400_000_000, Microseconds(100_000), Some(now)).unwrap();
//! let max_mw = max_noise_bin(&window, now, None).unwrap();
//! assert!((mw_to_dbm(max_mw) + 40.0).abs() < 1e-9);
//! ```

pub mod config;
pub mod drop_cause;
pub mod error;
pub mod geo;
pub mod noise_recorder;
pub mod observe;
pub mod provider;
pub mod receive_processor;
pub mod spectrum_monitor;
pub mod time;
pub mod types;
pub mod units;
pub mod window;

pub use config::{FadingConfig, MonitorConfig, SpectrumQueryConfig};
pub use drop_cause::DropCause;
pub use error::{ConfigError, SpectrumError};
pub use noise_recorder::NoiseRecorder;
pub use provider::SignalModels;
pub use receive_processor::{
    DropReport, ProcessResult, ReceivePowerEntry, ReceivePowerKey, ReceivePowerMap,
    ReceiveProcessor, ReceiveReport,
};
pub use spectrum_monitor::{MonitorLimits, Reception, SpectrumMonitor, SpectrumUpdate};
pub use time::{Microseconds, TimePoint};
pub use types::{
    AntennaIndex, FrequencySegment, NemId, PhyHeader, SpectralMaskIndex, SubId, TransmitAntenna,
    Transmitter,
};
pub use window::{max_noise_bin, max_noise_floor_dbm, SpectrumWindow};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::config::MonitorConfig;
    pub use crate::drop_cause::DropCause;
    pub use crate::provider::SignalModels;
    pub use crate::receive_processor::{ProcessResult, ReceiveProcessor};
    pub use crate::spectrum_monitor::SpectrumMonitor;
    pub use crate::time::{Microseconds, TimePoint};
    pub use crate::types::{FrequencySegment, PhyHeader, TransmitAntenna, Transmitter};
    pub use crate::units::{dbm_to_mw, mw_to_dbm};
    pub use crate::window::{max_noise_bin, SpectrumWindow};
}
