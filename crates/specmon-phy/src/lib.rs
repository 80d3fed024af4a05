//! # Spectrum Monitor PHY
//!
//! Node-level glue around the `specmon-core` engine:
//!
//! - [`SpectrumMap`]: per sub-id accumulator and receive combiner
//! - [`MonitorPhy`]: frequency-of-interest filter, provider events, statistics
//! - [`SpectrumQuery`]: periodic max-energy summary of every tracked frequency
//! - [`TcpPublisher`] / [`ChannelPublisher`]: report distribution
//! - [`EnergyRecorder`]: length-prefixed record file
//! - [`MonitorService`]: single-threaded event loop tying it together
//!
//! ```text
//!  ServiceMessage ──► MonitorService ──► MonitorPhy ──► SpectrumMap
//!                          │ timer                          │
//!                          ▼                                ▼
//!                    SpectrumQuery ──► SpectrumEnergy ──► publish / record
//! ```

pub mod monitor_phy;
pub mod proto;
pub mod publish;
pub mod query;
pub mod recorder;
pub mod service;
pub mod spectrum_map;

pub use monitor_phy::{MonitorPhy, PhyEvent};
pub use proto::{SpectrumEnergy, SPECTRUM_ENERGY_TOPIC};
pub use publish::{ChannelPublisher, EnergyPublisher, PublishError, PublishedReport, TcpPublisher};
pub use query::{QueryState, QueryTick, SpectrumQuery};
pub use recorder::{EnergyRecordReader, EnergyRecorder};
pub use service::{MonitorService, ServiceError, ServiceMessage};
pub use spectrum_map::{SpectrumMap, SpectrumMapEntry};
