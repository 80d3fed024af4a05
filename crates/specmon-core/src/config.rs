//! # Configuration
//!
//! YAML configuration for a spectrum monitor node. Keys follow the
//! monitor's option names; every section is optional and falls back to
//! its defaults.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `SPECMON_CONFIG` environment variable
//! 2. `./specmon.yaml` (current directory)
//! 3. `~/.config/specmon/config.yaml` (user config)
//! 4. `/etc/specmon/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! bandwidth: 1000000
//! noisebinsize: 20
//! noisemaxclampenable: true
//! propagationmodel: 2ray
//! spectrumquery:
//!   rate: 100000
//!   binsize: 10000
//!   publishendpoint: "0.0.0.0:8883"
//!   recorderfile: "/tmp/energy.rec"
//! logging:
//!   level: debug
//! ```

use crate::error::ConfigError;
use crate::observe::LogConfig;
use crate::provider::{
    AntennaProfile, AntennaProfileId, FadingMode, FadingParams, PropagationKind, SpectralMask,
    SpectralMaskTable,
};
use crate::spectrum_monitor::MonitorLimits;
use crate::time::Microseconds;
use crate::types::{NemId, SpectralMaskIndex};
use crate::units::receiver_sensitivity_dbm;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Periodic energy query and publish settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumQueryConfig {
    /// Query period
    pub rate: Microseconds,
    /// Summary bin inside one period
    pub binsize: Microseconds,
    /// TCP endpoint subscribers connect to
    pub publishendpoint: String,
    /// Append-only energy record file
    pub recorderfile: Option<PathBuf>,
}

impl Default for SpectrumQueryConfig {
    fn default() -> Self {
        Self {
            rate: Microseconds(100_000),
            binsize: Microseconds(10_000),
            publishendpoint: "0.0.0.0:8883".to_string(),
            recorderfile: None,
        }
    }
}

impl SpectrumQueryConfig {
    /// Summary bins per query period.
    pub fn bins_per_query(&self) -> u64 {
        self.rate / self.binsize
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FadingConfig {
    pub model: FadingMode,
    /// Parameters for the configured model
    pub params: FadingParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Local NEM id
    pub nemid: NemId,
    /// Receiver bandwidth in Hz, used for receiver sensitivity
    pub bandwidth: u64,
    pub noisebinsize: Microseconds,
    pub noisemaxsegmentoffset: Microseconds,
    pub noisemaxmessagepropagation: Microseconds,
    pub noisemaxsegmentduration: Microseconds,
    pub noisemaxclampenable: bool,
    pub timesyncthreshold: Microseconds,
    /// dB
    pub systemnoisefigure: f64,
    pub propagationmodel: PropagationKind,
    /// dBi
    pub fixedantennagain: f64,
    pub fixedantennagainenable: bool,
    /// Receive antenna profile when fixed gain is disabled
    pub antennaprofileid: AntennaProfileId,
    pub antennaprofiles: BTreeMap<AntennaProfileId, AntennaProfile>,
    pub spectralmasks: BTreeMap<SpectralMaskIndex, SpectralMask>,
    pub fading: FadingConfig,
    /// Accept only these frequencies, empty accepts all
    pub frequenciesofinterest: BTreeSet<u64>,
    pub receivepowertableenable: bool,
    /// Warn once the tracked frequency count passes this
    pub maxtrackedfrequencies: usize,
    pub spectrumquery: SpectrumQueryConfig,
    pub logging: LogConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            nemid: 1,
            bandwidth: 1_000_000,
            noisebinsize: Microseconds(20),
            noisemaxsegmentoffset: Microseconds(300_000),
            noisemaxmessagepropagation: Microseconds(200_000),
            noisemaxsegmentduration: Microseconds(1_000_000),
            noisemaxclampenable: false,
            timesyncthreshold: Microseconds(10_000),
            systemnoisefigure: 4.0,
            propagationmodel: PropagationKind::Precomputed,
            fixedantennagain: 0.0,
            fixedantennagainenable: true,
            antennaprofileid: 0,
            antennaprofiles: BTreeMap::new(),
            spectralmasks: BTreeMap::new(),
            fading: FadingConfig::default(),
            frequenciesofinterest: BTreeSet::new(),
            receivepowertableenable: false,
            maxtrackedfrequencies: 1024,
            spectrumquery: SpectrumQueryConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the default search path, or defaults when
    /// no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("SPECMON_CONFIG") {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            return Self::load_from(&path);
        }

        match Self::config_search_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./specmon.yaml")];
        if let Some(dirs) = directories::ProjectDirs::from("", "", "specmon") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }
        paths.push(PathBuf::from("/etc/specmon/config.yaml"));
        paths
    }

    pub fn limits(&self) -> MonitorLimits {
        MonitorLimits {
            bin_size: self.noisebinsize,
            max_offset: self.noisemaxsegmentoffset,
            max_propagation: self.noisemaxmessagepropagation,
            max_duration: self.noisemaxsegmentduration,
            time_sync_threshold: self.timesyncthreshold,
            max_clamp: self.noisemaxclampenable,
        }
    }

    /// Mask table shared by every accumulator of the node.
    pub fn spectral_mask_table(&self) -> SpectralMaskTable {
        let mut table = SpectralMaskTable::new();
        for (index, mask) in &self.spectralmasks {
            table.insert(*index, mask.clone());
        }
        table
    }

    /// Thermal noise floor of the receiver in dBm.
    pub fn receiver_sensitivity_dbm(&self) -> f64 {
        receiver_sensitivity_dbm(self.systemnoisefigure, self.bandwidth)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bandwidth == 0 {
            return Err(ConfigError::ValidationError(
                "bandwidth must be > 0".to_string(),
            ));
        }

        self.limits().validate()?;

        let query = &self.spectrumquery;
        if query.binsize.is_zero() {
            return Err(ConfigError::ValidationError(
                "spectrumquery.binsize must be > 0".to_string(),
            ));
        }
        if query.binsize > query.rate {
            return Err(ConfigError::ValidationError(format!(
                "spectrumquery.binsize ({}) must be <= spectrumquery.rate ({})",
                query.binsize, query.rate
            )));
        }
        if !(query.rate % query.binsize).is_zero() {
            return Err(ConfigError::ValidationError(format!(
                "spectrumquery.rate ({}) is not a multiple of spectrumquery.binsize ({})",
                query.rate, query.binsize
            )));
        }
        if !(query.rate % self.noisebinsize).is_zero()
            || !(query.binsize % self.noisebinsize).is_zero()
        {
            return Err(ConfigError::ValidationError(format!(
                "spectrumquery.rate and spectrumquery.binsize must be multiples of noisebinsize ({})",
                self.noisebinsize
            )));
        }
        if query.rate > self.noisemaxsegmentduration {
            return Err(ConfigError::ValidationError(format!(
                "spectrumquery.rate ({}) must be <= noisemaxsegmentduration ({})",
                query.rate, self.noisemaxsegmentduration
            )));
        }

        if !self.fixedantennagainenable && !self.antennaprofiles.contains_key(&self.antennaprofileid) {
            return Err(ConfigError::ValidationError(format!(
                "antennaprofileid {} has no entry in antennaprofiles",
                self.antennaprofileid
            )));
        }

        if self.spectralmasks.contains_key(&0) {
            return Err(ConfigError::ValidationError(
                "spectral mask index 0 is reserved".to_string(),
            ));
        }

        if self.maxtrackedfrequencies == 0 {
            return Err(ConfigError::ValidationError(
                "maxtrackedfrequencies must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Example configuration with every section present.
    pub fn example_yaml() -> String {
        let mut config = Self {
            noisemaxclampenable: true,
            ..Default::default()
        };
        config.spectrumquery.recorderfile = Some(PathBuf::from("/var/lib/specmon/energy.rec"));
        serde_yaml::to_string(&config).unwrap_or_default()
    }
}
