//! Engine configuration
//!
//! YAML schema (every section optional, defaults shown):
//!
//! ```yaml
//! version: 1
//! bounds:
//!   min_amount: 100000.0
//!   max_amount: 1000000000.0
//!   min_term_days: 30
//!   max_term_days: 1825
//!   min_interest_rate: 0.1
//!   max_interest_rate: 25.0
//!   allow_past_start_date: false
//! cache:
//!   entity_ttl_secs: 300
//!   list_ttl_secs: 300
//!   pending_ttl_secs: 300
//!   stats_ttl_secs: 600
//!   sweep_interval_secs: 60
//! ```

pub mod error;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use validation::Validatable;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Schema versions this build understands
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub version: u32,
    #[serde(default)]
    pub bounds: CdtBounds,
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: 1,
            bounds: CdtBounds::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl Validatable for EngineConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version) {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }
        self.bounds.validate()?;
        self.cache.validate()
    }

    fn config_name(&self) -> &'static str {
        "EngineConfig"
    }
}

/// Business limits applied to new and edited CDTs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CdtBounds {
    pub min_amount: f64,
    pub max_amount: f64,
    pub min_term_days: u32,
    pub max_term_days: u32,
    /// Percent
    pub min_interest_rate: f64,
    pub max_interest_rate: f64,
    /// Accept a `start_date` earlier than today
    pub allow_past_start_date: bool,
}

impl Default for CdtBounds {
    fn default() -> Self {
        Self {
            min_amount: 100_000.0,
            max_amount: 1_000_000_000.0,
            min_term_days: 30,
            max_term_days: 1825,
            min_interest_rate: 0.1,
            max_interest_rate: 25.0,
            allow_past_start_date: false,
        }
    }
}

impl Validatable for CdtBounds {
    fn validate(&self) -> ConfigResult<()> {
        if !(self.min_amount > 0.0 && self.min_amount <= self.max_amount) {
            return Err(ConfigError::range_with_hint(
                "bounds.min_amount",
                self.min_amount,
                "0 (exclusive)",
                self.max_amount,
                "Amounts must be positive and min_amount <= max_amount",
            ));
        }
        if self.min_term_days == 0 || self.min_term_days > self.max_term_days {
            return Err(ConfigError::range_with_hint(
                "bounds.min_term_days",
                self.min_term_days,
                1,
                self.max_term_days,
                "Terms are at least one day and min_term_days <= max_term_days",
            ));
        }
        if !(self.min_interest_rate > 0.0 && self.min_interest_rate <= self.max_interest_rate) {
            return Err(ConfigError::range_with_hint(
                "bounds.min_interest_rate",
                self.min_interest_rate,
                "0 (exclusive)",
                self.max_interest_rate,
                "Rates are positive percentages and min <= max",
            ));
        }
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "CdtBounds"
    }
}

/// Cache lifetimes, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// `cdt:<id>`
    pub entity_ttl_secs: u64,
    /// `cdts:user:*` and `cdts:all:*`
    pub list_ttl_secs: u64,
    /// `pending_cdts`
    pub pending_ttl_secs: u64,
    /// `admin_stats`
    pub stats_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            entity_ttl_secs: 300,
            list_ttl_secs: 300,
            pending_ttl_secs: 300,
            stats_ttl_secs: 600,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheSettings {
    pub fn entity_ttl(&self) -> Duration {
        Duration::from_secs(self.entity_ttl_secs)
    }

    pub fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.list_ttl_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Validatable for CacheSettings {
    fn validate(&self) -> ConfigResult<()> {
        const DAY: u64 = 86_400;

        if self.sweep_interval_secs == 0 || self.sweep_interval_secs > DAY {
            return Err(ConfigError::range_with_hint(
                "cache.sweep_interval_secs",
                self.sweep_interval_secs,
                1,
                DAY,
                "The sweeper needs a positive interval",
            ));
        }
        for (field, ttl) in [
            ("cache.entity_ttl_secs", self.entity_ttl_secs),
            ("cache.list_ttl_secs", self.list_ttl_secs),
            ("cache.pending_ttl_secs", self.pending_ttl_secs),
            ("cache.stats_ttl_secs", self.stats_ttl_secs),
        ] {
            if ttl > DAY {
                return Err(ConfigError::range_with_hint(
                    field,
                    ttl,
                    0,
                    DAY,
                    "0 disables expiry; longer TTLs only hide stale reads",
                ));
            }
        }
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "CacheSettings"
    }
}
