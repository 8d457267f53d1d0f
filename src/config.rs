//! Runtime settings loaded from a JSON file
//!
//! Every field has a default, so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::catalog::{
    CatalogOptions, CATALOG_FIRST_YEAR, CATALOG_LAST_YEAR, DEFAULT_CATALOG_PATH, DEFAULT_COUNTRIES,
};
use crate::error::{Error, Result};
use crate::ledger::{GrowthBasis, DEFAULT_LEDGER_GROWTH_RATE};
use crate::projection::{BucketRates, ProjectionConfig, DEFAULT_ALLOCATION_PRECISION};
use crate::series::{DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_TTL};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "config/retirement.json";

/// Default long-format market series table for the static provider
pub const DEFAULT_SERIES_PATH: &str = "data/market_series.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub path: PathBuf,
    pub window_start: i32,
    pub window_end: i32,
    pub default_countries: Vec<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CATALOG_PATH),
            window_start: CATALOG_FIRST_YEAR,
            window_end: CATALOG_LAST_YEAR,
            default_countries: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesSettings {
    /// Long-format CSV for the primary static provider
    pub path: PathBuf,
    pub cache_ttl_secs: u64,
    pub attempt_timeout_ms: u64,
    /// Flat annual rate used by the terminating provider, if any
    pub fallback_rate: Option<f64>,
}

impl Default for SeriesSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SERIES_PATH),
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT.as_millis() as u64,
            fallback_rate: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionSettings {
    pub allocation_precision: u32,
    pub rates: BucketRates,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            allocation_precision: DEFAULT_ALLOCATION_PRECISION,
            rates: BucketRates::default_assumptions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub annual_growth_rate: f64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            annual_growth_rate: DEFAULT_LEDGER_GROWTH_RATE,
        }
    }
}

/// All runtime settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub series: SeriesSettings,
    pub projection: ProjectionSettings,
    pub ledger: LedgerSettings,
}

impl Settings {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Load `path` if it exists, otherwise defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_path(path)
        } else {
            info!("No settings file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.window_start > self.catalog.window_end {
            return Err(Error::Config(format!(
                "catalog window {}..={} is inverted",
                self.catalog.window_start, self.catalog.window_end
            )));
        }
        if self.series.attempt_timeout_ms == 0 {
            return Err(Error::Config("attempt_timeout_ms must be positive".to_string()));
        }
        if !self.ledger.annual_growth_rate.is_finite() {
            return Err(Error::Config("ledger annual_growth_rate must be finite".to_string()));
        }
        Ok(())
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            window_start: self.catalog.window_start,
            window_end: self.catalog.window_end,
            default_countries: self.catalog.default_countries.clone(),
        }
    }

    pub fn projection_config(&self) -> ProjectionConfig {
        ProjectionConfig {
            allocation_precision: self.projection.allocation_precision,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.series.cache_ttl_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.series.attempt_timeout_ms)
    }

    pub fn growth_basis(&self) -> GrowthBasis {
        GrowthBasis::FixedRate(self.ledger.annual_growth_rate)
    }
}
