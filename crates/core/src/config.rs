//! Runtime configuration and reference-data seeding
//!
//! Both are TOML documents. Every configuration field has a default, so an
//! empty file (or no file at all) yields a working setup.

use std::path::Path;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::models::{Compatibility, Requester, Resource};
use crate::storage::CatalogRepository;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schedule: ScheduleConfig,
    pub history: HistoryConfig,
    pub composer: ComposerConfig,
}

/// Daily operating window and suggestion scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    #[serde(with = "hhmm")]
    pub open: NaiveTime,
    #[serde(with = "hhmm")]
    pub close: NaiveTime,
    pub step_minutes: u32,
    pub max_suggestions: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            step_minutes: 30,
            max_suggestions: 3,
        }
    }
}

/// Dedupe cache tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub dedupe_bucket_secs: u64,
    pub dedupe_horizon_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dedupe_bucket_secs: 2,
            dedupe_horizon_secs: 10,
        }
    }
}

impl HistoryConfig {
    /// Bucket width; saturates for values `validate` would reject
    pub fn bucket(&self) -> Duration {
        seconds(self.dedupe_bucket_secs).unwrap_or(Duration::MAX)
    }

    pub fn horizon(&self) -> Duration {
        seconds(self.dedupe_horizon_secs).unwrap_or(Duration::MAX)
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Outer windows longer than this get a break hint
    pub break_hint_threshold_minutes: i64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            break_hint_threshold_minutes: 240,
        }
    }
}

impl Config {
    /// Read and validate a config file
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(
            open = %config.schedule.open,
            close = %config.schedule.close,
            step_minutes = config.schedule.step_minutes,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Read a config file if present, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.schedule;
        if s.open >= s.close {
            return Err(Error::Config(format!(
                "schedule.open {} must be before schedule.close {}",
                s.open.format("%H:%M"),
                s.close.format("%H:%M")
            )));
        }
        if s.step_minutes == 0 {
            return Err(Error::Config("schedule.step_minutes must be positive".into()));
        }
        if s.max_suggestions == 0 {
            return Err(Error::Config("schedule.max_suggestions must be positive".into()));
        }
        let h = &self.history;
        for (field, value) in [
            ("dedupe_bucket_secs", h.dedupe_bucket_secs),
            ("dedupe_horizon_secs", h.dedupe_horizon_secs),
        ] {
            if seconds(value).is_none() {
                return Err(Error::Config(format!("history.{field} {value} is out of range")));
            }
        }
        if h.dedupe_bucket_secs == 0 {
            return Err(Error::Config("history.dedupe_bucket_secs must be positive".into()));
        }
        if h.dedupe_horizon_secs < h.dedupe_bucket_secs {
            return Err(Error::Config(
                "history.dedupe_horizon_secs must be at least the bucket width".into(),
            ));
        }
        if self.composer.break_hint_threshold_minutes <= 0 {
            return Err(Error::Config(
                "composer.break_hint_threshold_minutes must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Reference data loaded into the store at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub compatibility: Vec<Compatibility>,
    #[serde(default)]
    pub requesters: Vec<Requester>,
}

impl CatalogSeed {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let seed: CatalogSeed =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        for compat in &seed.compatibility {
            if !seed.resources.iter().any(|r| r.id == compat.resource_id) {
                return Err(Error::Config(format!(
                    "compatibility for '{}' names unknown resource {}",
                    compat.shoot_type, compat.resource_id
                )));
            }
        }
        Ok(seed)
    }

    /// Upsert everything; safe to run on every start
    #[instrument(skip(self, repo))]
    pub fn apply<R: CatalogRepository + ?Sized>(&self, repo: &R) -> Result<()> {
        for resource in &self.resources {
            repo.upsert_resource(resource)?;
        }
        for compat in &self.compatibility {
            repo.upsert_compatibility(compat)?;
        }
        for requester in &self.requesters {
            repo.upsert_requester(requester)?;
        }
        info!(
            resources = self.resources.len(),
            compatibility = self.compatibility.len(),
            requesters = self.requesters.len(),
            "Catalog seeded"
        );
        Ok(())
    }
}

/// `HH:MM` times in TOML
mod hhmm {
    use super::*;

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        crate::models::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}
