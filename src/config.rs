// Copyright 2026 influx-relay contributors
// SPDX-License-Identifier: Apache-2.0

//! Config loading. Parses one YAML document per job,
//! validates required keys, and exposes a dotted-path accessor over the
//! raw document for anything not promoted to a typed field.

use std::{collections::HashMap, fs, path::Path};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};

/// `true` if `path`'s file name ends in `.template.yaml`; such files are
/// skipped by the orchestrator.
pub fn is_template(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".template.yaml"))
        .unwrap_or(false)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Range,
    Incremental,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Incremental
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    pub fn as_tracing_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "error",
        }
    }
}

/// One entry of `source.databases`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub name: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

fn default_group_by() -> String {
    "5m".to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub databases: Vec<DatabaseEntry>,
    #[serde(default = "default_group_by")]
    pub group_by: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldTypeFilter {
    Numeric,
    String,
    Boolean,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsPolicy {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub types: Option<Vec<FieldTypeFilter>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecificMeasurement {
    pub fields: Option<FieldsPolicy>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementsConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub specific: HashMap<String, SpecificMeasurement>,
}

fn default_fallback_days() -> i64 {
    30
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalConfig {
    #[serde(default = "default_fallback_days")]
    pub fallback_days: i64,
    pub schedule: Option<String>,
}

impl IncrementalConfig {
    fn with_defaults() -> Self {
        Self {
            fallback_days: default_fallback_days(),
            schedule: None,
        }
    }
}

fn default_chunk_days() -> i64 {
    7
}
fn default_timeout_client() -> u64 {
    20
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    5
}
fn default_obsolete_days() -> i64 {
    30
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    pub mode: Mode,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub backup_period: Option<String>,
    #[serde(default = "default_chunk_days", alias = "days_of_pagination")]
    pub chunk_days: i64,
    #[serde(default = "default_timeout_client")]
    pub timeout_client: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    pub incremental: IncrementalConfig,
    #[serde(default = "default_obsolete_days")]
    pub obsolete_days: i64,
    pub log_file: Option<String>,
    pub log_level: LogLevel,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            start_date: None,
            end_date: None,
            backup_period: None,
            chunk_days: default_chunk_days(),
            timeout_client: default_timeout_client(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            incremental: IncrementalConfig::with_defaults(),
            obsolete_days: default_obsolete_days(),
            log_file: None,
            log_level: LogLevel::default(),
        }
    }
}

/// One job configuration, loaded from a single YAML document. Immutable
/// after load.
#[derive(Clone, Debug)]
pub struct JobConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub measurements: MeasurementsConfig,
    pub options: OptionsConfig,
    /// The raw document, kept around for the dotted-path accessor.
    raw: serde_yaml::Value,
    /// Name used for logging/process-title purposes: the file stem.
    pub name: String,
}

#[derive(Deserialize)]
struct RawDoc {
    source: SourceConfig,
    destination: DestinationConfig,
    #[serde(default)]
    measurements: MeasurementsConfig,
    #[serde(default)]
    options: OptionsConfig,
}

impl JobConfig {
    /// Reads and validates a configuration file in `.yaml` format.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let raw: serde_yaml::Value = serde_yaml::from_str(&contents)?;

        for section in ["source", "destination", "options"] {
            if raw.get(section).is_none() {
                return Err(Error::Config(format!(
                    "missing required top-level section `{section}`"
                )));
            }
        }

        let doc: RawDoc = serde_yaml::from_value(raw.clone())?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("job")
            .trim_end_matches(".template")
            .to_string();

        let config = Self {
            source: doc.source,
            destination: doc.destination,
            measurements: doc.measurements,
            options: doc.options,
            raw,
            name,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.source.url.is_empty() {
            return Err(Error::Config("`source.url` is required".into()));
        }
        if self.destination.url.is_empty() {
            return Err(Error::Config("`destination.url` is required".into()));
        }
        if self.options.chunk_days < 1 {
            return Err(Error::Config("`options.chunk_days` must be >= 1".into()));
        }
        if matches!(self.options.mode, Mode::Range) && self.options.start_date.is_none() {
            return Err(Error::Config(
                "`options.start_date` is required when `options.mode` is `range`".into(),
            ));
        }
        // An empty group_by forbids ranges wider than one chunk, since
        // raw-row pagination only tolerates single-day chunks.
        if self.source.group_by.is_empty() && self.options.chunk_days > 1 {
            return Err(Error::Config(
                "`source.group_by` is empty (raw rows); `options.chunk_days` must be 1".into(),
            ));
        }
        if let Some(schedule) = &self.options.incremental.schedule {
            if schedule.split_whitespace().count() != 5 {
                return Err(Error::Scheduling(format!(
                    "`options.incremental.schedule` must be a standard 5-field cron expression, got `{schedule}`"
                )));
            }
        }
        Ok(())
    }

    /// Dotted-path accessor with a default-on-missing contract, e.g.
    /// `get("options.incremental.fallback_days", 30)`.
    pub fn get<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        let mut cur = &self.raw;
        for part in path.split('.') {
            match cur.get(part) {
                Some(v) => cur = v,
                None => return default,
            }
        }
        serde_yaml::from_value(cur.clone()).unwrap_or(default)
    }

    /// Expands `source.databases` into concrete mappings.
    /// When the list is empty, it is populated from the source's database
    /// catalogue, excluding `_internal`.
    pub fn resolve_mappings(&self, source_databases: &[String]) -> Vec<crate::model::DatabaseMapping> {
        if !self.source.databases.is_empty() {
            return self
                .source
                .databases
                .iter()
                .map(|e| {
                    crate::model::DatabaseMapping::derive(
                        e.name.clone(),
                        e.destination.clone(),
                        e.prefix.as_deref(),
                        e.suffix.as_deref(),
                    )
                })
                .collect();
        }
        source_databases
            .iter()
            .filter(|name| name.as_str() != "_internal")
            .map(|name| crate::model::DatabaseMapping::derive(name.clone(), None, None, None))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MINIMAL: &str = r#"
source:
  url: "http://source:8086"
destination:
  url: "http://dest:8086"
options: {}
"#;

    #[test]
    fn minimal_config_loads_with_defaults() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("influx-relay-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("job.yaml");
        std::fs::write(&path, MINIMAL)?;

        let config = JobConfig::from_file(&path)?;
        assert_eq!(config.options.mode, Mode::Incremental);
        assert_eq!(config.options.chunk_days, 7);
        assert_eq!(config.options.retries, 3);
        assert_eq!(config.get("options.incremental.fallback_days", 0i64), 30);
        assert_eq!(config.get("options.nonexistent.key", 42i64), 42);

        std::fs::remove_dir_all(&dir).ok();
        Ok(())
    }

    #[test]
    fn missing_required_section_is_config_error() {
        let dir = std::env::temp_dir().join(format!("influx-relay-test2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.yaml");
        std::fs::write(&path, "source:\n  url: \"http://x\"\n").unwrap();

        let err = JobConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn template_files_are_recognized() {
        assert!(is_template(Path::new("/config/daily.template.yaml")));
        assert!(!is_template(Path::new("/config/daily.yaml")));
    }

    #[test]
    fn empty_group_by_forbids_multi_day_chunks() {
        let dir = std::env::temp_dir().join(format!("influx-relay-test3-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("raw.yaml");
        std::fs::write(
            &path,
            r#"
source:
  url: "http://source:8086"
  group_by: ""
destination:
  url: "http://dest:8086"
options:
  chunk_days: 7
"#,
        )
        .unwrap();

        let err = JobConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
