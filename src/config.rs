//! Report configuration, persisted as TOML.
//!
//! A config names the projects to report on, the dates whose snapshots to
//! read, and where snapshots and project descriptors live.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregate::DEFAULT_UNIT_TIME_SPAN;
use crate::collection::CollectionSettings;
use crate::error::ConfigError;
use crate::extract::{DecodePolicy, KeyMatchMode};
use crate::paths::{DEFAULT_SNAPSHOT_TEMPLATE, ReportDate, SnapshotLayout};

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Default config file name in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fah-progress.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Project ids, in report order.
    #[serde(default)]
    pub projects: Vec<u32>,
    /// Report dates, in processing order. Empty means today.
    #[serde(default)]
    pub dates: Vec<String>,
    /// Work server id used in snapshot file names.
    #[serde(default = "default_server_id")]
    pub server_id: String,
    #[serde(default = "default_dir")]
    pub snapshot_dir: PathBuf,
    /// File name template with `{server}` and `{date}` placeholders.
    #[serde(default = "default_snapshot_template")]
    pub snapshot_template: String,
    /// Table holding work-unit entries inside each snapshot.
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_dir")]
    pub descriptor_dir: PathBuf,
    #[serde(default = "default_descriptor_ext")]
    pub descriptor_ext: String,
    /// Simulated time per generation (ns).
    #[serde(default = "default_unit_time_span")]
    pub unit_time_span: f64,
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
    #[serde(default)]
    pub key_match: KeyMatchMode,
    #[serde(default)]
    pub decode_policy: DecodePolicy,
}

fn default_server_id() -> String {
    "SVR2359493832".into()
}
fn default_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_snapshot_template() -> String {
    DEFAULT_SNAPSHOT_TEMPLATE.into()
}
fn default_table() -> String {
    "work".into()
}
fn default_descriptor_ext() -> String {
    "xml".into()
}
fn default_unit_time_span() -> f64 {
    DEFAULT_UNIT_TIME_SPAN
}
fn default_histogram_bins() -> usize {
    25
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            dates: Vec::new(),
            server_id: default_server_id(),
            snapshot_dir: default_dir(),
            snapshot_template: default_snapshot_template(),
            table: default_table(),
            descriptor_dir: default_dir(),
            descriptor_ext: default_descriptor_ext(),
            unit_time_span: default_unit_time_span(),
            histogram_bins: default_histogram_bins(),
            key_match: KeyMatchMode::default(),
            decode_policy: DecodePolicy::default(),
        }
    }
}

impl ReportConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject configs that cannot produce a meaningful report.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.projects.is_empty() {
            return Err(ConfigError::NoProjects);
        }
        if self.projects.contains(&0) {
            return Err(ConfigError::InvalidValue {
                field: "projects".into(),
                message: "project ids are positive integers".into(),
            });
        }
        if !self.unit_time_span.is_finite() || self.unit_time_span < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "unit_time_span".into(),
                message: format!("{} is not a finite non-negative number", self.unit_time_span),
            });
        }
        if self.histogram_bins == 0 {
            return Err(ConfigError::InvalidValue {
                field: "histogram_bins".into(),
                message: "must be at least 1".into(),
            });
        }
        self.snapshot_layout().validate()?;
        self.report_dates().map(|_| ())
    }

    /// Parsed report dates; today's date when none are configured.
    pub fn report_dates(&self) -> ConfigResult<Vec<ReportDate>> {
        if self.dates.is_empty() {
            return Ok(vec![ReportDate::today()]);
        }
        self.dates.iter().map(|d| ReportDate::parse(d)).collect()
    }

    pub fn snapshot_layout(&self) -> SnapshotLayout {
        SnapshotLayout {
            dir: self.snapshot_dir.clone(),
            template: self.snapshot_template.clone(),
            server_id: self.server_id.clone(),
        }
    }

    pub fn collection_settings(&self) -> CollectionSettings {
        CollectionSettings {
            descriptor_dir: self.descriptor_dir.clone(),
            descriptor_ext: self.descriptor_ext.clone(),
            unit_time_span: self.unit_time_span,
            key_match: self.key_match,
            decode_policy: self.decode_policy,
            histogram_bins: self.histogram_bins,
        }
    }
}
