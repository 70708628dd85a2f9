//! Report dates and where their snapshots live on disk.
//!
//! Snapshots are staged locally by an external copy step, one file per date,
//! named from a template such as `{server}_{date}_work.redb`.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::ConfigError;

/// Default snapshot file name template.
pub const DEFAULT_SNAPSHOT_TEMPLATE: &str = "{server}_{date}_work.redb";

/// A calendar label selecting one snapshot.
///
/// The label is kept verbatim for file names and headers; the parsed date is
/// used for ordering and validation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReportDate {
    date: NaiveDate,
    label: String,
}

impl ReportDate {
    /// Accepts `YYYYMMDD` and `YYYY-MM-DD`.
    pub fn parse(label: &str) -> Result<Self, ConfigError> {
        let label = label.trim();
        NaiveDate::parse_from_str(label, "%Y%m%d")
            .or_else(|_| NaiveDate::parse_from_str(label, "%Y-%m-%d"))
            .map(|date| Self {
                date,
                label: label.to_string(),
            })
            .map_err(|_| ConfigError::InvalidDate {
                date: label.to_string(),
            })
    }

    /// Today's local date as `YYYYMMDD`.
    pub fn today() -> Self {
        let date = chrono::Local::now().date_naive();
        Self {
            date,
            label: date.format("%Y%m%d").to_string(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for ReportDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Resolves a report date to its snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotLayout {
    pub dir: PathBuf,
    pub template: String,
    pub server_id: String,
}

impl SnapshotLayout {
    /// Check that the template distinguishes dates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.template.contains("{date}") {
            return Err(ConfigError::InvalidValue {
                field: "snapshot_template".into(),
                message: format!(
                    "\"{}\" has no {{date}} placeholder, so every date would read the same file",
                    self.template
                ),
            });
        }
        Ok(())
    }

    pub fn file_name(&self, date: &ReportDate) -> String {
        self.template
            .replace("{server}", &self.server_id)
            .replace("{date}", date.label())
    }

    pub fn snapshot_path(&self, date: &ReportDate) -> PathBuf {
        self.dir.join(self.file_name(date))
    }
}
