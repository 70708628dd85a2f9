//! Batch reporting across report dates.
//!
//! Each date is independent: its snapshot is opened once, shared by every
//! project, and closed before the report is rendered. A failing date is
//! recorded and the batch moves on, so reports already rendered for earlier
//! dates stand.

use crate::collection::{ExtractionStats, ProjectCollection};
use crate::config::ReportConfig;
use crate::error::{ProgressError, ProgressResult};
use crate::paths::ReportDate;
use crate::render::ReportRenderer;
use crate::report::DateReport;
use crate::store::RedbSnapshot;

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Dates rendered successfully, with their extraction totals.
    pub completed: Vec<(String, ExtractionStats)>,
    /// Dates that failed, with the reason.
    pub failed: Vec<(String, ProgressError)>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build the report for one date from its staged snapshot.
pub fn report_date(
    config: &ReportConfig,
    date: &ReportDate,
) -> ProgressResult<(DateReport, ExtractionStats)> {
    let mut collection =
        ProjectCollection::load(&config.projects, date.label(), config.collection_settings())?;

    let path = config.snapshot_layout().snapshot_path(date);
    let snapshot = RedbSnapshot::open(&path, &config.table)?;
    let stats = collection.run_extraction(&snapshot)?;
    snapshot.close();

    let report = collection.generate_reports()?;
    Ok((report, stats))
}

/// Report every configured date through `renderer`.
///
/// Configuration errors abort before any date is read. Per-date errors are
/// logged and collected in the summary.
pub fn run_batch(
    config: &ReportConfig,
    renderer: &mut dyn ReportRenderer,
) -> ProgressResult<BatchSummary> {
    config.validate()?;
    let dates = config.report_dates()?;
    let mut summary = BatchSummary::default();

    for date in &dates {
        tracing::info!(date = %date, projects = config.projects.len(), "reporting date");
        match report_date(config, date) {
            Ok((report, stats)) => {
                renderer
                    .render(&report)
                    .map_err(|source| ProgressError::Render { source })?;
                summary.completed.push((date.label().to_string(), stats));
            }
            Err(e) => {
                tracing::error!(date = %date, error = %e, "date failed");
                summary.failed.push((date.label().to_string(), e));
            }
        }
    }

    tracing::info!(
        completed = summary.completed.len(),
        failed = summary.failed.len(),
        "batch finished"
    );
    Ok(summary)
}
