//! Immutable report data handed to renderers.

use serde::Serialize;

use crate::aggregate::{AggregateResult, HistogramBin, ProjectAggregate, RunSummary};
use crate::descriptor::ProjectDescriptor;

/// A count with its share of the project's slots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tally {
    pub count: u64,
    pub percent: f64,
}

/// Progress summary for one project on one report date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectReport {
    pub descriptor: ProjectDescriptor,
    /// Work units found in the snapshot.
    pub work_units: usize,
    /// Matching entries dropped because their values did not decode.
    pub skipped: usize,
    /// Share of `runs × clones`.
    pub finished_clones: Tally,
    /// Completed generations; share of `runs × clones × gens`.
    pub finished_units: Tally,
    pub failed_clones: Tally,
    pub assigned_clones: Tally,
    pub unit_time_span: f64,
    pub total_trajectory_length: f64,
    pub histogram: Vec<HistogramBin>,
    pub runs: Vec<RunSummary>,
}

impl ProjectReport {
    pub fn from_aggregate(
        aggregate: &ProjectAggregate,
        histogram_bins: usize,
        skipped: usize,
    ) -> AggregateResult<Self> {
        let clone_tally = |count: usize| -> AggregateResult<Tally> {
            Ok(Tally {
                count: count as u64,
                percent: aggregate.clone_percent(count)?,
            })
        };
        Ok(Self {
            descriptor: *aggregate.descriptor(),
            work_units: aggregate.len(),
            skipped,
            finished_clones: clone_tally(aggregate.finished_clone_count()?)?,
            finished_units: Tally {
                count: aggregate.finished_unit_count(),
                percent: aggregate.finished_unit_fraction()?,
            },
            failed_clones: clone_tally(aggregate.failed_clone_count()?)?,
            assigned_clones: clone_tally(aggregate.assigned_clone_count()?)?,
            unit_time_span: aggregate.unit_time_span(),
            total_trajectory_length: aggregate.total_trajectory_length(),
            histogram: aggregate.trajectory_histogram(histogram_bins),
            runs: aggregate.run_breakdown(histogram_bins),
        })
    }
}

/// All project reports for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateReport {
    pub date: String,
    pub snapshot: String,
    /// In configured project order.
    pub projects: Vec<ProjectReport>,
}
