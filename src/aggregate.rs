//! Per-project record table and progress queries.
//!
//! A [`ProjectAggregate`] pairs a [`ProjectDescriptor`] with every work unit
//! extracted for that project. The table is rebuilt as a whole on each
//! [`ProjectAggregate::ingest`] and is read-only between ingests.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::ProjectDescriptor;
use crate::error::AggregateError;
use crate::record::{WorkUnitRecord, WorkUnitState};

pub type AggregateResult<T> = std::result::Result<T, AggregateError>;

/// Simulated nanoseconds per generation unless configured otherwise.
pub const DEFAULT_UNIT_TIME_SPAN: f64 = 10.0;

/// A record plus its derived fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkUnitRow {
    pub record: WorkUnitRecord,
    /// `gen × unit_time_span`.
    pub trajectory_length: f64,
}

impl WorkUnitRow {
    fn derive(record: WorkUnitRecord, unit_time_span: f64) -> Self {
        let trajectory_length = f64::from(record.generation) * unit_time_span;
        Self {
            record,
            trajectory_length,
        }
    }
}

/// Equal-width histogram bin over trajectory lengths.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Progress of one run within a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub run: u32,
    pub clones: usize,
    pub finished: usize,
    pub failed: usize,
    pub assigned: usize,
    pub trajectory_length: f64,
    /// This run's trajectory lengths on the project histogram's bin edges.
    pub histogram: Vec<HistogramBin>,
}

/// All work units of one project.
#[derive(Debug, Clone)]
pub struct ProjectAggregate {
    descriptor: ProjectDescriptor,
    unit_time_span: f64,
    rows: Vec<WorkUnitRow>,
}

impl ProjectAggregate {
    pub fn new(descriptor: ProjectDescriptor, unit_time_span: f64) -> Self {
        Self {
            descriptor,
            unit_time_span,
            rows: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    pub fn unit_time_span(&self) -> f64 {
        self.unit_time_span
    }

    /// Append `records` and rederive every row.
    ///
    /// The table is rebuilt in one pass from the existing records followed by
    /// the new ones. An empty `records` leaves every query result unchanged.
    ///
    /// Records past the descriptor's final generation are kept and logged.
    /// They still add to [`finished_unit_fraction`](Self::finished_unit_fraction),
    /// which can then exceed 100 %, but never count as finished clones.
    pub fn ingest(&mut self, records: impl IntoIterator<Item = WorkUnitRecord>) {
        let span = self.unit_time_span;
        self.rows = std::mem::take(&mut self.rows)
            .into_iter()
            .map(|row| row.record)
            .chain(records)
            .map(|record| WorkUnitRow::derive(record, span))
            .collect();

        let overruns = self.generation_overruns();
        if overruns > 0 {
            tracing::warn!(
                project = self.descriptor.project_id,
                gens = self.descriptor.generation_count,
                overruns,
                "work units past the final generation"
            );
        }
    }

    /// Rows whose generation exceeds the descriptor's generation count.
    pub fn generation_overruns(&self) -> usize {
        let last_gen = self.descriptor.generation_count;
        self.rows.iter().filter(|r| r.record.generation > last_gen).count()
    }

    pub fn rows(&self) -> &[WorkUnitRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in `state`, with no descriptor check.
    pub fn state_count(&self, state: &WorkUnitState) -> usize {
        self.rows.iter().filter(|r| &r.record.state == state).count()
    }

    /// Clones that reached the final generation and are marked finished.
    pub fn finished_clone_count(&self) -> AggregateResult<usize> {
        self.require_clone_slots()?;
        let last_gen = self.descriptor.generation_count;
        Ok(self
            .rows
            .iter()
            .filter(|r| r.record.generation == last_gen && r.record.state == WorkUnitState::Finished)
            .count())
    }

    /// Generations completed across all rows.
    pub fn finished_unit_count(&self) -> u64 {
        self.rows.iter().map(|r| u64::from(r.record.generation)).sum()
    }

    /// Completed generations as a percentage of `runs × clones × gens`.
    ///
    /// A clone at generation 3 of 10 contributes 3, so this tracks simulated
    /// time rather than clone completion.
    pub fn finished_unit_fraction(&self) -> AggregateResult<f64> {
        let slots = self.descriptor.generation_slots();
        if slots == 0 {
            return Err(self.degenerate());
        }
        Ok(100.0 * self.finished_unit_count() as f64 / slots as f64)
    }

    pub fn failed_clone_count(&self) -> AggregateResult<usize> {
        self.require_clone_slots()?;
        Ok(self.state_count(&WorkUnitState::Failed))
    }

    pub fn assigned_clone_count(&self) -> AggregateResult<usize> {
        self.require_clone_slots()?;
        Ok(self.state_count(&WorkUnitState::Assigned))
    }

    /// `count` as a percentage of `runs × clones`.
    pub fn clone_percent(&self, count: usize) -> AggregateResult<f64> {
        let slots = self.require_clone_slots()?;
        Ok(100.0 * count as f64 / slots as f64)
    }

    /// Sum of trajectory lengths over all rows.
    pub fn total_trajectory_length(&self) -> f64 {
        self.rows.iter().map(|r| r.trajectory_length).sum()
    }

    pub fn max_trajectory_length(&self) -> f64 {
        self.rows
            .iter()
            .map(|r| r.trajectory_length)
            .fold(0.0, f64::max)
    }

    /// Equal-width histogram of trajectory lengths over `[0, max]`.
    ///
    /// The last bin is closed so the longest trajectory is counted. Empty
    /// aggregates and `bins == 0` produce no bins.
    pub fn trajectory_histogram(&self, bins: usize) -> Vec<HistogramBin> {
        self.histogram_of(self.rows.iter(), bins)
    }

    /// Per-run progress, ordered by run number.
    ///
    /// Each run's histogram uses the same `bins` edges as
    /// [`trajectory_histogram`](Self::trajectory_histogram), so runs can be
    /// overlaid.
    pub fn run_breakdown(&self, bins: usize) -> Vec<RunSummary> {
        let last_gen = self.descriptor.generation_count;
        let mut runs: BTreeMap<u32, RunSummary> = BTreeMap::new();
        for row in &self.rows {
            let rec = &row.record;
            let entry = runs.entry(rec.run).or_insert_with(|| RunSummary {
                run: rec.run,
                ..Default::default()
            });
            entry.clones += 1;
            entry.trajectory_length += row.trajectory_length;
            match rec.state {
                WorkUnitState::Finished if rec.generation == last_gen => entry.finished += 1,
                WorkUnitState::Failed => entry.failed += 1,
                WorkUnitState::Assigned => entry.assigned += 1,
                _ => {}
            }
        }
        runs.into_values()
            .map(|mut summary| {
                let rows = self.rows.iter().filter(|r| r.record.run == summary.run);
                summary.histogram = self.histogram_of(rows, bins);
                summary
            })
            .collect()
    }

    /// Bin `rows` over `[0, max]` of the whole project.
    fn histogram_of<'r>(
        &self,
        rows: impl Iterator<Item = &'r WorkUnitRow>,
        bins: usize,
    ) -> Vec<HistogramBin> {
        if bins == 0 || self.rows.is_empty() {
            return Vec::new();
        }
        let max = self.max_trajectory_length();
        let upper = if max > 0.0 { max } else { 1.0 };
        let width = upper / bins as f64;

        let mut counts = vec![0usize; bins];
        for row in rows {
            let index = ((row.trajectory_length / width) as usize).min(bins - 1);
            counts[index] += 1;
        }
        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                lower: i as f64 * width,
                upper: (i + 1) as f64 * width,
                count,
            })
            .collect()
    }

    fn require_clone_slots(&self) -> AggregateResult<u64> {
        match self.descriptor.clone_slots() {
            0 => Err(self.degenerate()),
            slots => Ok(slots),
        }
    }

    fn degenerate(&self) -> AggregateError {
        AggregateError::DegenerateProject {
            project: self.descriptor.project_id,
            runs: self.descriptor.run_count,
            clones: self.descriptor.clone_count,
            gens: self.descriptor.generation_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(runs: u32, clones: u32, gens: u32) -> ProjectDescriptor {
        ProjectDescriptor {
            project_id: 7,
            run_count: runs,
            clone_count: clones,
            generation_count: gens,
        }
    }

    fn rec(run: u32, generation: u32, state: WorkUnitState) -> WorkUnitRecord {
        WorkUnitRecord::new(format!("P7-R{run}"), run, generation, state)
    }

    fn sample() -> ProjectAggregate {
        let mut agg = ProjectAggregate::new(descriptor(2, 5, 10), DEFAULT_UNIT_TIME_SPAN);
        agg.ingest([
            rec(0, 10, WorkUnitState::Finished),
            rec(0, 10, WorkUnitState::Finished),
            rec(0, 7, WorkUnitState::Finished),
            rec(1, 3, WorkUnitState::Assigned),
            rec(1, 0, WorkUnitState::Failed),
        ]);
        agg
    }

    #[test]
    fn summary_queries() {
        let agg = sample();
        assert_eq!(agg.finished_clone_count().unwrap(), 2);
        assert_eq!(agg.failed_clone_count().unwrap(), 1);
        assert_eq!(agg.assigned_clone_count().unwrap(), 1);
        assert_eq!(agg.finished_unit_count(), 30);
        // 30 of 2 × 5 × 10 generations.
        assert!((agg.finished_unit_fraction().unwrap() - 30.0).abs() < 1e-9);
        assert!((agg.clone_percent(2).unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn trajectory_length_is_derived() {
        let agg = sample();
        let lengths: Vec<f64> = agg.rows().iter().map(|r| r.trajectory_length).collect();
        assert_eq!(lengths, vec![100.0, 100.0, 70.0, 30.0, 0.0]);
        assert!((agg.total_trajectory_length() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn unit_time_span_is_configurable() {
        let mut agg = ProjectAggregate::new(descriptor(1, 1, 4), 2.5);
        agg.ingest([rec(0, 4, WorkUnitState::Finished)]);
        assert_eq!(agg.rows()[0].trajectory_length, 10.0);
    }

    #[test]
    fn state_counts_partition_known_states() {
        let agg = sample();
        let finished = agg.state_count(&WorkUnitState::Finished);
        assert_eq!(
            agg.assigned_clone_count().unwrap() + agg.failed_clone_count().unwrap() + finished,
            agg.len()
        );
    }

    #[test]
    fn empty_ingest_changes_nothing() {
        let mut agg = sample();
        let before = (
            agg.finished_clone_count().unwrap(),
            agg.finished_unit_fraction().unwrap(),
            agg.failed_clone_count().unwrap(),
            agg.assigned_clone_count().unwrap(),
            agg.rows().to_vec(),
        );
        agg.ingest(Vec::<WorkUnitRecord>::new());
        let after = (
            agg.finished_clone_count().unwrap(),
            agg.finished_unit_fraction().unwrap(),
            agg.failed_clone_count().unwrap(),
            agg.assigned_clone_count().unwrap(),
            agg.rows().to_vec(),
        );
        assert_eq!(before, after);
    }

    #[test]
    fn unit_fraction_grows_with_finished_records() {
        let mut agg = ProjectAggregate::new(descriptor(2, 5, 10), DEFAULT_UNIT_TIME_SPAN);
        let mut last = agg.finished_unit_fraction().unwrap();
        for _ in 0..10 {
            agg.ingest([rec(0, 10, WorkUnitState::Finished)]);
            let now = agg.finished_unit_fraction().unwrap();
            assert!(now >= last);
            last = now;
        }
        assert!((last - 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_clones_is_degenerate() {
        let mut agg = ProjectAggregate::new(descriptor(10, 0, 20), DEFAULT_UNIT_TIME_SPAN);
        agg.ingest([rec(0, 20, WorkUnitState::Finished)]);
        assert!(matches!(
            agg.finished_clone_count(),
            Err(AggregateError::DegenerateProject { clones: 0, .. })
        ));
        assert!(agg.finished_unit_fraction().is_err());
        assert!(agg.failed_clone_count().is_err());
        assert!(agg.assigned_clone_count().is_err());
        assert!(agg.clone_percent(1).is_err());
    }

    #[test]
    fn zero_gens_only_breaks_unit_fraction() {
        let agg = ProjectAggregate::new(descriptor(1, 1, 0), DEFAULT_UNIT_TIME_SPAN);
        assert!(agg.finished_unit_fraction().is_err());
        assert_eq!(agg.finished_clone_count().unwrap(), 0);
    }

    #[test]
    fn histogram_covers_all_rows() {
        let agg = sample();
        let bins = agg.trajectory_histogram(4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), agg.len());
        assert_eq!(bins[0].lower, 0.0);
        assert_eq!(bins[3].upper, 100.0);
        // Max-length rows land in the closed last bin.
        assert_eq!(bins[3].count, 2);
        assert_eq!(bins[2].count, 1);
    }

    #[test]
    fn histogram_of_empty_aggregate() {
        let agg = ProjectAggregate::new(descriptor(1, 1, 1), DEFAULT_UNIT_TIME_SPAN);
        assert!(agg.trajectory_histogram(25).is_empty());
    }

    #[test]
    fn run_breakdown_is_ordered_by_run() {
        let agg = sample();
        let runs = agg.run_breakdown(4);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run, 0);
        assert_eq!(runs[0].clones, 3);
        assert_eq!(runs[0].finished, 2);
        assert_eq!(runs[1].failed, 1);
        assert_eq!(runs[1].assigned, 1);
        assert_eq!(runs[1].trajectory_length, 30.0);
    }

    #[test]
    fn run_histograms_share_project_edges() {
        let agg = sample();
        let project = agg.trajectory_histogram(4);
        let runs = agg.run_breakdown(4);

        for run in &runs {
            let edges: Vec<(f64, f64)> = run.histogram.iter().map(|b| (b.lower, b.upper)).collect();
            let expected: Vec<(f64, f64)> = project.iter().map(|b| (b.lower, b.upper)).collect();
            assert_eq!(edges, expected);
        }
        // Lengths 100, 100, 70 in run 0; 30, 0 in run 1; width 25.
        let counts = |i: usize| -> Vec<usize> { runs[i].histogram.iter().map(|b| b.count).collect() };
        assert_eq!(counts(0), vec![0, 0, 1, 2]);
        assert_eq!(counts(1), vec![1, 1, 0, 0]);
        for (i, bin) in project.iter().enumerate() {
            assert_eq!(bin.count, runs.iter().map(|r| r.histogram[i].count).sum::<usize>());
        }
    }

    #[test]
    fn generations_past_the_descriptor_are_counted_not_finished() {
        let mut agg = ProjectAggregate::new(descriptor(1, 2, 10), DEFAULT_UNIT_TIME_SPAN);
        agg.ingest([
            rec(0, 10, WorkUnitState::Finished),
            rec(0, 12, WorkUnitState::Finished),
        ]);
        assert_eq!(agg.generation_overruns(), 1);
        assert_eq!(agg.finished_clone_count().unwrap(), 1);
        // 22 of 1 × 2 × 10 generations.
        assert!((agg.finished_unit_fraction().unwrap() - 110.0).abs() < 1e-9);
    }
}
