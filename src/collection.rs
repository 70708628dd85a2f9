//! A report date's set of projects, built and scanned together.

use std::path::PathBuf;

use crate::aggregate::{DEFAULT_UNIT_TIME_SPAN, ProjectAggregate};
use crate::descriptor::ProjectDescriptor;
use crate::error::{AggregateError, ProgressResult};
use crate::extract::{DecodePolicy, KeyMatchMode, KeyMatcher, extract};
use crate::report::{DateReport, ProjectReport};
use crate::store::Snapshot;

/// Settings shared by every project in a collection.
#[derive(Debug, Clone)]
pub struct CollectionSettings {
    pub descriptor_dir: PathBuf,
    pub descriptor_ext: String,
    pub unit_time_span: f64,
    pub key_match: KeyMatchMode,
    pub decode_policy: DecodePolicy,
    pub histogram_bins: usize,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            descriptor_dir: PathBuf::from("."),
            descriptor_ext: "xml".into(),
            unit_time_span: DEFAULT_UNIT_TIME_SPAN,
            key_match: KeyMatchMode::default(),
            decode_policy: DecodePolicy::default(),
            histogram_bins: 25,
        }
    }
}

#[derive(Debug)]
struct TrackedProject {
    aggregate: ProjectAggregate,
    skipped: usize,
}

/// Totals from one [`ProjectCollection::run_extraction`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub projects: usize,
    pub records: usize,
    pub skipped: usize,
}

/// Descriptor + aggregate pairs for every configured project of one date.
#[derive(Debug)]
pub struct ProjectCollection {
    date: String,
    settings: CollectionSettings,
    projects: Vec<TrackedProject>,
    snapshot_origin: Option<String>,
}

impl ProjectCollection {
    /// Load every descriptor. Fails as a whole if any one is missing or
    /// malformed.
    pub fn load(
        project_ids: &[u32],
        date: impl Into<String>,
        settings: CollectionSettings,
    ) -> ProgressResult<Self> {
        let projects = project_ids
            .iter()
            .map(|&id| {
                ProjectDescriptor::load(&settings.descriptor_dir, &settings.descriptor_ext, id)
                    .map(|descriptor| TrackedProject {
                        aggregate: ProjectAggregate::new(descriptor, settings.unit_time_span),
                        skipped: 0,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            date: date.into(),
            settings,
            projects,
            snapshot_origin: None,
        })
    }

    /// Build from descriptors already in hand.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ProjectDescriptor>,
        date: impl Into<String>,
        settings: CollectionSettings,
    ) -> Self {
        let projects = descriptors
            .into_iter()
            .map(|descriptor| TrackedProject {
                aggregate: ProjectAggregate::new(descriptor, settings.unit_time_span),
                skipped: 0,
            })
            .collect();
        Self {
            date: date.into(),
            settings,
            projects,
            snapshot_origin: None,
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Aggregates in configured order.
    pub fn aggregates(&self) -> impl Iterator<Item = &ProjectAggregate> {
        self.projects.iter().map(|p| &p.aggregate)
    }

    /// Scan `snapshot` once per project and ingest the results.
    ///
    /// The caller owns the snapshot and closes it after this returns.
    pub fn run_extraction(&mut self, snapshot: &dyn Snapshot) -> ProgressResult<ExtractionStats> {
        let mut stats = ExtractionStats::default();
        for project in &mut self.projects {
            let id = project.aggregate.descriptor().project_id;
            let matcher = KeyMatcher::new(id, self.settings.key_match);
            let extraction = extract(snapshot, &matcher, self.settings.decode_policy)?;

            stats.projects += 1;
            stats.records += extraction.records.len();
            stats.skipped += extraction.skipped;
            tracing::info!(
                project = id,
                date = %self.date,
                records = extraction.records.len(),
                skipped = extraction.skipped,
                "project extracted"
            );

            project.skipped += extraction.skipped;
            project.aggregate.ingest(extraction.records);
        }
        self.snapshot_origin = Some(snapshot.origin());
        Ok(stats)
    }

    /// Summaries for every project, in configured order.
    pub fn generate_reports(&self) -> Result<DateReport, AggregateError> {
        let projects = self
            .projects
            .iter()
            .map(|p| ProjectReport::from_aggregate(&p.aggregate, self.settings.histogram_bins, p.skipped))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DateReport {
            date: self.date.clone(),
            snapshot: self.snapshot_origin.clone().unwrap_or_default(),
            projects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DescriptorError, ProgressError};
    use crate::store::MemSnapshot;
    use tempfile::TempDir;

    fn write_descriptor(dir: &TempDir, id: u32, runs: u32, clones: u32, gens: u32) {
        std::fs::write(
            dir.path().join(format!("p{id}-project.xml")),
            format!("<runs v=\"{runs}\"/>\n<clones v=\"{clones}\"/>\n<gens v=\"{gens}\"/>\n"),
        )
        .unwrap();
    }

    fn settings(dir: &TempDir) -> CollectionSettings {
        CollectionSettings {
            descriptor_dir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn load_fails_atomically_on_missing_descriptor() {
        let dir = TempDir::new().unwrap();
        write_descriptor(&dir, 7, 1, 2, 3);
        let err = ProjectCollection::load(&[7, 8], "20240301", settings(&dir)).unwrap_err();
        assert!(matches!(
            err,
            ProgressError::Descriptor(DescriptorError::Missing { project: 8, .. })
        ));
    }

    #[test]
    fn reports_follow_configured_order() {
        let dir = TempDir::new().unwrap();
        write_descriptor(&dir, 7, 1, 2, 10);
        write_descriptor(&dir, 3, 1, 2, 10);
        let mut collection = ProjectCollection::load(&[7, 3], "20240301", settings(&dir)).unwrap();
        assert_eq!(collection.len(), 2);

        let snap = MemSnapshot::from_pairs([
            ("P3-R0-C0", "{'run': 0, 'gen': 10, 'state': 'FINISHED'}"),
            ("P7-R0-C0", "{'run': 0, 'gen': 4, 'state': 'ASSIGNED'}"),
            ("P7-R0-C1", "{'run': 0, 'gen': 10, 'state': 'FINISHED'}"),
        ]);
        let stats = collection.run_extraction(&snap).unwrap();
        assert_eq!(
            stats,
            ExtractionStats {
                projects: 2,
                records: 3,
                skipped: 0
            }
        );

        let report = collection.generate_reports().unwrap();
        assert_eq!(report.date, "20240301");
        assert!(report.snapshot.starts_with("memory"));
        let ids: Vec<u32> = report.projects.iter().map(|p| p.descriptor.project_id).collect();
        assert_eq!(ids, vec![7, 3]);
        assert_eq!(report.projects[0].work_units, 2);
        assert_eq!(report.projects[0].finished_clones.count, 1);
        assert_eq!(report.projects[0].finished_clones.percent, 50.0);
        assert_eq!(report.projects[1].finished_units.percent, 50.0);
    }

    #[test]
    fn degenerate_project_fails_generation() {
        let descriptors = [ProjectDescriptor {
            project_id: 1,
            run_count: 3,
            clone_count: 0,
            generation_count: 5,
        }];
        let collection =
            ProjectCollection::from_descriptors(descriptors, "d", CollectionSettings::default());
        assert!(matches!(
            collection.generate_reports(),
            Err(AggregateError::DegenerateProject { project: 1, .. })
        ));
    }

    #[test]
    fn skipped_entries_reach_the_report() {
        let descriptors = [ProjectDescriptor {
            project_id: 4,
            run_count: 1,
            clone_count: 2,
            generation_count: 2,
        }];
        let mut collection = ProjectCollection::from_descriptors(
            descriptors,
            "d",
            CollectionSettings {
                decode_policy: DecodePolicy::Skip,
                ..Default::default()
            },
        );
        let snap = MemSnapshot::from_pairs([
            ("P4-R0-C0", "{'run': 0, 'gen': 2, 'state': 'FINISHED'}"),
            ("P4-R0-C1", "{'run': 0}"),
        ]);
        collection.run_extraction(&snap).unwrap();
        let report = collection.generate_reports().unwrap();
        assert_eq!(report.projects[0].skipped, 1);
        assert_eq!(report.projects[0].work_units, 1);
    }
}
