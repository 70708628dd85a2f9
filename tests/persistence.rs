//! Snapshot persistence and handle-lifecycle tests.
//!
//! These tests verify that staged snapshots read back identically across
//! reopen cycles, that one handle serves every project scan, that reading never
//! modifies the file, and that a held handle is released on every exit path.

use std::ops::ControlFlow;

use fah_progress::collection::{CollectionSettings, ProjectCollection};
use fah_progress::descriptor::ProjectDescriptor;
use fah_progress::error::SnapshotError;
use fah_progress::store::{MemSnapshot, RedbSnapshot, Snapshot, create_snapshot};

fn entries() -> Vec<(String, String)> {
    (0..50)
        .map(|i| {
            let project = if i % 2 == 0 { 101 } else { 102 };
            (
                format!("P{project}-R{}-C{i:03}", i % 3),
                format!("{{'run': {}, 'gen': {}, 'state': 'ASSIGNED'}}", i % 3, i % 7),
            )
        })
        .collect()
}

fn collect(snapshot: &dyn Snapshot) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    snapshot
        .scan(&mut |k, v| {
            out.push((k.to_vec(), v.to_vec()));
            ControlFlow::Continue(())
        })
        .unwrap();
    out
}

#[test]
fn snapshot_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("snap.redb");
    assert_eq!(create_snapshot(&path, "work", entries()).unwrap(), 50);

    let first = {
        let snap = RedbSnapshot::open(&path, "work").unwrap();
        collect(&snap)
    };
    let second = {
        let snap = RedbSnapshot::open(&path, "work").unwrap();
        collect(&snap)
    };
    assert_eq!(first.len(), 50);
    assert_eq!(first, second);

    // Matches the in-memory ordering of the same data.
    let mem = MemSnapshot::from_pairs(entries());
    assert_eq!(collect(&mem), first);
}

#[test]
fn one_handle_serves_every_project() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("snap.redb");
    create_snapshot(&path, "work", entries()).unwrap();

    let descriptors = [101, 102].map(|project_id| ProjectDescriptor {
        project_id,
        run_count: 3,
        clone_count: 50,
        generation_count: 7,
    });
    let mut collection =
        ProjectCollection::from_descriptors(descriptors, "20240301", CollectionSettings::default());

    let snap = RedbSnapshot::open(&path, "work").unwrap();
    let stats = collection.run_extraction(&snap).unwrap();
    snap.close();

    assert_eq!(stats.projects, 2);
    assert_eq!(stats.records, 50);
    let sizes: Vec<usize> = collection.aggregates().map(|a| a.len()).collect();
    assert_eq!(sizes, vec![25, 25]);
}

#[test]
fn handle_is_released_after_error_paths() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("snap.redb");
    create_snapshot(&path, "work", [("P1-R0-C0", "garbage")]).unwrap();

    let failing = || -> Result<(), Box<dyn std::error::Error>> {
        let snap = RedbSnapshot::open(&path, "work")?;
        let descriptors = [ProjectDescriptor {
            project_id: 1,
            run_count: 1,
            clone_count: 1,
            generation_count: 1,
        }];
        let mut collection =
            ProjectCollection::from_descriptors(descriptors, "d", CollectionSettings::default());
        collection.run_extraction(&snap)?;
        snap.close();
        Ok(())
    };
    assert!(failing().is_err());

    // The failed run dropped its handle, so the file opens again.
    let snap = RedbSnapshot::open(&path, "work").unwrap();
    assert_eq!(snap.entry_count().unwrap(), 1);
}

#[test]
fn writer_holding_the_file_fails_fast() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("snap.redb");
    create_snapshot(&path, "work", entries()).unwrap();

    let _writer = redb::Database::open(&path).unwrap();
    let err = RedbSnapshot::open(&path, "work").unwrap_err();
    assert!(matches!(err, SnapshotError::Locked { .. }));
}

#[test]
fn a_full_report_pass_does_not_modify_the_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("snap.redb");
    create_snapshot(&path, "work", entries()).unwrap();
    let before = std::fs::read(&path).unwrap();

    let descriptors = [101, 102].map(|project_id| ProjectDescriptor {
        project_id,
        run_count: 3,
        clone_count: 50,
        generation_count: 7,
    });
    let mut collection =
        ProjectCollection::from_descriptors(descriptors, "20240301", CollectionSettings::default());
    let snap = RedbSnapshot::open(&path, "work").unwrap();
    collection.run_extraction(&snap).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), before);
    snap.close();

    collection.generate_reports().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), before);
}
