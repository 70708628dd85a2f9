//! Record extraction: select one project's entries from a snapshot.
//!
//! Keys carry the project as `P<id>` somewhere in their text
//! (e.g. `P17101-R0-C42`). The extractor scans the whole snapshot, keeps the
//! keys that match, and decodes their values.

use std::ops::ControlFlow;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProgressResult, RecordError};
use crate::record::{WorkUnitRecord, decode_record};
use crate::store::Snapshot;

/// How a project id is matched against snapshot keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMatchMode {
    /// `P<id>` must not be followed by another digit, so project 7 does not
    /// pick up `P70-…` keys.
    #[default]
    Boundary,
    /// `P<id>` anywhere in the key. Over-matches projects whose id is a
    /// numeric prefix of another; kept for comparison with older reports.
    Substring,
}

/// What to do with a matching entry whose value does not decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Fail the whole extraction.
    #[default]
    Strict,
    /// Log the entry, count it, and continue.
    Skip,
}

/// Compiled key predicate for one project.
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    project_id: u32,
    mode: KeyMatchMode,
    pattern: Regex,
}

impl KeyMatcher {
    pub fn new(project_id: u32, mode: KeyMatchMode) -> Self {
        let source = match mode {
            KeyMatchMode::Boundary => format!(r"P{project_id}(?:\D|$)"),
            KeyMatchMode::Substring => format!("P{project_id}"),
        };
        let pattern = Regex::new(&source).expect("project key pattern");
        Self {
            project_id,
            mode,
            pattern,
        }
    }

    pub fn project_id(&self) -> u32 {
        self.project_id
    }

    pub fn mode(&self) -> KeyMatchMode {
        self.mode
    }

    /// Test a raw snapshot key.
    pub fn matches(&self, key: &[u8]) -> bool {
        self.pattern.is_match(&String::from_utf8_lossy(key))
    }
}

/// Records pulled from one scan.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<WorkUnitRecord>,
    /// Matching entries dropped under [`DecodePolicy::Skip`].
    pub skipped: usize,
}

/// Scan `snapshot` once and decode every entry whose key matches.
///
/// One record per matching entry, in key order. Duplicate logical units are
/// not merged.
pub fn extract(
    snapshot: &dyn Snapshot,
    matcher: &KeyMatcher,
    policy: DecodePolicy,
) -> ProgressResult<Extraction> {
    let mut extraction = Extraction::default();
    let mut failure: Option<RecordError> = None;

    snapshot.scan(&mut |key, value| {
        if !matcher.matches(key) {
            return ControlFlow::Continue(());
        }
        match decode_record(key, value) {
            Ok(record) => extraction.records.push(record),
            Err(e) => match policy {
                DecodePolicy::Strict => {
                    failure = Some(e);
                    return ControlFlow::Break(());
                }
                DecodePolicy::Skip => {
                    tracing::warn!(
                        project = matcher.project_id(),
                        error = %e,
                        "skipping undecodable work unit"
                    );
                    extraction.skipped += 1;
                }
            },
        }
        ControlFlow::Continue(())
    })?;

    if let Some(e) = failure {
        return Err(e.into());
    }
    tracing::debug!(
        project = matcher.project_id(),
        mode = ?matcher.mode(),
        records = extraction.records.len(),
        skipped = extraction.skipped,
        origin = %snapshot.origin(),
        "extracted work units"
    );
    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProgressError;
    use crate::record::WorkUnitState;
    use crate::store::MemSnapshot;

    fn prefix_snapshot() -> MemSnapshot {
        MemSnapshot::from_pairs([
            ("P7-R0-C0-G20", "{'run': 0, 'gen': 20, 'state': 'FINISHED'}"),
            ("P70-R0-C0-G5", "{'run': 0, 'gen': 5, 'state': 'ASSIGNED'}"),
        ])
    }

    #[test]
    fn substring_mode_over_matches_prefix_ids() {
        let matcher = KeyMatcher::new(7, KeyMatchMode::Substring);
        let out = extract(&prefix_snapshot(), &matcher, DecodePolicy::Strict).unwrap();
        assert_eq!(out.records.len(), 2);
    }

    #[test]
    fn boundary_mode_excludes_prefix_ids() {
        let matcher = KeyMatcher::new(7, KeyMatchMode::Boundary);
        let out = extract(&prefix_snapshot(), &matcher, DecodePolicy::Strict).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].key, "P7-R0-C0-G20");
        assert_eq!(out.records[0].state, WorkUnitState::Finished);
    }

    #[test]
    fn boundary_accepts_any_non_digit_delimiter() {
        let m = KeyMatcher::new(7, KeyMatchMode::Boundary);
        assert!(m.matches(b"P7"));
        assert!(m.matches(b"P7-R0"));
        assert!(m.matches(b"P7_R0"));
        assert!(m.matches(b"P7R0C1"));
        assert!(m.matches(b"SVR1/P7/R0"));
        assert!(!m.matches(b"P70"));
        assert!(!m.matches(b"P71-R0"));
        assert!(!m.matches(b"p7-R0"));
    }

    #[test]
    fn matcher_reports_its_settings() {
        let m = KeyMatcher::new(17101, KeyMatchMode::Substring);
        assert_eq!(m.project_id(), 17101);
        assert_eq!(m.mode(), KeyMatchMode::Substring);
        assert_eq!(KeyMatcher::new(1, KeyMatchMode::default()).mode(), KeyMatchMode::Boundary);
    }

    #[test]
    fn every_returned_key_contains_project_tag() {
        let snap = MemSnapshot::from_pairs([
            ("P1-R0-C0", "{'run': 0, 'gen': 1, 'state': 'ASSIGNED'}"),
            ("P12-R0-C0", "{'run': 0, 'gen': 1, 'state': 'ASSIGNED'}"),
            ("P120-R0-C0", "{'run': 0, 'gen': 1, 'state': 'ASSIGNED'}"),
            ("P2-R0-C0", "{'run': 0, 'gen': 1, 'state': 'ASSIGNED'}"),
        ]);
        for mode in [KeyMatchMode::Boundary, KeyMatchMode::Substring] {
            let out = extract(&snap, &KeyMatcher::new(12, mode), DecodePolicy::Strict).unwrap();
            assert!(out.records.iter().all(|r| r.key.contains("P12")));
        }
        let substring = extract(
            &snap,
            &KeyMatcher::new(12, KeyMatchMode::Substring),
            DecodePolicy::Strict,
        )
        .unwrap();
        assert_eq!(substring.records.len(), 2);
    }

    #[test]
    fn duplicates_are_not_merged() {
        let snap = MemSnapshot::from_pairs([
            ("P5-R0-C0", "{'run': 0, 'clone': 0, 'gen': 3, 'state': 'ASSIGNED'}"),
            ("P5-R0-C0-old", "{'run': 0, 'clone': 0, 'gen': 3, 'state': 'ASSIGNED'}"),
        ]);
        let out = extract(&snap, &KeyMatcher::new(5, KeyMatchMode::Boundary), DecodePolicy::Strict)
            .unwrap();
        assert_eq!(out.records.len(), 2);
    }

    #[test]
    fn strict_policy_fails_on_bad_value() {
        let snap = MemSnapshot::from_pairs([
            ("P5-R0-C0", "{'run': 0, 'gen': 3, 'state': 'ASSIGNED'}"),
            ("P5-R0-C1", "not a mapping"),
        ]);
        let err = extract(&snap, &KeyMatcher::new(5, KeyMatchMode::Boundary), DecodePolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, ProgressError::Record(RecordError::Decode { .. })));
    }

    #[test]
    fn skip_policy_counts_bad_values() {
        let snap = MemSnapshot::from_pairs([
            ("P5-R0-C0", "{'run': 0, 'gen': 3, 'state': 'ASSIGNED'}"),
            ("P5-R0-C1", "not a mapping"),
            ("P6-R0-C1", "also garbage but another project"),
        ]);
        let out = extract(&snap, &KeyMatcher::new(5, KeyMatchMode::Boundary), DecodePolicy::Skip)
            .unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn policies_deserialize_lowercase() {
        #[derive(Deserialize)]
        struct Holder {
            mode: KeyMatchMode,
            policy: DecodePolicy,
        }
        let h: Holder = toml::from_str("mode = \"substring\"\npolicy = \"skip\"").unwrap();
        assert_eq!(h.mode, KeyMatchMode::Substring);
        assert_eq!(h.policy, DecodePolicy::Skip);
    }
}
