//! Project descriptors: run, clone and generation counts per project.
//!
//! The work server keeps one `p<id>-project.<ext>` file per project. Only
//! three numbers matter here, so the parser is a line scanner rather than a
//! format-aware reader: any line mentioning `runs`, `clones` or `gens` sets
//! that field from the first integer on the line. This works against the
//! XML the server writes and against hand-written notes alike. A label that
//! appears inside a comment is matched too.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::DescriptorError;

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

pub type DescriptorResult<T> = std::result::Result<T, DescriptorError>;

/// Shape of one simulation project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectDescriptor {
    pub project_id: u32,
    pub run_count: u32,
    pub clone_count: u32,
    pub generation_count: u32,
}

/// Deterministic descriptor file name for a project.
pub fn descriptor_file_name(project_id: u32, ext: &str) -> String {
    format!("p{project_id}-project.{ext}")
}

/// Full descriptor path inside `dir`.
pub fn descriptor_path(dir: &Path, project_id: u32, ext: &str) -> PathBuf {
    dir.join(descriptor_file_name(project_id, ext))
}

impl ProjectDescriptor {
    /// Locate and parse the descriptor for `project_id` in `dir`.
    pub fn load(dir: &Path, ext: &str, project_id: u32) -> DescriptorResult<Self> {
        let path = descriptor_path(dir, project_id, ext);
        if !path.is_file() {
            return Err(DescriptorError::Missing {
                project: project_id,
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|e| DescriptorError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let descriptor = Self::parse(project_id, &text)?;
        tracing::debug!(
            project = project_id,
            runs = descriptor.run_count,
            clones = descriptor.clone_count,
            gens = descriptor.generation_count,
            path = %path.display(),
            "loaded project descriptor"
        );
        Ok(descriptor)
    }

    /// Parse descriptor text.
    ///
    /// Lines are independent and order does not matter, except that a later
    /// line carrying the same label replaces an earlier one.
    pub fn parse(project_id: u32, text: &str) -> DescriptorResult<Self> {
        let mut runs = None;
        let mut clones = None;
        let mut gens = None;

        for (index, line) in text.lines().enumerate() {
            let labelled = [
                ("runs", &mut runs),
                ("clones", &mut clones),
                ("gens", &mut gens),
            ];
            if !labelled.iter().any(|(label, _)| line.contains(label)) {
                continue;
            }
            let value = first_integer(project_id, index + 1, line)?;
            for (label, slot) in labelled {
                if line.contains(label) {
                    *slot = Some(value);
                }
            }
        }

        let missing = |field: &str| DescriptorError::Malformed {
            project: project_id,
            message: format!("no line mentions \"{field}\""),
        };
        Ok(Self {
            project_id,
            run_count: runs.ok_or_else(|| missing("runs"))?,
            clone_count: clones.ok_or_else(|| missing("clones"))?,
            generation_count: gens.ok_or_else(|| missing("gens"))?,
        })
    }

    /// Total clone slots (`runs × clones`).
    pub fn clone_slots(&self) -> u64 {
        u64::from(self.run_count) * u64::from(self.clone_count)
    }

    /// Total generation slots (`runs × clones × gens`).
    pub fn generation_slots(&self) -> u64 {
        self.clone_slots() * u64::from(self.generation_count)
    }

    /// One-line summary of the project shape.
    pub fn describe(&self) -> String {
        format!(
            "{} has {} runs with {} clones and {} gens",
            self.project_id, self.run_count, self.clone_count, self.generation_count
        )
    }
}

fn first_integer(project_id: u32, line_no: usize, line: &str) -> DescriptorResult<u32> {
    let digits = INTEGER
        .find(line)
        .ok_or_else(|| DescriptorError::Malformed {
            project: project_id,
            message: format!("line {line_no} has a label but no integer: {}", line.trim()),
        })?
        .as_str();
    digits.parse().map_err(|_| DescriptorError::Malformed {
        project: project_id,
        message: format!("line {line_no}: {digits} does not fit in 32 bits"),
    })
}
