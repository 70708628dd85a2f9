//! Rich diagnostic error types for fah-progress.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for a reporting run.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum ProgressError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write report")]
    #[diagnostic(
        code(fah::render::io),
        help("The report sink closed or the disk is full.")
    )]
    Render {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SnapshotError {
    #[error("snapshot not found: {path}")]
    #[diagnostic(
        code(fah::snapshot::not_found),
        help(
            "The snapshot for this report date has not been staged locally. \
             Copy the work store from the server first, or check `snapshot_dir` \
             and `snapshot_template` in the configuration."
        )
    )]
    NotFound { path: String },

    #[error("snapshot is locked by a writer: {path}")]
    #[diagnostic(
        code(fah::snapshot::locked),
        help(
            "Another process has this database open for writing. Wait for it to exit, \
             or report against a copy of the snapshot."
        )
    )]
    Locked { path: String },

    #[error("snapshot is malformed: {path}: {message}")]
    #[diagnostic(
        code(fah::snapshot::malformed),
        help(
            "The file is not a readable work store, or it lacks the configured table. \
             Check the `table` setting and re-stage the snapshot if it was truncated."
        )
    )]
    Malformed { path: String, message: String },

    #[error("snapshot already exists: {path}")]
    #[diagnostic(
        code(fah::snapshot::exists),
        help("Snapshots are never overwritten. Remove the file or choose another path.")
    )]
    Exists { path: String },

    #[error("redb error: {message}")]
    #[diagnostic(
        code(fah::snapshot::redb),
        help(
            "The embedded database reported an error while reading. \
             The snapshot may be corrupt; re-stage it from the server."
        )
    )]
    Redb { message: String },
}

// ---------------------------------------------------------------------------
// Descriptor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DescriptorError {
    #[error("project descriptor not found: {path}")]
    #[diagnostic(
        code(fah::descriptor::missing),
        help(
            "Each project needs a `p<id>-project.<ext>` file in `descriptor_dir`. \
             Copy it from the work server or fix `descriptor_ext`."
        )
    )]
    Missing { project: u32, path: String },

    #[error("failed to read project descriptor: {path}")]
    #[diagnostic(
        code(fah::descriptor::read),
        help("Check file permissions on the descriptor.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed descriptor for project {project}: {message}")]
    #[diagnostic(
        code(fah::descriptor::malformed),
        help(
            "The descriptor must contain lines mentioning `runs`, `clones` and `gens`, \
             each with an integer somewhere on the line."
        )
    )]
    Malformed { project: u32, message: String },
}

// ---------------------------------------------------------------------------
// Record errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RecordError {
    #[error("cannot decode work-unit record at key {key}: {message}")]
    #[diagnostic(
        code(fah::record::decode),
        help(
            "The value is not a mapping with `run`, `gen` and `state` fields. \
             Set `decode_policy = \"skip\"` to report around malformed entries."
        )
    )]
    Decode { key: String, message: String },
}

// ---------------------------------------------------------------------------
// Aggregate errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AggregateError {
    #[error(
        "project {project} is degenerate: {runs} runs x {clones} clones x {gens} gens"
    )]
    #[diagnostic(
        code(fah::aggregate::degenerate),
        help(
            "Percentages need non-zero run and clone counts (and generation count \
             for work-unit fractions). Check the project descriptor."
        )
    )]
    DegenerateProject {
        project: u32,
        runs: u32,
        clones: u32,
        gens: u32,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(fah::config::read),
        help("Ensure the config file exists, or create one with `fah-progress init`.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(fah::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(fah::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no projects configured")]
    #[diagnostic(
        code(fah::config::no_projects),
        help("List project ids under `projects` in the config, or pass `--projects`.")
    )]
    NoProjects,

    #[error("invalid report date: \"{date}\"")]
    #[diagnostic(
        code(fah::config::invalid_date),
        help("Report dates are calendar labels like `20240301` or `2024-03-01`.")
    )]
    InvalidDate { date: String },

    #[error("invalid value for `{field}`: {message}")]
    #[diagnostic(code(fah::config::invalid_value))]
    InvalidValue { field: String, message: String },
}

/// Convenience result type for fah-progress operations.
pub type ProgressResult<T> = std::result::Result<T, ProgressError>;
