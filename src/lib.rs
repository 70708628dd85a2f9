// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # fah-progress
//!
//! Progress reports for distributed molecular-dynamics projects, computed
//! from staged snapshots of the work server's unit store.
//!
//! ## Architecture
//!
//! - **Snapshots** (`store`): ordered, read-only key-value access (redb or in-memory)
//! - **Descriptors** (`descriptor`): run/clone/generation counts per project
//! - **Extraction** (`extract`, `record`): project key matching and value decoding
//! - **Aggregates** (`aggregate`): per-project tables and progress queries
//! - **Collections** (`collection`, `batch`): one scan per project per report date
//! - **Output** (`report`, `render`): immutable report data, text and JSON renderers
//!
//! ## Library usage
//!
//! ```no_run
//! use fah_progress::collection::{CollectionSettings, ProjectCollection};
//! use fah_progress::store::RedbSnapshot;
//!
//! let mut projects = ProjectCollection::load(&[17101], "20240301", CollectionSettings::default())?;
//! let snapshot = RedbSnapshot::open("SVR1_20240301_work.redb".as_ref(), "work")?;
//! projects.run_extraction(&snapshot)?;
//! snapshot.close();
//! for project in projects.generate_reports()?.projects {
//!     println!("{}", project.descriptor.describe());
//! }
//! # Ok::<(), fah_progress::error::ProgressError>(())
//! ```

pub mod aggregate;
pub mod batch;
pub mod collection;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod paths;
pub mod record;
pub mod render;
pub mod report;
pub mod store;
