//! Read-only access to work-unit snapshots.
//!
//! A snapshot is an ordered collection of `(key, value)` byte pairs that stays
//! immutable for the duration of a report. Two backends implement [`Snapshot`]:
//!
//! - [`RedbSnapshot`]: a staged redb database file, one per report date
//! - [`MemSnapshot`]: an in-memory `BTreeMap`, for fixtures and tests

pub mod durable;
pub mod mem;

use std::ops::ControlFlow;

pub use durable::{RedbSnapshot, create_snapshot};
pub use mem::MemSnapshot;

use crate::error::SnapshotError;

/// Result type for snapshot operations.
pub type StoreResult<T> = std::result::Result<T, SnapshotError>;

/// Visitor signature for [`Snapshot::scan`].
///
/// Return `ControlFlow::Break(())` to stop the scan early.
pub type EntryVisitor<'v> = dyn FnMut(&[u8], &[u8]) -> ControlFlow<()> + 'v;

/// An ordered, read-only key-value snapshot.
pub trait Snapshot {
    /// Visit every entry in key order.
    ///
    /// Each call is an independent pass over the snapshot, so a handle can be
    /// scanned once per project without reopening.
    fn scan(&self, visit: &mut EntryVisitor<'_>) -> StoreResult<()>;

    /// Human-readable origin of the snapshot, for logs and report headers.
    fn origin(&self) -> String;

    /// Count all entries with a full scan.
    fn entry_count(&self) -> StoreResult<usize> {
        let mut count = 0usize;
        self.scan(&mut |_, _| {
            count += 1;
            ControlFlow::Continue(())
        })?;
        Ok(count)
    }
}
