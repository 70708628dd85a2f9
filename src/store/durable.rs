//! Snapshot reader backed by a staged redb database.
//!
//! A snapshot file holds one table of `&[u8] → &[u8]` entries. A
//! [`RedbSnapshot`] opens the file as a redb `ReadOnlyDatabase`: it takes a
//! shared file lock, never rewrites the header, and never repairs the file in
//! place. Several readers may hold the same snapshot; a writer holding it
//! makes the open fail with [`SnapshotError::Locked`].

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use redb::{
    Database, DatabaseError, ReadOnlyDatabase, ReadableDatabase, ReadableTable, TableDefinition,
    TableError,
};

use super::{EntryVisitor, Snapshot, StoreResult};
use crate::error::SnapshotError;

/// Read-only handle to one snapshot file.
///
/// Dropping the handle releases the database file lock, so the handle is
/// closed on every exit path. [`RedbSnapshot::close`] does the same explicitly.
pub struct RedbSnapshot {
    db: ReadOnlyDatabase,
    path: PathBuf,
    table: String,
}

impl RedbSnapshot {
    /// Open an existing snapshot.
    ///
    /// Fails fast with [`SnapshotError::Locked`] if a writer holds the file,
    /// and with [`SnapshotError::Malformed`] if `table` does not exist or the
    /// file needs repair.
    pub fn open(path: &Path, table: &str) -> StoreResult<Self> {
        if !path.is_file() {
            return Err(SnapshotError::NotFound {
                path: path.display().to_string(),
            });
        }
        let db = ReadOnlyDatabase::open(path).map_err(|e| match e {
            DatabaseError::DatabaseAlreadyOpen => SnapshotError::Locked {
                path: path.display().to_string(),
            },
            other => SnapshotError::Malformed {
                path: path.display().to_string(),
                message: other.to_string(),
            },
        })?;
        let snapshot = Self {
            db,
            path: path.to_path_buf(),
            table: table.to_string(),
        };
        // Surface a missing table at open time rather than on the first scan.
        snapshot.scan(&mut |_, _| ControlFlow::Break(()))?;
        tracing::debug!(path = %path.display(), table, "opened snapshot");
        Ok(snapshot)
    }

    /// Release the database.
    pub fn close(self) {
        tracing::debug!(path = %self.path.display(), "closed snapshot");
    }

    fn table_error(&self, e: TableError) -> SnapshotError {
        match e {
            TableError::TableDoesNotExist(name) => SnapshotError::Malformed {
                path: self.path.display().to_string(),
                message: format!("table \"{name}\" does not exist"),
            },
            other => SnapshotError::Redb {
                message: format!("open_table failed: {other}"),
            },
        }
    }
}

impl Snapshot for RedbSnapshot {
    fn scan(&self, visit: &mut EntryVisitor<'_>) -> StoreResult<()> {
        let definition: TableDefinition<&[u8], &[u8]> = TableDefinition::new(&self.table);
        let txn = self.db.begin_read().map_err(|e| SnapshotError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn
            .open_table(definition)
            .map_err(|e| self.table_error(e))?;
        let range = table.iter().map_err(|e| SnapshotError::Redb {
            message: format!("iter failed: {e}"),
        })?;
        for entry in range {
            let (key, value) = entry.map_err(|e| SnapshotError::Redb {
                message: format!("read failed: {e}"),
            })?;
            if visit(key.value(), value.value()).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }
}

impl std::fmt::Debug for RedbSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbSnapshot")
            .field("path", &self.path)
            .field("table", &self.table)
            .finish()
    }
}

/// Write a new snapshot file from `(key, value)` pairs.
///
/// Refuses to touch an existing path. Returns the number of entries written.
pub fn create_snapshot<K, V>(
    path: &Path,
    table: &str,
    entries: impl IntoIterator<Item = (K, V)>,
) -> StoreResult<usize>
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    if path.exists() {
        return Err(SnapshotError::Exists {
            path: path.display().to_string(),
        });
    }
    let definition: TableDefinition<&[u8], &[u8]> = TableDefinition::new(table);
    let db = Database::create(path).map_err(|e| SnapshotError::Redb {
        message: format!("failed to create redb at {}: {e}", path.display()),
    })?;
    let txn = db.begin_write().map_err(|e| SnapshotError::Redb {
        message: format!("begin_write failed: {e}"),
    })?;
    let mut count = 0usize;
    {
        let mut table = txn.open_table(definition).map_err(|e| SnapshotError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        for (key, value) in entries {
            table
                .insert(key.as_ref(), value.as_ref())
                .map_err(|e| SnapshotError::Redb {
                    message: format!("insert failed: {e}"),
                })?;
            count += 1;
        }
    }
    txn.commit().map_err(|e| SnapshotError::Redb {
        message: format!("commit failed: {e}"),
    })?;
    tracing::debug!(path = %path.display(), table, entries = count, "created snapshot");
    Ok(count)
}
