//! Trash manager
//!
//! Soft delete, restore, bulk restore, purge and empty. An item is either
//! active in the tree or trashed under `.trash/<undo_id>` with its record;
//! restore and purge both end the trashed state.

use log::{info, warn};
use std::fs;
use uuid::Uuid;

use crate::error::{StorageError, TrashError};
use crate::storage::confinement::PathGuard;
use crate::storage::descriptor::{Descriptor, WalkReport, describe};
use crate::storage::operations::path_exists;
use crate::trash::is_record_name;
use crate::trash::record::TrashRecord;
use crate::trash::results::{DeleteResult, RestoreAllResult};
use crate::trash::store::{RecoveryReport, TrashStore};

#[derive(Debug, Clone)]
pub struct TrashManager {
    guard: PathGuard,
    store: TrashStore,
}

impl TrashManager {
    pub fn new(guard: PathGuard) -> Self {
        let store = TrashStore::new(guard.root());
        Self { guard, store }
    }

    pub fn store(&self) -> &TrashStore {
        &self.store
    }

    pub fn recover(&self) -> std::io::Result<RecoveryReport> {
        self.store.recover()
    }

    /// Moves the item at `logical_path` into the trash.
    pub fn soft_delete(&self, logical_path: &str) -> Result<DeleteResult, TrashError> {
        if logical_path.trim().is_empty() {
            return Err(StorageError::EmptyField("path").into());
        }

        let target = self.guard.join_item(logical_path)?;
        if !path_exists(target.absolute()) {
            return Err(StorageError::NotFound(target.logical().to_string()).into());
        }

        // Captured before the move so the caller sees the live state.
        let item = describe(target.absolute(), target.logical(), &mut WalkReport::new())?;

        let undo_id = Uuid::new_v4().to_string();
        let record = TrashRecord::new(target.logical(), &item.name, item.is_dir);
        self.store.put(&undo_id, target.absolute(), &record)?;

        info!("Moved {} to trash as {}", target.logical(), undo_id);
        Ok(DeleteResult { undo_id, item })
    }

    /// Record for `undo_id`, requiring the trashed item to exist too.
    pub fn peek(&self, undo_id: &str) -> Result<TrashRecord, TrashError> {
        let undo_id = checked_id(undo_id)?;
        if !self.store.contains(undo_id) {
            return Err(TrashError::EntryNotFound(undo_id.to_string()));
        }
        self.store.read(undo_id)
    }

    /// Moves a trashed item back to its original path. Never overwrites.
    pub fn restore(&self, undo_id: &str) -> Result<Descriptor, TrashError> {
        let record = self.peek(undo_id)?;
        if record.original_path.trim().is_empty() {
            return Err(TrashError::MissingOriginalPath(undo_id.to_string()));
        }

        let destination = self.guard.join_item(&record.original_path)?;
        if path_exists(destination.absolute()) {
            return Err(TrashError::RestoreConflict(destination.logical().to_string()));
        }

        if let Some(parent) = destination.absolute().parent() {
            fs::create_dir_all(parent)?;
        }
        self.store.take(undo_id, destination.absolute())?;
        info!("Restored {} to {}", undo_id, destination.logical());

        Ok(describe(
            destination.absolute(),
            destination.logical(),
            &mut WalkReport::new(),
        )?)
    }

    /// Restores every trashed item that has a record. Failures are counted,
    /// not propagated.
    pub fn restore_all(&self) -> Result<RestoreAllResult, TrashError> {
        let mut result = RestoreAllResult::default();

        for id in self.store.ids()? {
            if !self.store.has_record(&id) {
                continue;
            }
            match self.restore(&id) {
                Ok(_) => result.restored_count += 1,
                Err(TrashError::MissingOriginalPath(_)) => {
                    warn!("Skipping trash entry {} without original path", id);
                }
                Err(e) => {
                    warn!("Failed to restore {}: {}", id, e);
                    result.failed_count += 1;
                }
            }
        }

        info!(
            "Restore all: {} restored, {} failed",
            result.restored_count, result.failed_count
        );
        Ok(result)
    }

    /// Deletes a trashed item and its record for good.
    pub fn purge(&self, undo_id: &str) -> Result<(), TrashError> {
        let undo_id = checked_id(undo_id)?;
        self.store.purge(undo_id)?;
        info!("Permanently deleted {}", undo_id);
        Ok(())
    }

    /// Removes everything in the trash; returns how many items were removed.
    pub fn empty(&self) -> Result<usize, TrashError> {
        let removed = self.store.clear()?;
        info!("Emptied trash, {} item(s) removed", removed);
        Ok(removed)
    }
}

/// Rejects ids that could address anything but a direct trash entry.
fn checked_id(undo_id: &str) -> Result<&str, TrashError> {
    let undo_id = undo_id.trim();
    if undo_id.is_empty() {
        return Err(StorageError::EmptyField("undo_id").into());
    }
    if undo_id == "."
        || undo_id == ".."
        || undo_id.contains(['/', '\\', '\0'])
        || is_record_name(undo_id)
    {
        return Err(TrashError::EntryNotFound(undo_id.to_string()));
    }
    Ok(undo_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_id() {
        assert!(checked_id("4f1c").is_ok());
        assert!(matches!(
            checked_id("  "),
            Err(TrashError::Storage(StorageError::EmptyField("undo_id")))
        ));
        assert!(matches!(
            checked_id("../etc"),
            Err(TrashError::EntryNotFound(_))
        ));
        assert!(matches!(checked_id(".."), Err(TrashError::EntryNotFound(_))));
    }

    #[test]
    fn test_checked_id_rejects_record_names() {
        assert!(matches!(
            checked_id("4f1c.meta"),
            Err(TrashError::EntryNotFound(_))
        ));
        assert!(matches!(
            checked_id("4f1c.meta.tmp"),
            Err(TrashError::EntryNotFound(_))
        ));
    }
}
