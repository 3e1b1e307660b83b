//! Trash store
//!
//! On disk every trashed item is a pair: `.trash/<id>` holds the item and
//! `.trash/<id>.meta` holds its [`TrashRecord`]. This type is the only code
//! that knows about the pair. A record is written as `<id>.meta.tmp` before
//! the item moves and promoted by rename afterwards, so a finished record
//! always has its item; [`TrashStore::recover`] settles whatever a crash
//! left half done.

use log::{debug, info, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::TrashError;
use crate::trash::record::TrashRecord;
use crate::trash::{PENDING_SUFFIX, RECORD_SUFFIX, TRASH_DIR_NAME, is_record_name};

/// What a recovery pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub promoted: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone)]
pub struct TrashStore {
    dir: PathBuf,
}

impl TrashStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(TRASH_DIR_NAME),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", id, RECORD_SUFFIX))
    }

    fn pending_record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", id, RECORD_SUFFIX, PENDING_SUFFIX))
    }

    pub fn contains(&self, id: &str) -> bool {
        fs::symlink_metadata(self.entry_path(id)).is_ok()
    }

    pub fn has_record(&self, id: &str) -> bool {
        self.record_path(id).is_file()
    }

    /// Moves `source` into the trash as `id` together with `record`.
    pub fn put(&self, id: &str, source: &Path, record: &TrashRecord) -> Result<PathBuf, TrashError> {
        fs::create_dir_all(&self.dir)?;

        let pending = self.pending_record_path(id);
        if let Err(e) = write_record(&pending, record) {
            let _ = fs::remove_file(&pending);
            return Err(e);
        }

        let entry = self.entry_path(id);
        if let Err(e) = fs::rename(source, &entry) {
            let _ = fs::remove_file(&pending);
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&pending, self.record_path(id)) {
            if fs::rename(&entry, source).is_ok() {
                let _ = fs::remove_file(&pending);
                return Err(e.into());
            }
            warn!(
                "Trashed {} but its record is still pending ({}); recovery will promote it",
                id, e
            );
        }
        Ok(entry)
    }

    pub fn read(&self, id: &str) -> Result<TrashRecord, TrashError> {
        let bytes = match fs::read(self.record_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TrashError::RecordNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| TrashError::RecordMalformed(id.to_string(), e))
    }

    /// Record stored beside an arbitrary entry inside the trash, if readable.
    pub fn record_beside(entry: &Path) -> Option<TrashRecord> {
        let mut record_path = entry.as_os_str().to_owned();
        record_path.push(RECORD_SUFFIX);
        let bytes = fs::read(PathBuf::from(record_path)).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Ignoring unreadable trash record for {}: {}", entry.display(), e);
                None
            }
        }
    }

    /// Moves the item out to `destination` and drops its record.
    pub fn take(&self, id: &str, destination: &Path) -> Result<(), TrashError> {
        fs::rename(self.entry_path(id), destination)?;
        if let Err(e) = remove_if_present(&self.record_path(id)) {
            warn!("Restored {} but could not remove its record: {}", id, e);
        }
        Ok(())
    }

    /// Deletes the item and its record.
    pub fn purge(&self, id: &str) -> Result<(), TrashError> {
        let entry = self.entry_path(id);
        let metadata = match fs::symlink_metadata(&entry) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TrashError::EntryNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(&entry)?;
        } else {
            fs::remove_file(&entry)?;
        }
        remove_if_present(&self.record_path(id))?;
        remove_if_present(&self.pending_record_path(id))?;
        Ok(())
    }

    /// Ids of trashed items in name order.
    pub fn ids(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| !is_record_name(name))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Removes every entry under the trash, records included; returns how
    /// many entries went.
    pub fn clear(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let result = match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => fs::remove_dir_all(&path),
                Ok(_) => fs::remove_file(&path),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove trash entry {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }

    /// Settles records left behind by an interrupted delete or restore.
    pub fn recover(&self) -> io::Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e),
        };

        // Collected up front; the loop renames and removes entries.
        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();

        let pending_suffix = format!("{}{}", RECORD_SUFFIX, PENDING_SUFFIX);
        for name in names {
            let path = self.dir.join(&name);
            if let Some(id) = name.strip_suffix(&pending_suffix) {
                if self.contains(id) && !self.has_record(id) {
                    fs::rename(&path, self.record_path(id))?;
                    report.promoted += 1;
                } else {
                    fs::remove_file(&path)?;
                    report.discarded += 1;
                }
            } else if let Some(id) = name.strip_suffix(RECORD_SUFFIX) {
                if !self.contains(id) {
                    fs::remove_file(&path)?;
                    report.discarded += 1;
                }
            }
        }

        if report != RecoveryReport::default() {
            info!(
                "Trash recovery: promoted {} record(s), discarded {}",
                report.promoted, report.discarded
            );
        }
        Ok(report)
    }
}

fn write_record(path: &Path, record: &TrashRecord) -> Result<(), TrashError> {
    let json = serde_json::to_vec(record)
        .map_err(|e| TrashError::IoError(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    let mut file = fs::File::create(path)?;
    file.write_all(&json)?;
    file.sync_all()?;
    Ok(())
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recover_promotes_pending_record_when_item_moved() {
        let root = tempdir().unwrap();
        let store = TrashStore::new(root.path());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.entry_path("abc"), b"data").unwrap();
        write_record(
            &store.pending_record_path("abc"),
            &TrashRecord::new("a.txt", "a.txt", false),
        )
        .unwrap();

        let report = store.recover().unwrap();
        assert_eq!(report.promoted, 1);
        assert!(store.has_record("abc"));
        assert_eq!(store.read("abc").unwrap().original_path, "a.txt");
    }

    #[test]
    fn recover_discards_records_without_items() {
        let root = tempdir().unwrap();
        let store = TrashStore::new(root.path());
        fs::create_dir_all(store.dir()).unwrap();
        write_record(&store.record_path("gone"), &TrashRecord::new("x", "x", false)).unwrap();
        write_record(
            &store.pending_record_path("never"),
            &TrashRecord::new("y", "y", false),
        )
        .unwrap();

        let report = store.recover().unwrap();
        assert_eq!(report.discarded, 2);
        assert!(store.ids().unwrap().is_empty());
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 0);
    }

    #[test]
    fn failed_record_promotion_puts_item_back() {
        let root = tempdir().unwrap();
        let store = TrashStore::new(root.path());
        let source = root.path().join("a.txt");
        fs::write(&source, b"data").unwrap();
        // A non-empty directory where the record should go blocks the rename.
        fs::create_dir_all(store.record_path("id1").join("occupied")).unwrap();

        let result = store.put("id1", &source, &TrashRecord::new("a.txt", "a.txt", false));
        assert!(result.is_err());
        assert_eq!(fs::read(&source).unwrap(), b"data");
        assert!(!store.contains("id1"));
        assert!(!store.pending_record_path("id1").exists());
    }

    #[test]
    fn failed_move_leaves_no_record() {
        let root = tempdir().unwrap();
        let store = TrashStore::new(root.path());
        let missing = root.path().join("missing.txt");

        let result = store.put("id1", &missing, &TrashRecord::new("missing.txt", "missing.txt", false));
        assert!(result.is_err());
        assert!(!store.has_record("id1"));
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 0);
    }
}
