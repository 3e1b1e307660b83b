//! Drive service
//!
//! Entry point for every file operation. Built once from the server
//! configuration; mutating operations take advisory locks on the logical
//! paths they touch before delegating to storage or trash.

use log::info;
use std::fs;
use std::path::Path;

use crate::error::DriveError;
use crate::listing;
use crate::server::config::ServerConfig;
use crate::storage::confinement::{PathGuard, join_logical};
use crate::storage::descriptor::{Descriptor, WalkReport};
use crate::storage::locks::PathLocks;
use crate::storage::operations;
use crate::storage::results::{DownloadTarget, Preview};
use crate::storage::validation::safe_filename;
use crate::trash::{DeleteResult, RestoreAllResult, TRASH_DIR_NAME, TrashManager};

#[derive(Debug)]
pub struct Drive {
    guard: PathGuard,
    trash: TrashManager,
    locks: PathLocks,
    allowed_extensions: Vec<String>,
}

impl Drive {
    /// Opens the drive at the configured root, creating it if needed and
    /// settling any half-finished trash operations.
    pub fn open(config: &ServerConfig) -> Result<Self, DriveError> {
        let root = config.server_root_path();
        fs::create_dir_all(&root)?;

        let guard = PathGuard::new(&root)?;
        let trash = TrashManager::new(guard.clone());
        trash.recover()?;

        info!("Drive root: {}", guard.root().display());
        Ok(Self {
            guard,
            trash,
            locks: PathLocks::new(),
            allowed_extensions: config.allowed_extensions.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    /// Full recursive listing of the root.
    pub fn tree(&self) -> (Vec<Descriptor>, WalkReport) {
        let mut report = WalkReport::new();
        let tree = listing::build_tree(self.guard.root(), "", &mut report);
        (tree, report)
    }

    pub fn search(&self, query: &str) -> Result<(Vec<Descriptor>, WalkReport), DriveError> {
        let mut report = WalkReport::new();
        let results = listing::search(self.guard.root(), query, &mut report)?;
        Ok((results, report))
    }

    /// Total bytes stored below the root.
    pub fn total_size(&self) -> u64 {
        operations::total_size(self.guard.root(), &mut WalkReport::new())
    }

    pub fn create_folder(&self, parent: &str, name: &str) -> Result<Descriptor, DriveError> {
        let _lock = self.locks.acquire([self.lock_key(parent)?]);
        Ok(operations::create_folder(&self.guard, parent, name)?)
    }

    pub fn create_file(&self, parent: &str, name: &str) -> Result<Descriptor, DriveError> {
        let _lock = self.locks.acquire([self.lock_key(parent)?]);
        Ok(operations::create_file(&self.guard, parent, name)?)
    }

    pub fn upload(&self, folder: &str, filename: &str, data: &[u8]) -> Result<Descriptor, DriveError> {
        let key = join_logical(&self.lock_key(folder)?, &safe_filename(filename.trim()));
        let _lock = self.locks.acquire([key]);
        Ok(operations::store_upload(
            &self.guard,
            folder,
            filename,
            data,
            &self.allowed_extensions,
        )?)
    }

    /// Renames within the same folder; the folder is locked.
    pub fn rename(&self, path: &str, new_name: &str) -> Result<Descriptor, DriveError> {
        let parent = match self.guard.join_item(path) {
            Ok(confined) => confined.parent_logical().to_string(),
            Err(_) => String::new(),
        };
        let _lock = self.locks.acquire([parent]);
        Ok(operations::rename_item(&self.guard, path, new_name)?)
    }

    pub fn move_item(&self, source: &str, target_folder: &str) -> Result<Descriptor, DriveError> {
        let _lock = self
            .locks
            .acquire([self.item_lock_key(source)?, self.lock_key(target_folder)?]);
        Ok(operations::move_item(&self.guard, source, target_folder)?)
    }

    pub fn delete(&self, path: &str) -> Result<DeleteResult, DriveError> {
        let _lock = self.locks.acquire([self.item_lock_key(path)?]);
        Ok(self.trash.soft_delete(path)?)
    }

    pub fn restore(&self, undo_id: &str) -> Result<Descriptor, DriveError> {
        let record = self.trash.peek(undo_id)?;
        let destination = if record.original_path.trim().is_empty() {
            String::new()
        } else {
            self.item_lock_key(&record.original_path)?
        };
        let _lock = self.locks.acquire([trash_key(undo_id), destination]);
        Ok(self.trash.restore(undo_id)?)
    }

    /// Locks the whole root: restored items may land anywhere.
    pub fn restore_all(&self) -> Result<RestoreAllResult, DriveError> {
        let _lock = self.locks.acquire([""]);
        Ok(self.trash.restore_all()?)
    }

    pub fn purge(&self, undo_id: &str) -> Result<(), DriveError> {
        let _lock = self.locks.acquire([trash_key(undo_id)]);
        Ok(self.trash.purge(undo_id)?)
    }

    pub fn empty_trash(&self) -> Result<usize, DriveError> {
        let _lock = self.locks.acquire([TRASH_DIR_NAME]);
        Ok(self.trash.empty()?)
    }

    pub fn download(&self, path: &str) -> Result<DownloadTarget, DriveError> {
        Ok(operations::prepare_download(&self.guard, path)?)
    }

    pub fn preview(&self, path: &str) -> Result<Preview, DriveError> {
        Ok(operations::prepare_preview(&self.guard, path)?)
    }

    /// Confined logical form of `path`, used as its lock key.
    fn lock_key(&self, path: &str) -> Result<String, DriveError> {
        Ok(self.guard.join(path)?.logical().to_string())
    }

    /// Key for an entry itself; a symlink locks the link, not its target.
    fn item_lock_key(&self, path: &str) -> Result<String, DriveError> {
        Ok(self.guard.join_item(path)?.logical().to_string())
    }
}

fn trash_key(undo_id: &str) -> String {
    join_logical(TRASH_DIR_NAME, undo_id.trim())
}
