//! Trash (soft delete and undo)
//!
//! Owns the `.trash` folder below the root. Nothing else writes there.

pub mod manager;
pub mod record;
pub mod results;
pub mod store;

pub use manager::TrashManager;
pub use record::TrashRecord;
pub use results::{DeleteResult, RestoreAllResult};
pub use store::{RecoveryReport, TrashStore};

/// Folder below the root holding trashed items.
pub const TRASH_DIR_NAME: &str = ".trash";

/// Suffix of the record file paired with each trashed item.
pub const RECORD_SUFFIX: &str = ".meta";

/// Suffix of a record written but not yet committed.
pub const PENDING_SUFFIX: &str = ".tmp";

/// Is `logical` the trash folder or something inside it?
pub fn is_trash_path(logical: &str) -> bool {
    logical == TRASH_DIR_NAME
        || logical
            .strip_prefix(TRASH_DIR_NAME)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Record files never show up as items.
pub fn is_record_name(name: &str) -> bool {
    name.ends_with(RECORD_SUFFIX) || name.ends_with(&format!("{}{}", RECORD_SUFFIX, PENDING_SUFFIX))
}
