//! Trash records
//!
//! Provenance persisted next to every trashed item.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrashRecord {
    /// Logical path at the moment of deletion.
    pub original_path: String,
    pub original_name: String,
    pub is_dir: bool,
    /// Local time, ISO-8601 without offset.
    pub deleted_at: NaiveDateTime,
}

impl TrashRecord {
    pub fn new(original_path: &str, original_name: &str, is_dir: bool) -> Self {
        Self {
            original_path: original_path.to_string(),
            original_name: original_name.to_string(),
            is_dir,
            deleted_at: Local::now().naive_local(),
        }
    }
}
