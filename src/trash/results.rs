//! Trash result types

use serde::Serialize;

use crate::storage::descriptor::Descriptor;

/// Result of a soft delete
#[derive(Debug, Clone)]
pub struct DeleteResult {
    pub undo_id: String,
    /// The item as it was just before deletion
    pub item: Descriptor,
}

/// Result of restoring the whole trash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreAllResult {
    pub restored_count: usize,
    pub failed_count: usize,
}
