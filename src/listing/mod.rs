//! Listing and search
//!
//! Best-effort recursive walks over the root. Unreadable directories and
//! entries are skipped and tallied in a [`WalkReport`](crate::storage::WalkReport).

pub mod search;
pub mod tree;

pub use search::search;
pub use tree::{build_tree, compare_names};
