//! File system storage management
//!
//! Handles path confinement, entity descriptors, name validation and the
//! non-trash file operations.

pub mod confinement;
pub mod descriptor;
pub mod locks;
pub mod operations;
pub mod results;
pub mod validation;

pub use confinement::{ConfinedPath, PathGuard, join_logical};
pub use descriptor::{Descriptor, EntityKind, MediaType, TrashInfo, WalkReport, format_size};
pub use locks::PathLocks;
pub use results::{DownloadTarget, Preview};
