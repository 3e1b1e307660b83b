//! Error types
//!
//! Defines domain-specific error types for each module of the drive server.

use std::fmt;
use std::io;

/// Coarse classification shared by every error the drive can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidPath,
    NotFound,
    Conflict,
    BadRequest,
    IoFailure,
}

/// Path confinement errors
#[derive(Debug)]
pub enum PathError {
    /// The path resolves outside the managed root.
    Escapes(String),
    /// The path names something the caller may not touch (root itself, the trash).
    Reserved(String),
    /// A symlink chain could not be resolved.
    SymlinkLoop(String),
    /// The root directory itself could not be resolved.
    RootUnavailable(io::Error),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Escapes(p) => write!(f, "Invalid path: {}", p),
            PathError::Reserved(p) => write!(f, "Reserved path: {}", p),
            PathError::SymlinkLoop(p) => write!(f, "Too many symlink levels: {}", p),
            PathError::RootUnavailable(e) => write!(f, "Root directory unavailable: {}", e),
        }
    }
}

impl std::error::Error for PathError {}

/// Storage module errors
#[derive(Debug)]
pub enum StorageError {
    NotFound(String),
    AlreadyExists(String),
    MoveIntoSelf(String),
    EmptyField(&'static str),
    InvalidName(String),
    DisallowedType(String),
    NotAFile(String),
    UnsupportedPreview(String),
    Undecodable(String),
    Path(PathError),
    IoError(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(p) => write!(f, "File or folder not found: {}", p),
            StorageError::AlreadyExists(p) => write!(f, "Already exists: {}", p),
            StorageError::MoveIntoSelf(p) => {
                write!(f, "Cannot move a folder into itself or its subfolder: {}", p)
            }
            StorageError::EmptyField(field) => write!(f, "Field '{}' must not be empty", field),
            StorageError::InvalidName(n) => write!(f, "Invalid name: {}", n),
            StorageError::DisallowedType(n) => write!(f, "File type not allowed: {}", n),
            StorageError::NotAFile(p) => write!(f, "Not a file: {}", p),
            StorageError::UnsupportedPreview(p) => {
                write!(f, "Preview not supported for this file type: {}", p)
            }
            StorageError::Undecodable(p) => {
                write!(f, "Cannot read file content (possibly binary): {}", p)
            }
            StorageError::Path(e) => write!(f, "{}", e),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

impl From<PathError> for StorageError {
    fn from(error: PathError) -> Self {
        StorageError::Path(error)
    }
}

/// Trash module errors
#[derive(Debug)]
pub enum TrashError {
    EntryNotFound(String),
    RecordNotFound(String),
    RecordMalformed(String, serde_json::Error),
    MissingOriginalPath(String),
    RestoreConflict(String),
    Storage(StorageError),
    IoError(io::Error),
}

impl fmt::Display for TrashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrashError::EntryNotFound(id) => write!(f, "Trash entry not found: {}", id),
            TrashError::RecordNotFound(id) => write!(f, "Trash record not found: {}", id),
            TrashError::RecordMalformed(id, e) => {
                write!(f, "Trash record {} is malformed: {}", id, e)
            }
            TrashError::MissingOriginalPath(id) => {
                write!(f, "Trash record {} has no original path", id)
            }
            TrashError::RestoreConflict(p) => {
                write!(f, "Something already exists at the original location: {}", p)
            }
            TrashError::Storage(e) => write!(f, "{}", e),
            TrashError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for TrashError {}

impl From<io::Error> for TrashError {
    fn from(error: io::Error) -> Self {
        TrashError::IoError(error)
    }
}

impl From<StorageError> for TrashError {
    fn from(error: StorageError) -> Self {
        TrashError::Storage(error)
    }
}

impl From<PathError> for TrashError {
    fn from(error: PathError) -> Self {
        TrashError::Storage(StorageError::Path(error))
    }
}

/// HTTP protocol errors
#[derive(Debug)]
pub enum ProtocolError {
    MalformedRequest(String),
    HeaderTooLarge,
    PayloadTooLarge(u64),
    InvalidJson(serde_json::Error),
    MissingField(&'static str),
    ConnectionClosed,
    IoError(io::Error),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MalformedRequest(msg) => write!(f, "Malformed request: {}", msg),
            ProtocolError::HeaderTooLarge => write!(f, "Request header too large"),
            ProtocolError::PayloadTooLarge(limit) => {
                write!(f, "File too large (max {})", limit_label(*limit))
            }
            ProtocolError::InvalidJson(e) => write!(f, "Invalid JSON body: {}", e),
            ProtocolError::MissingField(field) => write!(f, "Missing field: {}", field),
            ProtocolError::ConnectionClosed => write!(f, "Connection closed before request"),
            ProtocolError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
    fn from(error: io::Error) -> Self {
        ProtocolError::IoError(error)
    }
}

/// Renders an upload limit the way users read it: whole gigabytes when the
/// limit reaches one, megabytes otherwise.
fn limit_label(limit_bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * MB;
    if limit_bytes >= GB {
        format!("{}GB", limit_bytes / GB)
    } else {
        format!("{}MB", limit_bytes / MB)
    }
}

/// General drive error that encompasses all error types
#[derive(Debug)]
pub enum DriveError {
    Path(PathError),
    Storage(StorageError),
    Trash(TrashError),
    Protocol(ProtocolError),
    IoError(io::Error),
}

impl DriveError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriveError::Path(e) => path_kind(e),
            DriveError::Storage(e) => storage_kind(e),
            DriveError::Trash(e) => match e {
                TrashError::EntryNotFound(_) | TrashError::RecordNotFound(_) => {
                    ErrorKind::NotFound
                }
                TrashError::RestoreConflict(_) => ErrorKind::Conflict,
                TrashError::MissingOriginalPath(_) => ErrorKind::BadRequest,
                TrashError::RecordMalformed(..) | TrashError::IoError(_) => ErrorKind::IoFailure,
                TrashError::Storage(inner) => storage_kind(inner),
            },
            DriveError::Protocol(e) => match e {
                ProtocolError::IoError(_) => ErrorKind::IoFailure,
                _ => ErrorKind::BadRequest,
            },
            DriveError::IoError(_) => ErrorKind::IoFailure,
        }
    }
}

fn path_kind(error: &PathError) -> ErrorKind {
    match error {
        PathError::RootUnavailable(_) => ErrorKind::IoFailure,
        _ => ErrorKind::InvalidPath,
    }
}

fn storage_kind(error: &StorageError) -> ErrorKind {
    match error {
        StorageError::NotFound(_) => ErrorKind::NotFound,
        StorageError::AlreadyExists(_) | StorageError::MoveIntoSelf(_) => ErrorKind::Conflict,
        StorageError::EmptyField(_)
        | StorageError::InvalidName(_)
        | StorageError::DisallowedType(_)
        | StorageError::NotAFile(_)
        | StorageError::UnsupportedPreview(_)
        | StorageError::Undecodable(_) => ErrorKind::BadRequest,
        StorageError::Path(e) => path_kind(e),
        StorageError::IoError(_) => ErrorKind::IoFailure,
    }
}

impl fmt::Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveError::Path(e) => write!(f, "{}", e),
            DriveError::Storage(e) => write!(f, "{}", e),
            DriveError::Trash(e) => write!(f, "{}", e),
            DriveError::Protocol(e) => write!(f, "{}", e),
            DriveError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for DriveError {}

impl From<PathError> for DriveError {
    fn from(error: PathError) -> Self {
        DriveError::Path(error)
    }
}

impl From<StorageError> for DriveError {
    fn from(error: StorageError) -> Self {
        DriveError::Storage(error)
    }
}

impl From<TrashError> for DriveError {
    fn from(error: TrashError) -> Self {
        DriveError::Trash(error)
    }
}

impl From<ProtocolError> for DriveError {
    fn from(error: ProtocolError) -> Self {
        DriveError::Protocol(error)
    }
}

impl From<io::Error> for DriveError {
    fn from(error: io::Error) -> Self {
        DriveError::IoError(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_conflict_is_a_conflict() {
        let err = DriveError::from(TrashError::RestoreConflict("x.txt".into()));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn confinement_failure_inside_storage_is_invalid_path() {
        let err = DriveError::from(StorageError::Path(PathError::Escapes("../x".into())));
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
    }

    #[test]
    fn payload_limit_is_labelled_in_whole_units() {
        assert_eq!(
            ProtocolError::PayloadTooLarge(1024 * 1024 * 1024).to_string(),
            "File too large (max 1GB)"
        );
        assert_eq!(
            ProtocolError::PayloadTooLarge(500 * 1024 * 1024).to_string(),
            "File too large (max 500MB)"
        );
    }
}
