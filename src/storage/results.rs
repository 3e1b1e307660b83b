//! Storage result types
//!
//! Defines result structures returned by storage operations.

use std::path::PathBuf;

use crate::storage::descriptor::MediaType;

/// A confined regular file ready to be streamed to the client
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    pub file_path: PathBuf,
    pub filename: String,
    pub size: u64,
}

/// Content produced by a preview request
#[derive(Debug, Clone)]
pub enum Preview {
    /// Stream the file as-is with the given content type
    Binary {
        file_path: PathBuf,
        size: u64,
        media_type: MediaType,
        content_type: String,
    },
    /// Decoded text content
    Text { filename: String, content: String },
}
