//! Entity descriptors
//!
//! Uniform file/folder metadata returned by listing, search and every
//! mutating operation.

use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

use crate::trash::TrashRecord;

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg", ".ico",
];
const TEXT_EXTENSIONS: &[&str] = &[
    ".txt", ".md", ".json", ".xml", ".csv", ".log", ".py", ".js", ".html", ".css", ".java",
    ".cpp", ".c", ".h",
];
const PDF_EXTENSIONS: &[&str] = &[".pdf"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm"];
const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".flac", ".aac"];

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Preview classification of a file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Text,
    Pdf,
    Video,
    Audio,
    Other,
}

impl MediaType {
    /// Classifies a lowercased extension including its leading dot.
    pub fn from_extension(ext: &str) -> Self {
        if IMAGE_EXTENSIONS.contains(&ext) {
            MediaType::Image
        } else if TEXT_EXTENSIONS.contains(&ext) {
            MediaType::Text
        } else if PDF_EXTENSIONS.contains(&ext) {
            MediaType::Pdf
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            MediaType::Video
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            MediaType::Audio
        } else {
            MediaType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Text => "text",
            MediaType::Pdf => "pdf",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    File,
    Folder,
}

/// Provenance attached to entries living in the trash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrashInfo {
    pub original_name: String,
    pub original_path: String,
    pub undo_id: String,
    pub is_trash: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Descriptor {
    /// Display name; the original name for trashed entries.
    pub name: String,
    /// Logical path relative to the root.
    pub path: String,
    pub size: u64,
    pub size_human: String,
    pub modified: String,
    /// `None` for folders.
    #[serde(rename = "type", serialize_with = "serialize_entry_type")]
    pub media_type: Option<MediaType>,
    pub ext: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Descriptor>>,
    #[serde(flatten)]
    pub trash: Option<TrashInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_type: Option<EntityKind>,
}

fn serialize_entry_type<S>(media_type: &Option<MediaType>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match media_type {
        Some(media) => serializer.serialize_str(media.as_str()),
        None => serializer.serialize_str("folder"),
    }
}

impl Descriptor {
    pub fn kind(&self) -> EntityKind {
        if self.is_dir {
            EntityKind::Folder
        } else {
            EntityKind::File
        }
    }

    pub fn is_trash(&self) -> bool {
        self.trash.as_ref().is_some_and(|t| t.is_trash)
    }

    /// Shows a trash entry under the name it had before deletion.
    pub fn mark_trashed(&mut self, record: &TrashRecord, undo_id: &str) {
        let original_name = if record.original_name.is_empty() {
            self.name.clone()
        } else {
            record.original_name.clone()
        };
        self.name = original_name.clone();
        self.trash = Some(TrashInfo {
            original_name,
            original_path: record.original_path.clone(),
            undo_id: undo_id.to_string(),
            is_trash: true,
        });
    }
}

/// Tally of entries a best-effort walk could not read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WalkReport {
    unreadable_dirs: usize,
    skipped_entries: usize,
}

impl WalkReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories whose contents could not be listed.
    pub fn unreadable_dirs(&self) -> usize {
        self.unreadable_dirs
    }

    /// Individual entries that could not be stat'ed.
    pub fn skipped_entries(&self) -> usize {
        self.skipped_entries
    }

    pub fn is_clean(&self) -> bool {
        self.unreadable_dirs == 0 && self.skipped_entries == 0
    }

    pub(crate) fn note_unreadable(&mut self, path: &Path, err: &dyn fmt::Display) {
        warn!("Skipping unreadable directory {}: {}", path.display(), err);
        self.unreadable_dirs += 1;
    }

    pub(crate) fn note_skipped(&mut self, path: &Path, err: &dyn fmt::Display) {
        debug!("Skipping entry {}: {}", path.display(), err);
        self.skipped_entries += 1;
    }
}

/// Describes whatever lives at `abs_path`. Symlinks are described, not followed.
pub fn describe(abs_path: &Path, logical_path: &str, report: &mut WalkReport) -> io::Result<Descriptor> {
    let metadata = fs::symlink_metadata(abs_path)?;
    if metadata.is_dir() {
        describe_folder(abs_path, logical_path, report)
    } else {
        describe_file(abs_path, logical_path)
    }
}

pub fn describe_file(abs_path: &Path, logical_path: &str) -> io::Result<Descriptor> {
    let metadata = fs::symlink_metadata(abs_path)?;
    let name = entry_name(abs_path);
    let ext = extension_of(abs_path);
    let size = metadata.len();

    Ok(Descriptor {
        path: logical_or_name(logical_path, &name),
        name,
        size,
        size_human: format_size(size),
        modified: format_modified(&metadata),
        media_type: Some(MediaType::from_extension(&ext)),
        ext,
        is_dir: false,
        children: None,
        trash: None,
        match_type: None,
    })
}

pub fn describe_folder(
    abs_path: &Path,
    logical_path: &str,
    report: &mut WalkReport,
) -> io::Result<Descriptor> {
    let metadata = fs::symlink_metadata(abs_path)?;
    let name = entry_name(abs_path);
    let size = folder_size(abs_path, report);

    Ok(Descriptor {
        path: logical_or_name(logical_path, &name),
        name,
        size,
        size_human: format_size(size),
        modified: format_modified(&metadata),
        media_type: None,
        ext: String::new(),
        is_dir: true,
        children: None,
        trash: None,
        match_type: None,
    })
}

/// Sum of the sizes of every file below `path`. Directories count as zero;
/// unreadable entries are recorded in `report` and skipped.
pub fn folder_size(path: &Path, report: &mut WalkReport) -> u64 {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => match entry.metadata() {
                Ok(metadata) => total += metadata.len(),
                Err(e) => report.note_skipped(entry.path(), &e),
            },
            Ok(_) => {}
            Err(e) => {
                let failed = e.path().unwrap_or(path).to_path_buf();
                report.note_unreadable(&failed, &e);
            }
        }
    }
    total
}

/// Human readable size with two decimals, e.g. `1.50 KB`.
pub fn format_size(size: u64) -> String {
    let mut value = size as f64;
    for unit in SIZE_UNITS {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} PB", value)
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn logical_or_name(logical_path: &str, name: &str) -> String {
    if logical_path.is_empty() {
        name.to_string()
    } else {
        logical_path.to_string()
    }
}

/// Lowercased extension with its leading dot, or empty.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

fn format_modified(metadata: &fs::Metadata) -> String {
    match metadata.modified() {
        Ok(time) => DateTime::<Local>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => String::new(),
    }
}
