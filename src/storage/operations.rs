//! Storage operations
//!
//! Create, rename, move, upload, download and preview. Every operation
//! confines its paths before touching the filesystem and never overwrites
//! an existing entry.

use chrono::Local;
use log::{info, warn};
use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage::confinement::{PathGuard, join_logical};
use crate::storage::descriptor::{
    Descriptor, MediaType, WalkReport, describe, describe_file, describe_folder, extension_of,
};
use crate::storage::results::{DownloadTarget, Preview};
use crate::storage::validation::{allowed_file, safe_filename, validate_name};

/// True if anything, including a dangling symlink, occupies `path`.
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Creates a folder named `name` inside `parent`.
pub fn create_folder(guard: &PathGuard, parent: &str, name: &str) -> Result<Descriptor, StorageError> {
    let name = validate_name(name, "name")?;
    let target = guard.join_item(&join_logical(parent.trim(), &name))?;

    if path_exists(target.absolute()) {
        return Err(StorageError::AlreadyExists(target.logical().to_string()));
    }

    fs::create_dir_all(target.absolute())?;
    info!("Created folder {}", target.logical());

    Ok(describe_folder(
        target.absolute(),
        target.logical(),
        &mut WalkReport::new(),
    )?)
}

/// Creates an empty file named `name` inside `parent`, creating `parent` if needed.
pub fn create_file(guard: &PathGuard, parent: &str, name: &str) -> Result<Descriptor, StorageError> {
    let name = validate_name(name, "name")?;
    let target = guard.join_item(&join_logical(parent.trim(), &name))?;

    if path_exists(target.absolute()) {
        return Err(StorageError::AlreadyExists(target.logical().to_string()));
    }

    if let Some(parent_dir) = target.absolute().parent() {
        fs::create_dir_all(parent_dir)?;
    }
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target.absolute())?;
    info!("Created file {}", target.logical());

    Ok(describe_file(target.absolute(), target.logical())?)
}

/// Renames an item in place.
pub fn rename_item(guard: &PathGuard, path: &str, new_name: &str) -> Result<Descriptor, StorageError> {
    if path.trim().is_empty() {
        return Err(StorageError::EmptyField("path"));
    }
    let new_name = validate_name(new_name, "new_name")?;

    let source = guard.join_item(path)?;
    if !path_exists(source.absolute()) {
        return Err(StorageError::NotFound(source.logical().to_string()));
    }

    let destination = guard.join_item(&join_logical(source.parent_logical(), &new_name))?;
    if path_exists(destination.absolute()) {
        return Err(StorageError::AlreadyExists(destination.logical().to_string()));
    }

    fs::rename(source.absolute(), destination.absolute())?;
    info!("Renamed {} -> {}", source.logical(), destination.logical());

    Ok(describe(
        destination.absolute(),
        destination.logical(),
        &mut WalkReport::new(),
    )?)
}

/// Moves an item into `target_folder` (empty means the root), keeping its name.
pub fn move_item(guard: &PathGuard, source: &str, target_folder: &str) -> Result<Descriptor, StorageError> {
    if source.trim().is_empty() {
        return Err(StorageError::EmptyField("source"));
    }

    let source = guard.join_item(source)?;
    if !path_exists(source.absolute()) {
        return Err(StorageError::NotFound(source.logical().to_string()));
    }

    let target = guard.join(target_folder)?;
    if is_same_or_inside(target.logical(), source.logical()) {
        return Err(StorageError::MoveIntoSelf(target.logical().to_string()));
    }

    let item_name = source
        .logical()
        .rsplit('/')
        .next()
        .unwrap_or(source.logical())
        .to_string();
    let destination = guard.join_item(&join_logical(target.logical(), &item_name))?;
    if path_exists(destination.absolute()) {
        return Err(StorageError::AlreadyExists(destination.logical().to_string()));
    }

    fs::create_dir_all(target.absolute())?;
    fs::rename(source.absolute(), destination.absolute())?;
    info!("Moved {} -> {}", source.logical(), destination.logical());

    Ok(describe(
        destination.absolute(),
        destination.logical(),
        &mut WalkReport::new(),
    )?)
}

/// Logical prefix check: is `path` equal to `ancestor` or below it?
pub fn is_same_or_inside(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == b'/')
}

/// Stores uploaded bytes as `filename` inside `folder`.
///
/// An existing name gets a timestamp suffix instead of being overwritten.
/// Data is written to a temporary sibling first and renamed into place.
pub fn store_upload(
    guard: &PathGuard,
    folder: &str,
    filename: &str,
    data: &[u8],
    allowed_extensions: &[String],
) -> Result<Descriptor, StorageError> {
    if filename.trim().is_empty() {
        return Err(StorageError::EmptyField("filename"));
    }
    if !allowed_file(filename, allowed_extensions) {
        return Err(StorageError::DisallowedType(filename.to_string()));
    }

    let name = safe_filename(filename.trim());
    let folder = folder.trim();
    let target_dir = if folder.is_empty() {
        guard.join("")?
    } else {
        guard.join_item(folder)?
    };
    fs::create_dir_all(target_dir.absolute())?;

    let mut target = guard.join_item(&join_logical(target_dir.logical(), &name))?;
    if path_exists(target.absolute()) {
        let stamped = timestamped_name(&name);
        target = guard.join_item(&join_logical(target_dir.logical(), &stamped))?;
        if path_exists(target.absolute()) {
            return Err(StorageError::AlreadyExists(target.logical().to_string()));
        }
    }

    let temp_path = upload_temp_path(target.absolute());
    if let Err(e) = write_file(&temp_path, data) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp_path, target.absolute()) {
        warn!("Failed to finalize upload {}: {}", target.logical(), e);
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    info!("Stored upload {} ({} bytes)", target.logical(), data.len());
    Ok(describe_file(target.absolute(), target.logical())?)
}

fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// `name_YYYYMMDD_HHMMSS.ext`
fn timestamped_name(name: &str) -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}_{}{}", &name[..idx], stamp, &name[idx..]),
        _ => format!("{}_{}", name, stamp),
    }
}

fn upload_temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4().simple()))
}

/// Resolves a regular file for download.
pub fn prepare_download(guard: &PathGuard, path: &str) -> Result<DownloadTarget, StorageError> {
    let (file_path, logical) = existing_file(guard, path)?;
    let metadata = fs::metadata(&file_path)?;
    let filename = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or(logical);

    Ok(DownloadTarget {
        file_path,
        filename,
        size: metadata.len(),
    })
}

/// Produces preview content for images, pdf, video, audio and text files.
pub fn prepare_preview(guard: &PathGuard, path: &str) -> Result<Preview, StorageError> {
    let (file_path, logical) = existing_file(guard, path)?;
    let ext = extension_of(&file_path);
    let media_type = MediaType::from_extension(&ext);

    match media_type {
        MediaType::Text => {
            let bytes = fs::read(&file_path)?;
            let content = decode_text(&bytes)
                .ok_or_else(|| StorageError::Undecodable(logical.clone()))?
                .into_owned();
            let filename = file_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or(logical);
            Ok(Preview::Text { filename, content })
        }
        MediaType::Other => Err(StorageError::UnsupportedPreview(logical)),
        media => {
            let size = fs::metadata(&file_path)?.len();
            Ok(Preview::Binary {
                file_path,
                size,
                media_type: media,
                content_type: content_type_for(media, &ext),
            })
        }
    }
}

fn existing_file(guard: &PathGuard, path: &str) -> Result<(PathBuf, String), StorageError> {
    if path.trim().is_empty() {
        return Err(StorageError::EmptyField("path"));
    }
    let confined = guard.join(path)?;
    if !confined.absolute().is_file() {
        let logical = confined.logical().to_string();
        return Err(if path_exists(confined.absolute()) {
            StorageError::NotAFile(logical)
        } else {
            StorageError::NotFound(logical)
        });
    }
    Ok((confined.absolute().to_path_buf(), confined.logical().to_string()))
}

/// UTF-8 first, then GBK.
pub fn decode_text(bytes: &[u8]) -> Option<Cow<'_, str>> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(Cow::Borrowed(text));
    }
    encoding_rs::GBK.decode_without_bom_handling_and_without_replacement(bytes)
}

fn content_type_for(media_type: MediaType, ext: &str) -> String {
    let subtype = ext.trim_start_matches('.');
    match (media_type, subtype) {
        (MediaType::Pdf, _) => "application/pdf".to_string(),
        (MediaType::Image, "jpg") => "image/jpeg".to_string(),
        (MediaType::Image, "svg") => "image/svg+xml".to_string(),
        (MediaType::Image, "ico") => "image/x-icon".to_string(),
        (MediaType::Audio, "mp3") => "audio/mpeg".to_string(),
        (MediaType::Video, "mov") => "video/quicktime".to_string(),
        (MediaType::Image, s) => format!("image/{}", s),
        (MediaType::Video, s) => format!("video/{}", s),
        (MediaType::Audio, s) => format!("audio/{}", s),
        _ => "application/octet-stream".to_string(),
    }
}

/// Bytes used below `root`, trash included.
pub fn total_size(root: &Path, report: &mut WalkReport) -> u64 {
    crate::storage::descriptor::folder_size(root, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_same_or_inside() {
        assert!(is_same_or_inside("a", "a"));
        assert!(is_same_or_inside("a/b", "a"));
        assert!(!is_same_or_inside("ab", "a"));
        assert!(!is_same_or_inside("", "a"));
    }

    #[test]
    fn test_timestamped_name_keeps_extension() {
        let stamped = timestamped_name("photo.png");
        assert!(stamped.starts_with("photo_"));
        assert!(stamped.ends_with(".png"));
        assert_eq!(stamped.len(), "photo_YYYYMMDD_HHMMSS.png".len());
    }

    #[test]
    fn test_decode_text_falls_back_to_gbk() {
        // "中文" in GBK
        let gbk = [0xD6, 0xD0, 0xCE, 0xC4];
        assert_eq!(decode_text(&gbk).as_deref(), Some("中文"));
        assert_eq!(decode_text("plain".as_bytes()).as_deref(), Some("plain"));
        assert!(decode_text(&[0xFF, 0xFF, 0xFF]).is_none());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(MediaType::Pdf, ".pdf"), "application/pdf");
        assert_eq!(content_type_for(MediaType::Image, ".png"), "image/png");
        assert_eq!(content_type_for(MediaType::Image, ".jpg"), "image/jpeg");
        assert_eq!(content_type_for(MediaType::Video, ".mp4"), "video/mp4");
    }
}
