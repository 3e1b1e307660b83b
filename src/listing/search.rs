//! Name search

use std::path::Path;

use crate::error::StorageError;
use crate::listing::tree::{compare_names, sorted_entries};
use crate::storage::confinement::join_logical;
use crate::storage::descriptor::{Descriptor, WalkReport, describe};
use crate::trash::{TRASH_DIR_NAME, TrashStore};

/// Finds every entry below `root` whose display name contains `query`,
/// ignoring case. Trashed entries match on their original name.
pub fn search(root: &Path, query: &str, report: &mut WalkReport) -> Result<Vec<Descriptor>, StorageError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(StorageError::EmptyField("q"));
    }

    let needle = query.to_lowercase();
    let mut results = Vec::new();
    search_in(root, "", &needle, &mut results, report);

    results.sort_by(|a, b| compare_names(&a.name, &b.name));
    Ok(results)
}

fn search_in(
    directory: &Path,
    base_path: &str,
    needle: &str,
    results: &mut Vec<Descriptor>,
    report: &mut WalkReport,
) {
    let trash_root = base_path == TRASH_DIR_NAME;

    for (name, path) in sorted_entries(directory, report) {
        let logical = join_logical(base_path, &name);
        let record = if trash_root {
            TrashStore::record_beside(&path)
        } else {
            None
        };
        let display_name = match &record {
            Some(record) if !record.original_name.is_empty() => record.original_name.as_str(),
            _ => name.as_str(),
        };

        if display_name.to_lowercase().contains(needle) {
            match describe(&path, &logical, report) {
                Ok(mut item) => {
                    if let Some(record) = &record {
                        item.mark_trashed(record, &name);
                    }
                    item.match_type = Some(item.kind());
                    results.push(item);
                }
                Err(e) => report.note_skipped(&path, &e),
            }
        }

        let is_dir = path
            .symlink_metadata()
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if is_dir {
            search_in(&path, &logical, needle, results, report);
        }
    }
}
