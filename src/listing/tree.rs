//! Tree listing

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::confinement::join_logical;
use crate::storage::descriptor::{Descriptor, WalkReport, describe};
use crate::trash::{TRASH_DIR_NAME, TrashStore, is_record_name};

/// Case-insensitive name order, ties broken by the exact name.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Entries of `directory` in display order, trash record files left out.
///
/// An unreadable directory yields no entries and is noted in `report`.
pub(crate) fn sorted_entries(directory: &Path, report: &mut WalkReport) -> Vec<(String, PathBuf)> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            report.note_unreadable(directory, &e);
            return Vec::new();
        }
    };

    let mut named: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => {
                let name = entry.file_name().to_string_lossy().to_string();
                if !is_record_name(&name) {
                    named.push((name, entry.path()));
                }
            }
            Err(e) => report.note_skipped(directory, &e),
        }
    }
    named.sort_by(|a, b| compare_names(&a.0, &b.0));
    named
}

/// Recursive listing of `directory`, whose logical path is `base_path`.
///
/// Entries directly addressed by a trash record are shown under their
/// original name together with their provenance.
pub fn build_tree(directory: &Path, base_path: &str, report: &mut WalkReport) -> Vec<Descriptor> {
    let trash_root = base_path == TRASH_DIR_NAME;
    let mut items = Vec::new();

    for (name, path) in sorted_entries(directory, report) {
        let logical = join_logical(base_path, &name);
        let mut item = match describe(&path, &logical, report) {
            Ok(item) => item,
            Err(e) => {
                report.note_skipped(&path, &e);
                continue;
            }
        };

        if trash_root {
            if let Some(record) = TrashStore::record_beside(&path) {
                item.mark_trashed(&record, &name);
            }
        }

        if item.is_dir {
            item.children = Some(build_tree(&path, &logical, report));
        }
        items.push(item);
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_names_ignores_case() {
        let mut names = vec!["beta", "Alpha", "alpha", "Gamma"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["Alpha", "alpha", "beta", "Gamma"]);
    }
}
