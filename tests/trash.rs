use std::fs;
use std::path::Path;
use tempfile::TempDir;

use rax_drive::error::{DriveError, ErrorKind, TrashError};
use rax_drive::trash::{TRASH_DIR_NAME, TrashManager, TrashRecord, TrashStore};
use rax_drive::storage::PathGuard;
use rax_drive::{Drive, ServerConfig};

fn open_drive() -> (TempDir, Drive) {
    let dir = TempDir::new().unwrap();
    let drive = Drive::open(&ServerConfig::with_root(dir.path())).unwrap();
    (dir, drive)
}

fn write(root: &Path, logical: &str, content: &str) {
    let path = root.join(logical);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_delete_then_restore_round_trip() {
    let (dir, drive) = open_drive();
    write(dir.path(), "docs/sub/报告.txt", "content");

    let deleted = drive.delete("docs/sub/报告.txt").unwrap();
    assert_eq!(deleted.item.name, "报告.txt");
    assert_eq!(deleted.item.path, "docs/sub/报告.txt");
    assert!(!dir.path().join("docs/sub/报告.txt").exists());
    assert!(dir.path().join(TRASH_DIR_NAME).join(&deleted.undo_id).exists());

    // Parents removed in the meantime are recreated.
    fs::remove_dir_all(dir.path().join("docs")).unwrap();

    let restored = drive.restore(&deleted.undo_id).unwrap();
    assert_eq!(restored.path, "docs/sub/报告.txt");
    assert_eq!(restored.name, deleted.item.name);
    assert_eq!(restored.size, deleted.item.size);
    assert_eq!(restored.is_dir, deleted.item.is_dir);
    assert_eq!(
        fs::read_to_string(dir.path().join("docs/sub/报告.txt")).unwrap(),
        "content"
    );

    let store = TrashStore::new(drive.root());
    assert!(!store.contains(&deleted.undo_id));
    assert!(!store.has_record(&deleted.undo_id));
}

#[test]
fn test_folder_delete_keeps_contents() {
    let (dir, drive) = open_drive();
    write(dir.path(), "photos/2024/a.jpg", "aaaa");
    write(dir.path(), "photos/b.jpg", "bb");

    let deleted = drive.delete("photos").unwrap();
    assert!(deleted.item.is_dir);
    assert_eq!(deleted.item.size, 6);

    let record = TrashStore::new(drive.root()).read(&deleted.undo_id).unwrap();
    assert!(record.is_dir);
    assert_eq!(record.original_name, "photos");

    drive.restore(&deleted.undo_id).unwrap();
    assert!(dir.path().join("photos/2024/a.jpg").is_file());
}

#[test]
fn test_same_name_deletes_get_distinct_ids() {
    let (dir, drive) = open_drive();
    write(dir.path(), "a.txt", "first");
    let first = drive.delete("a.txt").unwrap();
    write(dir.path(), "a.txt", "second");
    let second = drive.delete("a.txt").unwrap();

    assert_ne!(first.undo_id, second.undo_id);
    let ids = TrashStore::new(drive.root()).ids().unwrap();
    assert_eq!(ids.len(), 2);
}

#[test]
fn test_restore_never_overwrites() {
    let (dir, drive) = open_drive();
    write(dir.path(), "a.txt", "old");
    let deleted = drive.delete("a.txt").unwrap();
    write(dir.path(), "a.txt", "new");

    let err = drive.restore(&deleted.undo_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");

    // The trashed copy is untouched and still restorable later.
    assert!(TrashStore::new(drive.root()).contains(&deleted.undo_id));
}

#[test]
fn test_restore_all_counts_partial_failures() {
    let (dir, drive) = open_drive();
    write(dir.path(), "a.txt", "a");
    write(dir.path(), "b.txt", "b");
    let a = drive.delete("a.txt").unwrap();
    drive.delete("b.txt").unwrap();
    write(dir.path(), "a.txt", "replacement");

    let result = drive.restore_all().unwrap();
    assert_eq!(result.restored_count, 1);
    assert_eq!(result.failed_count, 1);
    assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "b");
    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "replacement"
    );

    // The conflicting copy stays in the trash with its record.
    let store = TrashStore::new(drive.root());
    assert_eq!(store.ids().unwrap(), vec![a.undo_id.clone()]);
    assert!(store.has_record(&a.undo_id));
    assert_eq!(
        fs::read_to_string(store.entry_path(&a.undo_id)).unwrap(),
        "a"
    );
}

#[test]
fn test_purge_then_restore_is_not_found() {
    let (dir, drive) = open_drive();
    write(dir.path(), "a.txt", "a");
    let deleted = drive.delete("a.txt").unwrap();

    drive.purge(&deleted.undo_id).unwrap();
    let err = drive.restore(&deleted.undo_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = drive.purge(&deleted.undo_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_record_file_is_not_an_undo_id() {
    let (dir, drive) = open_drive();
    write(dir.path(), "a.txt", "a");
    let deleted = drive.delete("a.txt").unwrap();
    let store = TrashStore::new(drive.root());

    for id in [
        format!("{}.meta", deleted.undo_id),
        format!("{}.meta.tmp", deleted.undo_id),
    ] {
        assert_eq!(drive.purge(&id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(drive.restore(&id).unwrap_err().kind(), ErrorKind::NotFound);
    }
    assert!(store.has_record(&deleted.undo_id));

    drive.restore(&deleted.undo_id).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "a");
}

#[test]
fn test_empty_trash_counts_every_entry() {
    let (dir, drive) = open_drive();
    write(dir.path(), "a.txt", "a");
    write(dir.path(), "docs/b.txt", "b");
    drive.delete("a.txt").unwrap();
    drive.delete("docs").unwrap();

    // Two items, each with its record.
    assert_eq!(drive.empty_trash().unwrap(), 4);
    assert!(TrashStore::new(drive.root()).ids().unwrap().is_empty());
    assert_eq!(fs::read_dir(dir.path().join(TRASH_DIR_NAME)).unwrap().count(), 0);
    assert_eq!(drive.empty_trash().unwrap(), 0);
}

#[test]
fn test_delete_missing_item_is_not_found() {
    let (_dir, drive) = open_drive();
    let err = drive.delete("nope.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_trash_folder_is_reserved() {
    let (dir, drive) = open_drive();
    write(dir.path(), "a.txt", "a");
    let deleted = drive.delete("a.txt").unwrap();

    for result in [
        drive.delete(TRASH_DIR_NAME).map(|_| ()),
        drive
            .delete(&format!("{}/{}", TRASH_DIR_NAME, deleted.undo_id))
            .map(|_| ()),
        drive.create_folder(TRASH_DIR_NAME, "x").map(|_| ()),
        drive.rename(&format!("{}/{}", TRASH_DIR_NAME, deleted.undo_id), "b.txt").map(|_| ()),
    ] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidPath);
    }
}

#[test]
fn test_traversal_in_delete_is_rejected() {
    let outer = TempDir::new().unwrap();
    let root = outer.path().join("root");
    fs::create_dir_all(&root).unwrap();
    fs::write(outer.path().join("keep.txt"), "keep").unwrap();
    let drive = Drive::open(&ServerConfig::with_root(&root)).unwrap();

    let err = drive.delete("../keep.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);
    assert!(outer.path().join("keep.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_delete_symlink_trashes_the_link_only() {
    use std::os::unix::fs::symlink;

    let (dir, drive) = open_drive();
    write(dir.path(), "docs/real.txt", "real");
    symlink(dir.path().join("docs/real.txt"), dir.path().join("link.txt")).unwrap();

    let deleted = drive.delete("link.txt").unwrap();
    assert_eq!(deleted.item.path, "link.txt");
    assert!(fs::symlink_metadata(dir.path().join("link.txt")).is_err());
    assert_eq!(
        fs::read_to_string(dir.path().join("docs/real.txt")).unwrap(),
        "real"
    );

    let record = TrashStore::new(drive.root()).read(&deleted.undo_id).unwrap();
    assert_eq!(record.original_path, "link.txt");

    drive.restore(&deleted.undo_id).unwrap();
    let meta = fs::symlink_metadata(dir.path().join("link.txt")).unwrap();
    assert!(meta.file_type().is_symlink());
    assert!(dir.path().join("docs/real.txt").is_file());
}

#[cfg(unix)]
#[test]
fn test_rename_and_move_act_on_the_link() {
    use std::os::unix::fs::symlink;

    let (dir, drive) = open_drive();
    write(dir.path(), "docs/real.txt", "real");
    fs::create_dir_all(dir.path().join("archive")).unwrap();
    symlink(dir.path().join("docs/real.txt"), dir.path().join("link.txt")).unwrap();

    let renamed = drive.rename("link.txt", "shortcut.txt").unwrap();
    assert_eq!(renamed.path, "shortcut.txt");
    let moved = drive.move_item("shortcut.txt", "archive").unwrap();
    assert_eq!(moved.path, "archive/shortcut.txt");

    let meta = fs::symlink_metadata(dir.path().join("archive/shortcut.txt")).unwrap();
    assert!(meta.file_type().is_symlink());
    assert!(dir.path().join("docs/real.txt").is_file());
}

#[test]
fn test_move_into_own_subfolder_is_rejected() {
    let (dir, drive) = open_drive();
    fs::create_dir_all(dir.path().join("a/b")).unwrap();

    for target in ["a", "a/b", "a/b/new"] {
        let err = drive.move_item("a", target).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict, "target {}", target);
    }
    assert!(dir.path().join("a/b").is_dir());
}

#[test]
fn test_restore_with_malformed_record_is_an_io_failure() {
    let (dir, drive) = open_drive();
    write(dir.path(), "a.txt", "a");
    let deleted = drive.delete("a.txt").unwrap();
    fs::write(
        dir.path()
            .join(TRASH_DIR_NAME)
            .join(format!("{}.meta", deleted.undo_id)),
        "{not json",
    )
    .unwrap();

    let err = drive.restore(&deleted.undo_id).unwrap_err();
    assert!(matches!(
        err,
        DriveError::Trash(TrashError::RecordMalformed(..))
    ));
}

#[test]
fn test_restore_all_skips_records_without_original_path() {
    let dir = TempDir::new().unwrap();
    let guard = PathGuard::new(dir.path()).unwrap();
    let manager = TrashManager::new(guard);
    let store = manager.store();

    fs::write(dir.path().join("orphan.txt"), "x").unwrap();
    store
        .put("orphan", &dir.path().join("orphan.txt"), &TrashRecord::default())
        .unwrap();

    let result = manager.restore_all().unwrap();
    assert_eq!(result.restored_count, 0);
    assert_eq!(result.failed_count, 0);
    assert!(store.contains("orphan"));
}

#[test]
fn test_recovery_settles_interrupted_deletes() {
    let dir = TempDir::new().unwrap();
    let trash = dir.path().join(TRASH_DIR_NAME);
    fs::create_dir_all(&trash).unwrap();

    // Item moved, record not yet promoted.
    fs::write(trash.join("moved"), "x").unwrap();
    fs::write(
        trash.join("moved.meta.tmp"),
        r#"{"original_path":"moved.txt","original_name":"moved.txt","is_dir":false,"deleted_at":"2024-05-01T10:00:00"}"#,
    )
    .unwrap();
    // Record written, move never happened.
    fs::write(trash.join("never.meta.tmp"), "{}").unwrap();
    // Item purged by hand, record left behind.
    fs::write(trash.join("gone.meta"), "{}").unwrap();

    let drive = Drive::open(&ServerConfig::with_root(dir.path())).unwrap();

    assert!(trash.join("moved.meta").is_file());
    assert!(!trash.join("never.meta.tmp").exists());
    assert!(!trash.join("gone.meta").exists());

    let restored = drive.restore("moved").unwrap();
    assert_eq!(restored.path, "moved.txt");
}
