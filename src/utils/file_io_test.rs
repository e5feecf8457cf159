use crate::file_io::create_parent_dir_if_not_exist;
use crate::file_io::modified_millis;
use crate::file_io::read_if_exists;
use crate::file_io::remove_if_exists;
use crate::file_io::write_atomically;
use crate::test_utils::enable_logger;

/// Passed: "/tmp/files/data.txt"
/// Expected: "/tmp/files" created
#[test]
fn test_create_parent_dir_for_file() {
    enable_logger();
    let temp_dir = tempfile::tempdir().unwrap();
    let file_path = temp_dir.path().join("files").join("data.txt");

    create_parent_dir_if_not_exist(&file_path).unwrap();

    assert!(file_path.parent().unwrap().is_dir());
    assert!(!file_path.exists());
}

#[test]
fn test_read_if_exists_returns_none_for_missing_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let r = read_if_exists(&temp_dir.path().join("missing")).unwrap();
    assert!(r.is_none());
}

#[test]
fn test_write_atomically_creates_dirs_and_replaces_content() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("a").join("b").join("dataId");

    write_atomically(&path, "a=1").unwrap();
    assert_eq!(read_if_exists(&path).unwrap().as_deref(), Some("a=1"));

    write_atomically(&path, "a=2").unwrap();
    assert_eq!(read_if_exists(&path).unwrap().as_deref(), Some("a=2"));

    // no temp file left behind
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
    assert_eq!(leftovers.len(), 1);
}

#[test]
fn test_remove_if_exists_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("f");
    write_atomically(&path, "x").unwrap();

    remove_if_exists(&path).unwrap();
    assert!(!path.exists());
    remove_if_exists(&path).unwrap();
}

#[test]
fn test_modified_millis() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("f");
    assert_eq!(modified_millis(&path).unwrap(), None);
    // directories are not config files
    assert_eq!(modified_millis(temp_dir.path()).unwrap(), None);

    write_atomically(&path, "x").unwrap();
    assert!(modified_millis(&path).unwrap().unwrap() > 0);
}
