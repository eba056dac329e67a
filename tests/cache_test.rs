use std::fs;

use ma_ninepatch_loader::engine::cache::{CacheStore, ResourceId};
use ma_ninepatch_loader::error::LoadError;

#[test]
fn test_resource_id_file_name() {
    let id = ResourceId::parse("http://x/assets/a.9.png").unwrap();
    assert_eq!(id.file_name(), "a.9.png");

    // Trailing separators are ignored.
    let id = ResourceId::parse("http://x/assets/bubble/").unwrap();
    assert_eq!(id.file_name(), "bubble");

    // No separator at all: the whole id is the name.
    let id = ResourceId::parse("frame.png").unwrap();
    assert_eq!(id.file_name(), "frame.png");
}

#[test]
fn test_resource_id_rejects_unusable_names() {
    assert!(ResourceId::parse("").is_none());
    assert!(ResourceId::parse("///").is_none());
    assert!(ResourceId::parse("http://x/..").is_none());
    assert!(ResourceId::parse("http://x/.").is_none());
}

#[test]
fn test_resource_id_rejects_temp_names() {
    assert!(ResourceId::parse("http://x/a.png.tmp").is_none());
    assert!(ResourceId::parse("a.tmp").is_none());
    // Only the suffix matters.
    assert!(ResourceId::parse("http://x/a.tmp.png").is_some());
}

#[test]
fn test_resolve_is_pure_and_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(&dir.path().join("nine-patch")).unwrap();
    let id = ResourceId::parse("http://x/a.9.png").unwrap();

    let path = cache.resolve(&id);
    assert_eq!(path, dir.path().join("nine-patch").join("a.9.png"));
    assert_eq!(cache.resolve(&id), path);
    assert!(!cache.exists(&path));

    let entry = cache.entry(&id);
    assert_eq!(entry.file_name, "a.9.png");
    assert_eq!(entry.path, path);
}

#[test]
fn test_new_creates_directory_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("nested").join("nine-patch");
    CacheStore::new(&cache_dir).unwrap();
    assert!(cache_dir.is_dir());
    CacheStore::new(&cache_dir).unwrap();
    assert!(cache_dir.is_dir());
}

#[test]
fn test_temp_path_appends_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path()).unwrap();
    let final_path = dir.path().join("a.9.png");
    assert_eq!(cache.temp_path(&final_path), dir.path().join("a.9.png.tmp"));
}

#[test]
fn test_publish_renames_temp_into_place() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path()).unwrap();
    let final_path = dir.path().join("a.png");
    let temp_path = cache.temp_path(&final_path);
    fs::write(&temp_path, b"payload").unwrap();

    cache.publish(Some(&temp_path), &temp_path, &final_path).unwrap();

    assert!(cache.exists(&final_path));
    assert!(!temp_path.exists());
    assert_eq!(fs::read(&final_path).unwrap(), b"payload");
}

#[test]
fn test_publish_falls_back_to_temp_path() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path()).unwrap();
    let final_path = dir.path().join("a.png");
    let temp_path = cache.temp_path(&final_path);
    fs::write(&temp_path, b"payload").unwrap();

    // The handle points nowhere; the path-derived temp file is used instead.
    let bogus = dir.path().join("missing-handle");
    cache.publish(Some(&bogus), &temp_path, &final_path).unwrap();
    assert_eq!(fs::read(&final_path).unwrap(), b"payload");

    // No handle at all behaves the same way.
    let other_final = dir.path().join("b.png");
    let other_temp = cache.temp_path(&other_final);
    fs::write(&other_temp, b"second").unwrap();
    cache.publish(None, &other_temp, &other_final).unwrap();
    assert_eq!(fs::read(&other_final).unwrap(), b"second");
}

#[test]
fn test_publish_replaces_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path()).unwrap();
    let final_path = dir.path().join("a.png");
    fs::write(&final_path, b"old").unwrap();
    let temp_path = cache.temp_path(&final_path);
    fs::write(&temp_path, b"new").unwrap();

    cache.publish(None, &temp_path, &final_path).unwrap();
    assert_eq!(fs::read(&final_path).unwrap(), b"new");
}

#[test]
fn test_publish_without_any_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path()).unwrap();
    let final_path = dir.path().join("a.png");
    let temp_path = cache.temp_path(&final_path);

    let err = cache.publish(None, &temp_path, &final_path).unwrap_err();
    assert!(matches!(err, LoadError::Publish { .. }));
    assert!(!cache.exists(&final_path));
}

#[test]
fn test_discard_removes_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path()).unwrap();
    let temp_path = dir.path().join("a.png.tmp");
    fs::write(&temp_path, b"partial").unwrap();

    assert!(cache.discard(&temp_path));
    assert!(!temp_path.exists());
    assert!(!cache.discard(&temp_path));
}
