//! Failure-path tests: everything in the reported-failure tier

use scene_depot::depot::{Depot, DepotConfig};
use scene_depot::error::DepotError;
use scene_depot::types::SceneDocument;
use std::fs;
use tempfile::TempDir;

fn open_depot() -> (TempDir, Depot) {
    let tmp = TempDir::new().unwrap();
    let depot = Depot::open(DepotConfig {
        data_dir: tmp.path().to_path_buf(),
        max_upload_bytes: 64,
        ..DepotConfig::default()
    })
    .unwrap();
    (tmp, depot)
}

fn uploads_root_is_empty(tmp: &TempDir) -> bool {
    fs::read_dir(tmp.path().join("uploads")).unwrap().next().is_none()
}

#[test]
fn test_disallowed_extension_rejected_before_side_effects() {
    let (tmp, depot) = open_depot();
    let err = depot.accept_upload("sess", "payload.exe", b"MZ").unwrap_err();
    assert!(matches!(err, DepotError::UnsupportedExtension(_)));
    // no batch directory was created
    assert!(uploads_root_is_empty(&tmp));
    // and no batch was claimed either: the next valid upload mints its own
    let receipt = depot.accept_upload("sess", "a.obj", b"o a\n").unwrap();
    assert!(!receipt.batch.is_empty());
}

#[test]
fn test_extensionless_file_rejected() {
    let (tmp, depot) = open_depot();
    let err = depot.accept_upload("sess", "README", b"hello").unwrap_err();
    assert!(matches!(err, DepotError::UnsupportedExtension(_)));
    assert!(uploads_root_is_empty(&tmp));
}

#[test]
fn test_oversized_upload_rejected() {
    let (tmp, depot) = open_depot();
    let big = vec![0u8; 65];
    let err = depot.accept_upload("sess", "a.obj", &big).unwrap_err();
    assert!(matches!(err, DepotError::UploadTooLarge { size: 65, limit: 64 }));
    assert!(uploads_root_is_empty(&tmp));
}

#[test]
fn test_empty_filename_rejected() {
    let (_tmp, depot) = open_depot();
    assert!(matches!(
        depot.accept_upload("sess", "", b"x"),
        Err(DepotError::InvalidFilename(_))
    ));
}

#[test]
fn test_load_missing_scene_is_not_found() {
    let (_tmp, depot) = open_depot();
    assert!(matches!(
        depot.load_scene("ghost.json"),
        Err(DepotError::SceneNotFound(_))
    ));
}

#[test]
fn test_delete_missing_original_image_is_not_found() {
    let (_tmp, depot) = open_depot();
    let err = depot.delete_original_image("scene-x", 0).unwrap_err();
    assert!(matches!(err, DepotError::ImageNotFound { model_index: 0, .. }));
}

#[test]
fn test_migrate_missing_original_image_is_not_found() {
    let (_tmp, depot) = open_depot();
    assert!(matches!(
        depot.migrate_original_image("a", "b", 3),
        Err(DepotError::ImageNotFound { model_index: 3, .. })
    ));
}

#[test]
fn test_save_original_image_rejects_non_image() {
    let (_tmp, depot) = open_depot();
    assert!(matches!(
        depot.save_original_image("scene-x", 0, "notes.txt", b"text"),
        Err(DepotError::UnsupportedExtension(_))
    ));
}

#[test]
fn test_save_original_image_replaces_previous_for_pair() {
    let (_tmp, depot) = open_depot();
    depot.save_original_image("scene-x", 0, "first.png", b"one").unwrap();
    let second = depot.save_original_image("scene-x", 0, "second.jpg", b"two").unwrap();

    assert_eq!(second, "scene-x_model_0_second.jpg");
    assert!(!depot.store().image_exists("scene-x_model_0_first.png"));
    assert_eq!(depot.store().read_image(&second).unwrap(), b"two");
    // a different model index is untouched by the replacement rule
    depot.save_original_image("scene-x", 1, "other.png", b"three").unwrap();
    assert!(depot.store().image_exists("scene-x_model_0_second.jpg"));
}

#[test]
fn test_rename_rejects_empty_target() {
    let (_tmp, depot) = open_depot();
    depot.store().write_scene("A.json", &SceneDocument::default()).unwrap();
    assert!(matches!(
        depot.rename_scene("A.json", "   "),
        Err(DepotError::InvalidRequest(_))
    ));
    assert!(depot.store().scene_exists("A.json"));
}

#[test]
fn test_traversal_names_rejected() {
    let (_tmp, depot) = open_depot();
    assert!(depot.load_scene("../outside.json").is_err());
    assert!(matches!(
        depot.rename_scene("A.json", "../escape"),
        Err(DepotError::InvalidFilename(_))
    ));
}
