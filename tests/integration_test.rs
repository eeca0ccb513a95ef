//! End-to-end tests of the depot operations against a real temp filesystem

use chrono::{DateTime, Local, TimeZone};
use scene_depot::depot::{Depot, DepotConfig};
use scene_depot::types::{DeleteOutcome, ModelEntry, OriginalImageEntry, RenameOutcome, SceneDocument};
use std::fs;
use tempfile::TempDir;

fn open_depot() -> (TempDir, Depot) {
    let tmp = TempDir::new().unwrap();
    let depot = Depot::open(DepotConfig {
        data_dir: tmp.path().to_path_buf(),
        ..DepotConfig::default()
    })
    .unwrap();
    (tmp, depot)
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 8, 25, h, m, s).unwrap()
}

#[test]
fn test_batch_groups_files_until_image() {
    let (_tmp, depot) = open_depot();

    let obj = depot
        .accept_upload_at("sess", "chair.obj", b"o chair\n", at(10, 0, 0))
        .unwrap();
    let mtl = depot
        .accept_upload_at("sess", "chair.mtl", b"newmtl m\n", at(10, 0, 5))
        .unwrap();
    let tex = depot
        .accept_upload_at("sess", "chair.png", b"png", at(10, 0, 9))
        .unwrap();

    // all three share the batch minted by the first file
    assert_eq!(obj.batch, "20250825100000");
    assert_eq!(mtl.batch, obj.batch);
    assert_eq!(tex.batch, obj.batch);
    assert!(!obj.batch_complete);
    assert!(tex.batch_complete);

    // the image terminated the batch, so the next file starts a new one
    let next = depot
        .accept_upload_at("sess", "table.obj", b"o table\n", at(10, 1, 0))
        .unwrap();
    assert_eq!(next.batch, "20250825100100");
    assert_eq!(next.filepath, "/uploads/20250825100100/table.obj");
}

#[test]
fn test_batches_are_per_session() {
    let (_tmp, depot) = open_depot();
    let a = depot
        .accept_upload_at("alice", "a.obj", b"o a\n", at(10, 0, 0))
        .unwrap();
    let b = depot
        .accept_upload_at("bob", "b.obj", b"o b\n", at(10, 0, 1))
        .unwrap();
    assert_ne!(a.batch, b.batch);
}

#[test]
fn test_obj_upload_gains_default_material() {
    let (_tmp, depot) = open_depot();
    let receipt = depot
        .accept_upload_at("sess", "chair.obj", b"mtllib chair.mtl\nv 0 0 0\n", at(10, 0, 0))
        .unwrap();

    let path = depot.store().upload_path(&receipt.batch, "chair.obj").unwrap();
    let stored = fs::read_to_string(path).unwrap();
    assert_eq!(stored, "mtllib chair.mtl\nusemtl material_0\nv 0 0 0\n");
    assert_eq!(stored.matches("usemtl material_0").count(), 1);
}

#[test]
fn test_obj_with_material_stays_byte_identical() {
    let (_tmp, depot) = open_depot();
    let src = b"mtllib a.mtl\nusemtl material_0\nv 0 0 0\n";
    let receipt = depot
        .accept_upload_at("sess", "done.obj", src, at(10, 0, 0))
        .unwrap();
    let path = depot.store().upload_path(&receipt.batch, "done.obj").unwrap();
    assert_eq!(fs::read(path).unwrap(), src.to_vec());
}

#[test]
fn test_save_scene_adopts_staged_images() {
    let (_tmp, depot) = open_depot();

    // reference photo staged before the scene exists
    let staged = depot
        .save_original_image("temp_20250825095900", 0, "photo.png", b"photo-bytes")
        .unwrap();
    assert_eq!(staged, "temp_20250825095900_model_0_photo.png");

    let filename = depot
        .save_scene_at(SceneDocument::default(), at(10, 0, 0))
        .unwrap();
    assert_eq!(filename, "scene-25-08-25_10-00-00.json");

    let expected = "scene-25-08-25_10-00-00_model_0_photo.png";
    assert!(depot.store().image_exists(expected));
    assert!(!depot.store().image_exists(&staged));

    let doc = depot.load_scene(&filename).unwrap();
    assert_eq!(
        doc.original_images,
        vec![OriginalImageEntry {
            model_index: 0,
            filename: expected.to_string(),
        }]
    );
}

#[test]
fn test_rename_propagates_to_images() {
    let (_tmp, depot) = open_depot();
    let doc = SceneDocument {
        original_images: vec![OriginalImageEntry {
            model_index: 0,
            filename: "A_model_0_x.jpg".to_string(),
        }],
        ..SceneDocument::default()
    };
    depot.store().write_scene("A.json", &doc).unwrap();
    depot.store().write_image("A_model_0_x.jpg", b"jpg-bytes").unwrap();

    let outcome = depot.rename_scene("A.json", "B").unwrap();
    assert_eq!(
        outcome,
        RenameOutcome::Renamed {
            new_filename: "B.json".to_string()
        }
    );

    assert!(!depot.store().scene_exists("A.json"));
    let renamed = depot.load_scene("B.json").unwrap();
    assert_eq!(renamed.original_images[0].filename, "B_model_0_x.jpg");
    assert!(!depot.store().image_exists("A_model_0_x.jpg"));
    assert_eq!(depot.store().read_image("B_model_0_x.jpg").unwrap(), b"jpg-bytes");
}

#[test]
fn test_rename_to_existing_scene_leaves_both_untouched() {
    let (_tmp, depot) = open_depot();
    depot.store().write_scene("A.json", &SceneDocument::default()).unwrap();
    depot.store().write_scene("B.json", &SceneDocument::default()).unwrap();

    assert!(depot.rename_scene("A.json", "B.json").is_err());
    assert!(depot.store().scene_exists("A.json"));
    assert!(depot.store().scene_exists("B.json"));
}

#[test]
fn test_rename_missing_source_is_noop_success() {
    let (_tmp, depot) = open_depot();
    let outcome = depot.rename_scene("ghost.json", "new").unwrap();
    assert_eq!(
        outcome,
        RenameOutcome::SourceMissing {
            new_filename: "new.json".to_string()
        }
    );
    assert!(!depot.store().scene_exists("new.json"));
}

#[test]
fn test_rename_to_same_name_is_noop() {
    let (_tmp, depot) = open_depot();
    depot.store().write_scene("A.json", &SceneDocument::default()).unwrap();
    let outcome = depot.rename_scene("A.json", "A").unwrap();
    assert_eq!(
        outcome,
        RenameOutcome::Unchanged {
            new_filename: "A.json".to_string()
        }
    );
    assert!(depot.store().scene_exists("A.json"));
}

#[test]
fn test_delete_scene_always_succeeds() {
    let (_tmp, depot) = open_depot();
    depot.store().write_scene("A.json", &SceneDocument::default()).unwrap();

    assert_eq!(depot.delete_scene("A.json"), DeleteOutcome::Deleted);
    assert_eq!(depot.delete_scene("A.json"), DeleteOutcome::AlreadyAbsent);
    assert_eq!(depot.delete_scene("never-existed.json"), DeleteOutcome::AlreadyAbsent);
}

#[test]
fn test_delete_scene_removes_associated_images() {
    let (_tmp, depot) = open_depot();
    depot.store().write_scene("A.json", &SceneDocument::default()).unwrap();
    depot.store().write_image("A_model_0_x.jpg", b"1").unwrap();
    depot.store().write_image("A_model_1_y.png", b"2").unwrap();
    depot.store().write_image("Other_model_0_z.png", b"3").unwrap();

    assert_eq!(depot.delete_scene("A.json"), DeleteOutcome::Deleted);
    assert!(!depot.store().image_exists("A_model_0_x.jpg"));
    assert!(!depot.store().image_exists("A_model_1_y.png"));
    assert!(depot.store().image_exists("Other_model_0_z.png"));
}

#[test]
fn test_migrate_original_image_moves_content() {
    let (_tmp, depot) = open_depot();
    depot
        .save_original_image("draft", 1, "ref.png", b"ref-bytes")
        .unwrap();

    let migrated = depot.migrate_original_image("draft", "final", 1).unwrap();
    assert_eq!(migrated, "final_model_1_ref.png");
    assert!(!depot.store().image_exists("draft_model_1_ref.png"));
    assert_eq!(depot.store().read_image("final_model_1_ref.png").unwrap(), b"ref-bytes");
}

#[test]
fn test_list_scenes() {
    let (_tmp, depot) = open_depot();
    assert!(depot.list_scenes().unwrap().is_empty());
    depot.save_scene_at(SceneDocument::default(), at(9, 0, 0)).unwrap();
    depot.save_scene_at(SceneDocument::default(), at(9, 0, 1)).unwrap();
    let listed = depot.list_scenes().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|s| s.filename.ends_with(".json")));
}

#[test]
fn test_full_flow_upload_save_export() {
    let (_tmp, depot) = open_depot();

    let obj = depot
        .accept_upload_at("sess", "chair.obj", b"mtllib chair.mtl\nv 0 0 0\n", at(10, 0, 0))
        .unwrap();
    let mtl = depot
        .accept_upload_at("sess", "chair.mtl", b"newmtl m\n", at(10, 0, 1))
        .unwrap();
    let tex = depot
        .accept_upload_at("sess", "chair.png", b"texture", at(10, 0, 2))
        .unwrap();
    depot
        .save_original_image("temp_20250825100003", 0, "ref.jpg", b"reference")
        .unwrap();

    let doc = SceneDocument {
        models: vec![ModelEntry {
            obj_file: Some(obj.filepath),
            mtl_file: Some(mtl.filepath),
            texture_file: Some(tex.filepath),
            ..ModelEntry::default()
        }],
        ..SceneDocument::default()
    };
    let filename = depot.save_scene_at(doc, at(10, 0, 4)).unwrap();

    let archive = depot.export_scene(&filename).unwrap();
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive.bytes)).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();

    let base = "scene-25-08-25_10-00-04";
    assert!(names.contains(&format!("{}/模型1/chair.obj", base)));
    assert!(names.contains(&format!("{}/模型1/chair.mtl", base)));
    assert!(names.contains(&format!("{}/模型1/chair.png", base)));
    assert!(names.contains(&format!("{}/模型1/original.jpg", base)));
}
