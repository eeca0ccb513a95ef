//! Shared types: the persisted scene-document shape and operation outcomes
//!
//! Scene documents are caller-supplied JSON. The fields the depot itself
//! cares about (`models`, `original_images`) are typed; everything else is
//! carried through untouched via `#[serde(flatten)]` so a round trip never
//! drops client data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One model inside a scene document.
///
/// All file references are optional; an absent field means "nothing to
/// export" rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Recorded relative path of the mesh file (e.g. `/uploads/<ts>/a.obj`)
    #[serde(rename = "objFile", default, skip_serializing_if = "Option::is_none")]
    pub obj_file: Option<String>,

    /// Recorded relative path of the material file
    #[serde(rename = "mtlFile", default, skip_serializing_if = "Option::is_none")]
    pub mtl_file: Option<String>,

    /// Recorded relative path of the texture image
    #[serde(rename = "textureFile", default, skip_serializing_if = "Option::is_none")]
    pub texture_file: Option<String>,

    /// Caller-supplied fields (transform, camera overrides, ...) passed through verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Association between one model of a scene and its reference photo.
///
/// The filename is the on-disk name in the original-images root and encodes
/// the same association as its `<scene_base>_model_<index>_` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalImageEntry {
    pub model_index: usize,
    pub filename: String,
}

/// A persisted scene: models, image associations, and whatever else the
/// client chose to store (camera, lighting, annotations).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub models: Vec<ModelEntry>,

    #[serde(default)]
    pub original_images: Vec<OriginalImageEntry>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry in the scene listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSummary {
    pub filename: String,
}

/// Result of accepting one uploaded file
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    /// Sanitized name the file was stored under
    pub filename: String,
    /// Path the client should record in its scene document
    pub filepath: String,
    /// Batch directory the file landed in
    pub batch: String,
    /// Whether this file terminated its batch
    pub batch_complete: bool,
}

/// What actually happened during a delete.
///
/// The HTTP contract reports success for the first two; keeping them apart
/// internally lets tests and logs see the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
    /// Removal failed; the error has been logged and swallowed.
    Failed,
}

/// What actually happened during a scene rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Document and all associated images were moved.
    Renamed { new_filename: String },
    /// Source did not exist; treated as success (idempotent semantics).
    SourceMissing { new_filename: String },
    /// Source and target were the same name; nothing to do.
    Unchanged { new_filename: String },
}

impl RenameOutcome {
    pub fn new_filename(&self) -> &str {
        match self {
            RenameOutcome::Renamed { new_filename }
            | RenameOutcome::SourceMissing { new_filename }
            | RenameOutcome::Unchanged { new_filename } => new_filename,
        }
    }
}

/// An export archive built in memory, never written to the store
#[derive(Debug, Clone)]
pub struct ExportArchive {
    /// Suggested download filename, timestamp-derived
    pub filename: String,
    /// Zip bytes
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_document_preserves_unknown_fields() {
        let raw = r#"{
            "models": [{"objFile": "/uploads/1/a.obj", "position": [1, 2, 3]}],
            "camera": {"fov": 45}
        }"#;
        let doc: SceneDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.models.len(), 1);
        assert_eq!(doc.models[0].obj_file.as_deref(), Some("/uploads/1/a.obj"));
        assert!(doc.models[0].extra.contains_key("position"));
        assert!(doc.extra.contains_key("camera"));

        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["camera"]["fov"], 45);
        assert_eq!(out["models"][0]["position"][2], 3);
    }

    #[test]
    fn test_scene_document_tolerates_missing_lists() {
        let doc: SceneDocument = serde_json::from_str(r#"{"name": "empty"}"#).unwrap();
        assert!(doc.models.is_empty());
        assert!(doc.original_images.is_empty());
    }
}
