//! Filesystem layer over the three storage roots
//!
//! - uploads root: one all-digit batch directory per upload batch
//! - scenes root: flat, one JSON document per scene
//! - original-images root: flat, filenames encode the scene/model association
//!
//! The store is deliberately thin: create/read/write/rename/copy/delete and
//! directory listings. All protocol decisions live in [`crate::depot`].

use crate::error::{DepotError, Result};
use crate::types::SceneDocument;
use std::fs;
use std::path::{Path, PathBuf};

/// Locations of the three storage roots
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub uploads_dir: PathBuf,
    pub scenes_dir: PathBuf,
    pub images_dir: PathBuf,
}

impl StoreConfig {
    /// Conventional layout under a single data directory
    pub fn under(data_dir: &Path) -> Self {
        Self {
            uploads_dir: data_dir.join("uploads"),
            scenes_dir: data_dir.join("scenes"),
            images_dir: data_dir.join("original_images"),
        }
    }
}

/// Handle to the hierarchical file store
#[derive(Debug)]
pub struct Store {
    uploads: PathBuf,
    scenes: PathBuf,
    images: PathBuf,
}

impl Store {
    /// Open the store, creating any missing root directory
    pub fn open(config: StoreConfig) -> Result<Self> {
        for dir in [&config.uploads_dir, &config.scenes_dir, &config.images_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            uploads: config.uploads_dir,
            scenes: config.scenes_dir,
            images: config.images_dir,
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    /// Reject names that could escape their root directory
    fn checked(name: &str) -> Result<&str> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(DepotError::InvalidFilename(name.to_string()));
        }
        Ok(name)
    }

    fn list_files(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Ok(name) = entry.file_name().into_string() {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    // ---- scenes ----

    pub fn scene_path(&self, filename: &str) -> Result<PathBuf> {
        Ok(self.scenes.join(Self::checked(filename)?))
    }

    pub fn scene_exists(&self, filename: &str) -> bool {
        self.scene_path(filename).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn read_scene(&self, filename: &str) -> Result<SceneDocument> {
        let path = self.scene_path(filename)?;
        if !path.is_file() {
            return Err(DepotError::SceneNotFound(filename.to_string()));
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_scene(&self, filename: &str, doc: &SceneDocument) -> Result<()> {
        let path = self.scene_path(filename)?;
        fs::write(path, serde_json::to_string(doc)?)?;
        Ok(())
    }

    /// Remove a scene document; `Ok(false)` when it was already absent
    pub fn remove_scene(&self, filename: &str) -> Result<bool> {
        let path = self.scene_path(filename)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    pub fn rename_scene_file(&self, old: &str, new: &str) -> Result<()> {
        fs::rename(self.scene_path(old)?, self.scene_path(new)?)?;
        Ok(())
    }

    /// All `*.json` documents in the scenes root, sorted by name
    pub fn list_scene_files(&self) -> Result<Vec<String>> {
        let mut names = Self::list_files(&self.scenes)?;
        names.retain(|n| n.ends_with(".json"));
        Ok(names)
    }

    // ---- original images ----

    pub fn image_path(&self, filename: &str) -> Result<PathBuf> {
        Ok(self.images.join(Self::checked(filename)?))
    }

    pub fn write_image(&self, filename: &str, bytes: &[u8]) -> Result<()> {
        fs::write(self.image_path(filename)?, bytes)?;
        Ok(())
    }

    pub fn read_image(&self, filename: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.image_path(filename)?)?)
    }

    /// Remove an image file; `Ok(false)` when it was already absent
    pub fn remove_image(&self, filename: &str) -> Result<bool> {
        let path = self.image_path(filename)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    pub fn rename_image(&self, old: &str, new: &str) -> Result<()> {
        fs::rename(self.image_path(old)?, self.image_path(new)?)?;
        Ok(())
    }

    pub fn copy_image(&self, from: &str, to: &str) -> Result<()> {
        fs::copy(self.image_path(from)?, self.image_path(to)?)?;
        Ok(())
    }

    pub fn image_exists(&self, filename: &str) -> bool {
        self.image_path(filename).map(|p| p.is_file()).unwrap_or(false)
    }

    /// All files in the original-images root, sorted by name
    pub fn list_image_files(&self) -> Result<Vec<String>> {
        Self::list_files(&self.images)
    }

    /// First image (in name order) whose filename starts with `prefix`.
    ///
    /// The naming protocol keeps at most one file per prefix, so "first" is
    /// normally "only".
    pub fn find_image_with_prefix(&self, prefix: &str) -> Result<Option<String>> {
        Ok(self
            .list_image_files()?
            .into_iter()
            .find(|n| n.starts_with(prefix)))
    }

    // ---- uploads ----

    pub fn upload_path(&self, batch: &str, filename: &str) -> Result<PathBuf> {
        Ok(self
            .uploads
            .join(Self::checked(batch)?)
            .join(Self::checked(filename)?))
    }

    /// Write a file into its batch directory, creating the directory on the
    /// first file of the batch
    pub fn write_upload(&self, batch: &str, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.uploads.join(Self::checked(batch)?);
        fs::create_dir_all(&dir)?;
        let path = dir.join(Self::checked(filename)?);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Resolve a path recorded in a scene document (`/uploads/<ts>/<file>`)
    /// back to a filesystem path. Traversal components are rejected.
    pub fn resolve_upload(&self, recorded: &str) -> Option<PathBuf> {
        let rel = recorded
            .trim_start_matches('/')
            .strip_prefix("uploads/")
            .unwrap_or_else(|| recorded.trim_start_matches('/'));
        if rel.is_empty() || rel.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return None;
        }
        let mut path = self.uploads.clone();
        for component in rel.split('/') {
            path.push(component);
        }
        Some(path)
    }
}
