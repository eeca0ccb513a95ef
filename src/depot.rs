//! The depot: every core operation over the file store
//!
//! `Depot` ties the naming protocol, the batch sessions, and the store
//! together. The filesystem stays the sole source of truth; the only
//! in-memory state is the session-keyed batch slot behind one mutex. There
//! is no per-scene locking: concurrent requests racing on the same scene
//! name can interleave, which is accepted for the single-editor usage this
//! backend serves.

use crate::error::{DepotError, Result};
use crate::export;
use crate::naming;
use crate::obj;
use crate::session::BatchSessions;
use crate::store::{Store, StoreConfig};
use crate::types::{
    DeleteOutcome, ExportArchive, OriginalImageEntry, RenameOutcome, SceneDocument, SceneSummary,
    UploadReceipt,
};
use chrono::{DateTime, Duration, Local};
use std::path::PathBuf;
use std::sync::Mutex;

/// Advertised upload cap, matching the original deployment
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Depot configuration
#[derive(Debug, Clone)]
pub struct DepotConfig {
    /// Directory holding the `uploads/`, `scenes/` and `original_images/` roots
    pub data_dir: PathBuf,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: u64,
    /// How long an unfinished upload batch stays claimable
    pub session_ttl: std::time::Duration,
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session_ttl: std::time::Duration::from_secs(30 * 60),
        }
    }
}

/// Handle to one scene depot
#[derive(Debug)]
pub struct Depot {
    store: Store,
    sessions: Mutex<BatchSessions>,
    max_upload_bytes: u64,
}

impl Depot {
    /// Open (and create if needed) the depot under `config.data_dir`
    pub fn open(config: DepotConfig) -> Result<Self> {
        let store = Store::open(StoreConfig::under(&config.data_dir))?;
        let ttl = Duration::seconds(config.session_ttl.as_secs() as i64);
        Ok(Self {
            store,
            sessions: Mutex::new(BatchSessions::new(ttl)),
            max_upload_bytes: config.max_upload_bytes,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, BatchSessions> {
        // a poisoned lock only means another request panicked mid-claim;
        // the slot map itself stays usable
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ---- uploads ----

    /// Accept one uploaded asset file into the session's current batch
    pub fn accept_upload(&self, session: &str, filename: &str, data: &[u8]) -> Result<UploadReceipt> {
        self.accept_upload_at(session, filename, data, Local::now())
    }

    /// Like [`accept_upload`](Self::accept_upload) with an explicit clock
    pub fn accept_upload_at(
        &self,
        session: &str,
        filename: &str,
        data: &[u8],
        at: DateTime<Local>,
    ) -> Result<UploadReceipt> {
        // all rejections happen before any side effect
        if data.len() as u64 > self.max_upload_bytes {
            return Err(DepotError::UploadTooLarge {
                size: data.len() as u64,
                limit: self.max_upload_bytes,
            });
        }
        let filename = naming::sanitize_filename(filename)?;
        if !naming::is_allowed_file(&filename) {
            return Err(DepotError::UnsupportedExtension(filename));
        }

        let batch = self.sessions().claim(session, at);
        let path = self.store.write_upload(&batch, &filename, data)?;
        log::info!("stored upload {}", path.display());

        if naming::extension(&filename).as_deref() == Some("obj") {
            // non-UTF-8 meshes are stored as-is
            if let Ok(text) = std::str::from_utf8(data) {
                if let Some(repaired) = obj::ensure_default_material(text) {
                    std::fs::write(&path, repaired)?;
                    log::info!("inserted default material into {}", filename);
                }
            }
        }

        let batch_complete = naming::is_image_file(&filename);
        if batch_complete {
            self.sessions().complete(session);
        }

        Ok(UploadReceipt {
            filepath: format!("/uploads/{}/{}", batch, filename),
            filename,
            batch,
            batch_complete,
        })
    }

    // ---- scenes ----

    /// Persist a scene document under a fresh timestamp name, adopting any
    /// staged original images into it. Returns the new document filename.
    pub fn save_scene(&self, doc: SceneDocument) -> Result<String> {
        self.save_scene_at(doc, Local::now())
    }

    /// Like [`save_scene`](Self::save_scene) with an explicit clock
    pub fn save_scene_at(&self, mut doc: SceneDocument, at: DateTime<Local>) -> Result<String> {
        let filename = naming::scene_filename(at);
        let base = naming::scene_base(&filename).to_string();

        // adopt staged images: temp_<digits>_model_<idx>_<rest> becomes
        // <base>_model_<idx>_<rest>. Matching is textual, so any file that
        // fits the pattern is picked up.
        for staged in self.store.list_image_files()? {
            if let Some(parsed) = naming::parse_temp_image(&staged) {
                let adopted = naming::adopted_filename(&base, &parsed);
                self.store.rename_image(&staged, &adopted)?;
                log::info!("adopted staged image {} as {}", staged, adopted);
                doc.original_images.push(OriginalImageEntry {
                    model_index: parsed.model_index,
                    filename: adopted,
                });
            }
        }

        self.store.write_scene(&filename, &doc)?;
        log::info!("saved scene {}", filename);
        Ok(filename)
    }

    /// Load a scene document; missing scenes are a reported failure
    pub fn load_scene(&self, filename: &str) -> Result<SceneDocument> {
        self.store.read_scene(filename)
    }

    /// All stored scenes
    pub fn list_scenes(&self) -> Result<Vec<SceneSummary>> {
        Ok(self
            .store
            .list_scene_files()?
            .into_iter()
            .map(|filename| SceneSummary { filename })
            .collect())
    }

    /// Delete a scene document and its associated original images.
    ///
    /// Always reports a usable outcome; failures are logged, never
    /// surfaced. The boundary collapses `Deleted` and `AlreadyAbsent` into
    /// one client-visible success.
    pub fn delete_scene(&self, filename: &str) -> DeleteOutcome {
        let base = naming::scene_base(filename).to_string();

        // mirror the deletion onto every image sharing the scene's prefix,
        // best effort
        match self.store.list_image_files() {
            Ok(images) => {
                let prefix = format!("{}_model_", base);
                for image in images.iter().filter(|n| n.starts_with(&prefix)) {
                    if let Err(e) = self.store.remove_image(image) {
                        log::error!("failed to remove image {}: {}", image, e);
                    }
                }
            }
            Err(e) => log::error!("failed to list images while deleting {}: {}", filename, e),
        }

        match self.store.remove_scene(filename) {
            Ok(true) => {
                log::info!("deleted scene {}", filename);
                DeleteOutcome::Deleted
            }
            Ok(false) => {
                log::debug!("delete of absent scene {}", filename);
                DeleteOutcome::AlreadyAbsent
            }
            Err(e) => {
                log::error!("failed to delete scene {}: {}", filename, e);
                DeleteOutcome::Failed
            }
        }
    }

    /// Rename a scene and propagate the new base name onto every associated
    /// original image.
    ///
    /// Missing source and same-name renames are no-op successes; an existing
    /// distinct target is a reported failure that leaves both files alone.
    pub fn rename_scene(&self, old_filename: &str, new_name: &str) -> Result<RenameOutcome> {
        if new_name.trim().is_empty() {
            return Err(DepotError::InvalidRequest("new name must not be empty".to_string()));
        }
        let new_filename = naming::ensure_json_suffix(new_name.trim());
        // validate both names up front so nothing moves on a bad request
        self.store.scene_path(old_filename)?;
        self.store.scene_path(&new_filename)?;

        if !self.store.scene_exists(old_filename) {
            log::info!("rename of absent scene {} treated as success", old_filename);
            return Ok(RenameOutcome::SourceMissing { new_filename });
        }
        if old_filename == new_filename {
            return Ok(RenameOutcome::Unchanged { new_filename });
        }
        if self.store.scene_exists(&new_filename) {
            return Err(DepotError::SceneExists(new_filename));
        }

        self.store.rename_scene_file(old_filename, &new_filename)?;

        let old_base = naming::scene_base(old_filename);
        let new_base = naming::scene_base(&new_filename);
        let mut doc = self.store.read_scene(&new_filename)?;
        for entry in &mut doc.original_images {
            let renamed = naming::rebase_filename(&entry.filename, old_base, new_base);
            if renamed == entry.filename {
                continue;
            }
            if self.store.image_exists(&entry.filename) {
                self.store.rename_image(&entry.filename, &renamed)?;
            } else {
                // entry pointed at a file that is already gone; keep the
                // document consistent anyway
                log::warn!("image {} missing during rename of {}", entry.filename, old_filename);
            }
            entry.filename = renamed;
        }
        self.store.write_scene(&new_filename, &doc)?;

        log::info!("renamed scene {} -> {}", old_filename, new_filename);
        Ok(RenameOutcome::Renamed { new_filename })
    }

    // ---- original images ----

    /// Store the reference photo for `(scene_name, model_index)`, replacing
    /// any previous one for that pair. `scene_name` may be a provisional
    /// `temp_<digits>` base for scenes that have not been saved yet.
    /// Returns the on-disk filename.
    pub fn save_original_image(
        &self,
        scene_name: &str,
        model_index: usize,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<String> {
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(DepotError::UploadTooLarge {
                size: bytes.len() as u64,
                limit: self.max_upload_bytes,
            });
        }
        let original = naming::sanitize_filename(original_filename)?;
        if !naming::is_image_file(&original) {
            return Err(DepotError::UnsupportedExtension(original));
        }
        let base = naming::scene_base(scene_name);
        let prefix = naming::image_prefix(base, model_index);

        // at most one image per (scene, model) pair
        if let Some(existing) = self.store.find_image_with_prefix(&prefix)? {
            self.store.remove_image(&existing)?;
            log::info!("replaced original image {}", existing);
        }

        let filename = naming::image_filename(base, model_index, &original);
        self.store.write_image(&filename, bytes)?;
        log::info!("saved original image {}", filename);
        Ok(filename)
    }

    /// Remove the reference photo for `(scene_name, model_index)`; unlike
    /// scene deletion, a missing image is a reported not-found failure
    pub fn delete_original_image(&self, scene_name: &str, model_index: usize) -> Result<()> {
        let base = naming::scene_base(scene_name);
        let prefix = naming::image_prefix(base, model_index);
        match self.store.find_image_with_prefix(&prefix)? {
            Some(filename) => {
                self.store.remove_image(&filename)?;
                log::info!("deleted original image {}", filename);
                Ok(())
            }
            None => Err(DepotError::ImageNotFound {
                scene: scene_name.to_string(),
                model_index,
            }),
        }
    }

    /// Move the reference photo of `(old_scene, model_index)` under a new
    /// scene base: copy to the rebased name, then delete the source. Used
    /// when in-flight state is retitled before the scene document exists.
    /// Returns the new filename.
    pub fn migrate_original_image(
        &self,
        old_scene: &str,
        new_scene: &str,
        model_index: usize,
    ) -> Result<String> {
        let old_base = naming::scene_base(old_scene);
        let new_base = naming::scene_base(new_scene);
        let prefix = naming::image_prefix(old_base, model_index);

        let source = self
            .store
            .find_image_with_prefix(&prefix)?
            .ok_or_else(|| DepotError::ImageNotFound {
                scene: old_scene.to_string(),
                model_index,
            })?;
        let target = naming::rebase_filename(&source, old_base, new_base);
        if target == source {
            return Ok(source);
        }

        self.store.copy_image(&source, &target)?;
        self.store.remove_image(&source)?;
        log::info!("migrated original image {} -> {}", source, target);
        Ok(target)
    }

    // ---- export ----

    /// Build the shareable zip bundle for a scene
    pub fn export_scene(&self, filename: &str) -> Result<ExportArchive> {
        self.export_scene_at(filename, Local::now())
    }

    /// Like [`export_scene`](Self::export_scene) with an explicit clock
    pub fn export_scene_at(&self, filename: &str, at: DateTime<Local>) -> Result<ExportArchive> {
        export::build_archive(&self.store, filename, at)
    }
}
