//! Zip export of whole scenes
//!
//! The archive is built in memory and streamed to the caller; nothing is
//! persisted server-side. Layout: the top-level folder is the scene's base
//! name, with one numbered subfolder per model (`模型1`, `模型2`, ...)
//! holding that model's mesh, material and texture plus its reference photo
//! renamed to `original.<ext>`. Referenced files that no longer exist are
//! skipped, never fatal.

use crate::error::Result;
use crate::naming;
use crate::store::Store;
use crate::types::ExportArchive;
use chrono::{DateTime, Local};
use std::fs;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build the export archive for the scene stored as `requested`.
///
/// The folder prefix comes from the requested filename, not from anything
/// inside the document; see DESIGN.md for the rationale.
pub fn build_archive(store: &Store, requested: &str, at: DateTime<Local>) -> Result<ExportArchive> {
    let doc = store.read_scene(requested)?;
    let base = naming::scene_base(requested);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (index, model) in doc.models.iter().enumerate() {
        let folder = format!("{}/模型{}", base, index + 1);
        writer.add_directory(folder.as_str(), options)?;

        let recorded = [
            model.obj_file.as_deref(),
            model.mtl_file.as_deref(),
            model.texture_file.as_deref(),
        ];
        for path in recorded.into_iter().flatten() {
            let Some(resolved) = store.resolve_upload(path) else {
                log::warn!("unresolvable asset path {} skipped in export", path);
                continue;
            };
            let bytes = match fs::read(&resolved) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("missing asset {} skipped in export: {}", resolved.display(), e);
                    continue;
                }
            };
            let name = path.rsplit('/').next().unwrap_or(path);
            writer.start_file(format!("{}/{}", folder, name), options)?;
            writer.write_all(&bytes)?;
        }

        let prefix = naming::image_prefix(base, index);
        if let Some(image) = store.find_image_with_prefix(&prefix)? {
            match store.read_image(&image) {
                Ok(bytes) => {
                    let entry = match naming::extension(&image) {
                        Some(ext) => format!("{}/original.{}", folder, ext),
                        None => format!("{}/original", folder),
                    };
                    writer.start_file(entry, options)?;
                    writer.write_all(&bytes)?;
                }
                Err(e) => log::warn!("unreadable image {} skipped in export: {}", image, e),
            }
        }
    }

    let bytes = writer.finish()?.into_inner();
    let filename = format!("{}_{}.zip", base, at.format("%Y%m%d%H%M%S"));
    log::info!("exported {} ({} bytes) as {}", requested, bytes.len(), filename);
    Ok(ExportArchive { filename, bytes })
}
