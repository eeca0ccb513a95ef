//! The scene/asset naming protocol
//!
//! Every association in the store is encoded in filenames:
//!
//! - scenes are `scene-<YY-MM-DD_HH-MM-SS>.json`
//! - upload batches live under all-digit `<YYYYMMDDHHMMSS>` directories
//! - an original image for model `i` of scene base `B` is named
//!   `B_model_<i>_<original filename>`
//! - images staged before their scene exists use the provisional base
//!   `temp_<YYYYMMDDHHMMSS>` and are adopted (renamed) at scene-save time
//!
//! These functions are pure; all filesystem effects live in [`crate::store`].
//!
//! Known limitations, kept on purpose: scene identity has one-second
//! resolution (a second save within the same second overwrites the first),
//! and prefix matching is purely textual, so a scene base that itself
//! contains `_model_<digits>_` will confuse the association.

use crate::error::{DepotError, Result};
use chrono::{DateTime, Local};

/// Extensions accepted by the upload endpoint, lowercase
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["obj", "mtl", "jpg", "jpeg", "png"];

/// Image extensions; an uploaded image terminates its batch
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Staged original image parsed from a `temp_<digits>_model_<idx>_<rest>` name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempImage<'a> {
    pub model_index: usize,
    pub rest: &'a str,
}

/// Scene document filename for a save at `at`, e.g. `scene-25-08-25_14-03-59.json`
pub fn scene_filename(at: DateTime<Local>) -> String {
    format!("scene-{}.json", at.format("%y-%m-%d_%H-%M-%S"))
}

/// All-digit timestamp used for batch directories and provisional image bases
pub fn batch_timestamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// Lowercased extension of a filename, if it has one
pub fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the file may be uploaded at all
pub fn is_allowed_file(filename: &str) -> bool {
    matches!(extension(filename), Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether the file is an image, i.e. the terminal file of an upload batch
pub fn is_image_file(filename: &str) -> bool {
    matches!(extension(filename), Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Scene base name: the document filename minus its `.json` suffix
pub fn scene_base(filename: &str) -> &str {
    filename.strip_suffix(".json").unwrap_or(filename)
}

/// Prefix shared by every original image of `(scene_base, model_index)`.
///
/// At most one file per prefix may exist in the image store.
pub fn image_prefix(scene_base: &str, model_index: usize) -> String {
    format!("{}_model_{}_", scene_base, model_index)
}

/// Full on-disk name for an original image
pub fn image_filename(scene_base: &str, model_index: usize, original: &str) -> String {
    format!("{}{}", image_prefix(scene_base, model_index), original)
}

/// Parse a staged image name of the form `temp_<digits>_model_<digits>_<rest>`.
///
/// Matching is textual: any filename fitting the pattern is treated as a
/// staged image, related to the caller or not.
pub fn parse_temp_image(filename: &str) -> Option<TempImage<'_>> {
    let tail = filename.strip_prefix("temp_")?;
    let marker = tail.find("_model_")?;
    if marker == 0 || !tail[..marker].bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let after = &tail[marker + "_model_".len()..];
    let sep = after.find('_')?;
    let model_index: usize = after[..sep].parse().ok()?;
    Some(TempImage {
        model_index,
        rest: &after[sep + 1..],
    })
}

/// Name a staged image takes once its scene exists: the `temp_<digits>`
/// prefix replaced by the scene base
pub fn adopted_filename(scene_base: &str, staged: &TempImage<'_>) -> String {
    image_filename(scene_base, staged.model_index, staged.rest)
}

/// Substitute `old_base` with `new_base` in an image filename (first
/// occurrence only); used by rename propagation and migration
pub fn rebase_filename(filename: &str, old_base: &str, new_base: &str) -> String {
    filename.replacen(old_base, new_base, 1)
}

/// Ensure a scene document filename carries the `.json` suffix
pub fn ensure_json_suffix(name: &str) -> String {
    if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{}.json", name)
    }
}

/// Reduce a client-supplied filename to a safe final path component.
///
/// Directory parts are stripped, control characters and path separators are
/// replaced with `_`. Empty or dot-only results are rejected.
pub fn sanitize_filename(raw: &str) -> Result<String> {
    let last = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .trim();
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_control() || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(DepotError::InvalidFilename(raw.to_string()));
    }
    Ok(cleaned)
}
