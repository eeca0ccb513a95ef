//! Mesh post-processing
//!
//! Some exporters write OBJ files that reference a material library but
//! never select a material, which leaves downstream renderers to guess the
//! binding. After storing an `.obj` upload the depot makes sure the file
//! declares `usemtl material_0`.

/// The material-usage line guaranteed to exist after repair
pub const DEFAULT_USEMTL: &str = "usemtl material_0";

/// Repair an OBJ source if it lacks the default material declaration.
///
/// Returns the rewritten text, or `None` when the declaration is already
/// present and the file must stay byte-identical. The line is inserted
/// immediately after the first `mtllib` line, or at the top of the file if
/// there is none; every other byte of the source is preserved.
pub fn ensure_default_material(source: &str) -> Option<String> {
    if source.contains(DEFAULT_USEMTL) {
        return None;
    }

    let mut insert_at = None;
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        if line.starts_with("mtllib") {
            insert_at = Some(offset + line.len());
            break;
        }
        offset += line.len();
    }

    match insert_at {
        Some(pos) => {
            let mut out = String::with_capacity(source.len() + DEFAULT_USEMTL.len() + 2);
            out.push_str(&source[..pos]);
            // mtllib line was the last one and had no trailing newline
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(DEFAULT_USEMTL);
            out.push('\n');
            out.push_str(&source[pos..]);
            Some(out)
        }
        None => Some(format!("{}\n{}", DEFAULT_USEMTL, source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserts_after_mtllib() {
        let src = "# exported\nmtllib chair.mtl\nv 0 0 0\nf 1 1 1\n";
        let out = ensure_default_material(src).unwrap();
        assert_eq!(
            out,
            "# exported\nmtllib chair.mtl\nusemtl material_0\nv 0 0 0\nf 1 1 1\n"
        );
        assert_eq!(out.matches(DEFAULT_USEMTL).count(), 1);
    }

    #[test]
    fn test_inserts_at_top_without_mtllib() {
        let src = "v 0 0 0\nv 1 0 0\n";
        let out = ensure_default_material(src).unwrap();
        assert_eq!(out, "usemtl material_0\nv 0 0 0\nv 1 0 0\n");
    }

    #[test]
    fn test_untouched_when_present() {
        let src = "mtllib a.mtl\nusemtl material_0\nv 0 0 0\n";
        assert!(ensure_default_material(src).is_none());
    }

    #[test]
    fn test_mtllib_without_trailing_newline() {
        let src = "v 0 0 0\nmtllib end.mtl";
        let out = ensure_default_material(src).unwrap();
        assert_eq!(out, "v 0 0 0\nmtllib end.mtl\nusemtl material_0\n");
    }

    #[test]
    fn test_empty_source() {
        let out = ensure_default_material("").unwrap();
        assert_eq!(out, "usemtl material_0\n");
    }
}
