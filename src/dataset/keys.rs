use std::path::Path;

/// Slide file extensions stripped by [`slide_key`], compared case-insensitively.
pub const SLIDE_EXTENSIONS: &[&str] = &["svs", "tif", "tiff", "scn", "ndpi", "mrxs"];

/// Normalized slide identifier: the base name with one known slide
/// extension removed.
///
/// Accepts a bare file name or a path. Names without a recognized
/// extension come back unchanged.
pub fn slide_key(name: impl AsRef<Path>) -> String {
    let path = name.as_ref();
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    match base.rsplit_once('.') {
        Some((stem, ext))
            if SLIDE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            stem.to_string()
        }
        _ => base,
    }
}
