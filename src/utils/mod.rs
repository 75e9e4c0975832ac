/// Splits the last segment of a URL path into `(stem, extension)`.
///
/// The extension keeps its leading dot, and a segment that only starts with
/// a dot (e.g. `.hidden`) has no extension.
pub fn split_file_name(segment: &str) -> (&str, &str) {
    match segment.rfind('.') {
        Some(idx) if idx > 0 => (&segment[..idx], &segment[idx..]),
        _ => (segment, ""),
    }
}

/// Last non-empty segment of a URL path.
pub fn last_path_segment(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("")
}
