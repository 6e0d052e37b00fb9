// src/output/paths.rs
//! Pure functions for path calculations and file naming.
//!
//! Nothing here touches the filesystem.

use crate::constants::{ASSETS_DIR, MAX_PATH_SEGMENT_LEN};
use crate::error::AppError;
use crate::model::Page;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Path, PathBuf};

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'+')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// File name of a page's Markdown rendition.
pub const MARKDOWN_FILE: &str = "README.md";
/// File name of a page's HTML rendition.
pub const HTML_FILE: &str = "index.html";
pub const SPACE_INDEX_FILE: &str = "INDEX.md";
pub const HIERARCHY_INDEX_FILE: &str = "HIERARCHY_INDEX.md";
pub const GLOBAL_INDEX_FILE: &str = "README.md";

/// Makes a string safe to use as a single path segment.
///
/// Characters invalid on common filesystems are removed, surrounding
/// whitespace and dots trimmed, and the result capped at
/// [`MAX_PATH_SEGMENT_LEN`] characters.
pub fn sanitize_path_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();

    // Truncate on a char boundary, then trim whatever the cut exposed
    let truncated: String = cleaned
        .trim()
        .trim_matches('.')
        .chars()
        .take(MAX_PATH_SEGMENT_LEN)
        .collect();
    let safe = truncated.trim().trim_end_matches('.').to_string();

    if safe.is_empty() {
        "untitled".to_string()
    } else {
        safe
    }
}

/// Local file name for an asset URL: its last path segment, decoded and sanitized.
pub fn asset_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    if decoded.trim().is_empty() {
        return "asset".to_string();
    }
    sanitize_path_segment(&decoded)
}

/// Relative link target of an asset, as written into converted Markdown.
pub fn asset_link(url: &str) -> String {
    format!("./{}/{}", ASSETS_DIR, asset_file_name(url))
}

/// Escapes `segment` for use as one path segment of a URL.
pub fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Directory of a space below the output root.
pub fn space_directory(output_root: &Path, space_name: &str) -> PathBuf {
    output_root.join(sanitize_path_segment(space_name))
}

/// Directory a page is written to.
///
/// `<root>/<space>/<ancestor titles...>/<title>` when hierarchy is preserved,
/// `<root>/<space>/<title>` otherwise. Pages without a known space go
/// directly under the root.
pub fn page_directory(output_root: &Path, page: &Page, preserve_hierarchy: bool) -> PathBuf {
    let mut dir = match page.space_name() {
        Some(space) => space_directory(output_root, space),
        None => output_root.to_path_buf(),
    };

    if preserve_hierarchy {
        for ancestor in &page.ancestors {
            dir.push(sanitize_path_segment(&ancestor.title));
        }
    }

    dir.push(sanitize_path_segment(&page.title));
    dir
}

/// Markdown link target from one file to another, relative to the first
/// file's directory.
pub fn relative_link(from_file: &Path, to_file: &Path) -> Result<String, AppError> {
    let from_dir = from_file.parent().unwrap_or_else(|| Path::new("."));

    let relative = pathdiff::diff_paths(to_file, from_dir).ok_or_else(|| {
        AppError::PathError(format!(
            "Could not calculate relative path from {} to {}",
            from_file.display(),
            to_file.display()
        ))
    })?;

    // Forward slashes and no raw spaces, so Markdown renderers accept it
    Ok(relative
        .to_string_lossy()
        .replace('\\', "/")
        .replace(' ', "%20"))
}
