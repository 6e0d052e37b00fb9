// src/output/index.rs
//! Markdown index documents: per space, per hierarchy, and across spaces.
//!
//! Rendering is pure; the exporter writes the result once every page of the
//! scope has settled.

use super::paths::relative_link;
use crate::error::AppError;
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// A page as listed in an index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub title: String,
    /// The page's main document (Markdown, or HTML for HTML-only exports).
    pub document: PathBuf,
    /// Ancestor titles from the root of the space down.
    pub ancestor_titles: Vec<String>,
}

impl IndexEntry {
    fn depth(&self) -> usize {
        self.ancestor_titles.len()
    }

    fn title_path(&self) -> Vec<&str> {
        self.ancestor_titles
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.title.as_str()))
            .collect()
    }
}

/// A space as listed in the global index.
#[derive(Debug, Clone)]
pub struct SpaceIndexEntry {
    pub key: String,
    pub name: String,
    /// The space's index file, or its directory when none was written.
    pub target: PathBuf,
    pub page_count: usize,
}

/// Pages of a space, alphabetically by title.
pub fn render_space_index(
    space_name: &str,
    index_file: &Path,
    entries: &[IndexEntry],
) -> Result<String, AppError> {
    let mut sorted: Vec<&IndexEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| title_order(&a.title, &b.title));

    let mut doc = format!("# {}\n\n", space_name);
    for entry in sorted {
        let link = relative_link(index_file, &entry.document)?;
        writeln!(doc, "- [{}]({})", link_text(&entry.title), link)?;
    }
    Ok(doc)
}

/// Pages of a hierarchy as a nested list, indented two spaces per level
/// below the root.
///
/// Siblings are ordered by title, so each page follows its parent.
pub fn render_hierarchy_index(
    root_title: &str,
    index_file: &Path,
    entries: &[IndexEntry],
) -> Result<String, AppError> {
    let root_depth = entries.iter().map(IndexEntry::depth).min().unwrap_or(0);

    let mut sorted: Vec<&IndexEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| path_order(&a.title_path(), &b.title_path()));

    let mut doc = format!("# {} Hierarchy\n\n", root_title);
    for entry in sorted {
        let indent = "  ".repeat(entry.depth().saturating_sub(root_depth));
        let link = relative_link(index_file, &entry.document)?;
        writeln!(doc, "{}- [{}]({})", indent, link_text(&entry.title), link)?;
    }
    Ok(doc)
}

/// Every exported space, sorted by name.
pub fn render_global_index(
    index_file: &Path,
    spaces: &[SpaceIndexEntry],
) -> Result<String, AppError> {
    let mut sorted: Vec<&SpaceIndexEntry> = spaces.iter().collect();
    sorted.sort_by(|a, b| title_order(&a.name, &b.name));

    let mut doc = String::from("# Wiki Export\n\n");
    for space in sorted {
        let link = relative_link(index_file, &space.target)?;
        writeln!(
            doc,
            "- [{}]({}) ({}, {} pages)",
            link_text(&space.name),
            link,
            space.key,
            space.page_count
        )?;
    }
    Ok(doc)
}

fn title_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

fn path_order(a: &[&str], b: &[&str]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| title_order(x, y))
        .find(|order| order.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

fn link_text(title: &str) -> String {
    title.replace('[', "\\[").replace(']', "\\]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(title: &str, document: &str, ancestors: &[&str]) -> IndexEntry {
        IndexEntry {
            title: title.to_string(),
            document: PathBuf::from(document),
            ancestor_titles: ancestors.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_space_index_alphabetical() {
        let entries = vec![
            entry("zeta", "/out/Eng/zeta/README.md", &[]),
            entry("Alpha Plan", "/out/Eng/Alpha Plan/README.md", &[]),
            entry("beta", "/out/Eng/Alpha Plan/beta/README.md", &["Alpha Plan"]),
        ];
        let doc = render_space_index("Eng", Path::new("/out/Eng/INDEX.md"), &entries).unwrap();
        assert_eq!(
            doc,
            "# Eng\n\n- [Alpha Plan](Alpha%20Plan/README.md)\n- [beta](Alpha%20Plan/beta/README.md)\n- [zeta](zeta/README.md)\n"
        );
    }

    #[test]
    fn test_hierarchy_index_indents_by_depth() {
        // Root sits one level deep in its space
        let entries = vec![
            entry("Child B", "/o/S/Top/Root/Child B/README.md", &["Top", "Root"]),
            entry("Grandchild", "/o/S/Top/Root/Child A/Grandchild/README.md", &["Top", "Root", "Child A"]),
            entry("Root", "/o/S/Top/Root/README.md", &["Top"]),
            entry("Child A", "/o/S/Top/Root/Child A/README.md", &["Top", "Root"]),
        ];
        let doc =
            render_hierarchy_index("Root", Path::new("/o/S/HIERARCHY_INDEX.md"), &entries).unwrap();
        assert_eq!(
            doc,
            concat!(
                "# Root Hierarchy\n\n",
                "- [Root](Top/Root/README.md)\n",
                "  - [Child A](Top/Root/Child%20A/README.md)\n",
                "    - [Grandchild](Top/Root/Child%20A/Grandchild/README.md)\n",
                "  - [Child B](Top/Root/Child%20B/README.md)\n",
            )
        );
    }

    #[test]
    fn test_global_index_sorted_by_name() {
        let spaces = vec![
            SpaceIndexEntry {
                key: "OPS".to_string(),
                name: "Operations".to_string(),
                target: PathBuf::from("/out/Operations/INDEX.md"),
                page_count: 2,
            },
            SpaceIndexEntry {
                key: "ENG".to_string(),
                name: "Engineering".to_string(),
                target: PathBuf::from("/out/Engineering"),
                page_count: 5,
            },
        ];
        let doc = render_global_index(Path::new("/out/README.md"), &spaces).unwrap();
        assert_eq!(
            doc,
            "# Wiki Export\n\n- [Engineering](Engineering) (ENG, 5 pages)\n- [Operations](Operations/INDEX.md) (OPS, 2 pages)\n"
        );
    }

    #[test]
    fn test_brackets_in_titles_escaped() {
        let entries = vec![entry("[Draft] Plan", "/o/S/Draft Plan/README.md", &[])];
        let doc = render_space_index("S", Path::new("/o/S/INDEX.md"), &entries).unwrap();
        assert!(doc.contains("- [\\[Draft\\] Plan](Draft%20Plan/README.md)"));
    }
}
