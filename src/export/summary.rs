// src/export/summary.rs
//! Result records of an export run.

use crate::output::{IndexEntry, SpaceIndexEntry};
use crate::types::{PageId, SpaceKey};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// What an export scope produced.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    /// Pages written, in the order their exports settled.
    pub exported: Vec<ExportedPage>,
    /// Pages that could not be written, with the reason.
    pub failed: Vec<FailedPage>,
    pub spaces: Vec<ExportedSpace>,
    pub stats: ExportStats,
}

impl ExportSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exported(mut self, page: ExportedPage) -> Self {
        self.stats.pages_exported += 1;
        self.stats.assets_downloaded += page.assets_downloaded;
        self.stats.assets_failed += page.assets_failed;
        self.stats.bytes_written += page.bytes_written;
        self.exported.push(page);
        self
    }

    pub fn with_failed(mut self, page: FailedPage) -> Self {
        self.stats.pages_failed += 1;
        self.failed.push(page);
        self
    }

    /// A page skipped because this run already wrote it.
    pub fn with_duplicate(mut self) -> Self {
        self.stats.duplicates_skipped += 1;
        self
    }

    pub fn with_space(mut self, space: ExportedSpace) -> Self {
        self.spaces.push(space);
        self
    }

    /// Folds another scope's results into this one. Elapsed time is not summed.
    pub fn merge(mut self, other: ExportSummary) -> Self {
        self.stats.pages_exported += other.stats.pages_exported;
        self.stats.pages_failed += other.stats.pages_failed;
        self.stats.duplicates_skipped += other.stats.duplicates_skipped;
        self.stats.assets_downloaded += other.stats.assets_downloaded;
        self.stats.assets_failed += other.stats.assets_failed;
        self.stats.bytes_written += other.stats.bytes_written;
        self.exported.extend(other.exported);
        self.failed.extend(other.failed);
        self.spaces.extend(other.spaces);
        self
    }

    /// Stamps the wall-clock time since `started`.
    pub fn finished(mut self, started: Instant) -> Self {
        self.stats.elapsed = started.elapsed();
        self
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn index_entries(&self) -> Vec<IndexEntry> {
        self.exported.iter().map(ExportedPage::index_entry).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub pages_exported: usize,
    pub pages_failed: usize,
    pub duplicates_skipped: usize,
    pub assets_downloaded: usize,
    pub assets_failed: usize,
    pub bytes_written: usize,
    pub elapsed: Duration,
}

/// A page written to disk.
#[derive(Debug, Clone)]
pub struct ExportedPage {
    pub id: PageId,
    pub title: String,
    pub ancestor_titles: Vec<String>,
    pub directory: PathBuf,
    /// Main document: the Markdown file, or the HTML file for HTML-only runs.
    pub document: PathBuf,
    pub assets_downloaded: usize,
    pub assets_failed: usize,
    pub bytes_written: usize,
}

impl ExportedPage {
    pub fn index_entry(&self) -> IndexEntry {
        IndexEntry {
            title: self.title.clone(),
            document: self.document.clone(),
            ancestor_titles: self.ancestor_titles.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FailedPage {
    pub id: PageId,
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ExportedSpace {
    pub key: SpaceKey,
    pub name: String,
    pub directory: PathBuf,
    /// The space's INDEX.md, when one was written.
    pub index: Option<PathBuf>,
    pub page_count: usize,
}

impl ExportedSpace {
    pub fn index_entry(&self) -> SpaceIndexEntry {
        SpaceIndexEntry {
            key: self.key.to_string(),
            name: self.name.clone(),
            target: self.index.clone().unwrap_or_else(|| self.directory.clone()),
            page_count: self.page_count,
        }
    }
}
