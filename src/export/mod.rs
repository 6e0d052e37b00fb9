// src/export/mod.rs
//! Export orchestration: resolves a scope to pages, writes each page under a
//! concurrency limit, then writes the scope's index.
//!
//! Failures are contained at the smallest unit they affect. A broken asset
//! is skipped, a page that cannot be written is recorded in the summary,
//! and only space-wide or run-wide failures propagate.

mod filter;
mod summary;

pub use filter::SpaceFilter;
pub use summary::{ExportStats, ExportSummary, ExportedPage, ExportedSpace, FailedPage};

use crate::api::WikiRepository;
use crate::config::ExportConfig;
use crate::constants::{ASSETS_DIR, MAX_PATH_SEGMENT_LEN};
use crate::error::AppError;
use crate::formatting::{self, render_html_document, render_markdown_document};
use crate::model::{Page, Space, SpaceRef};
use crate::output::index::{render_global_index, render_hierarchy_index, render_space_index};
use crate::output::paths::{
    GLOBAL_INDEX_FILE, HIERARCHY_INDEX_FILE, HTML_FILE, MARKDOWN_FILE, SPACE_INDEX_FILE,
};
use crate::output::{
    create_directory, extract_assets, page_directory, sanitize_path_segment, space_directory,
    write_file, AssetReference, AssetSelection,
};
use crate::types::{PageId, SpaceKey};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Runs exports against one repository with one configuration.
///
/// An exporter remembers every page it has written, so a page reachable
/// from more than one scope of the same run is only written once.
pub struct Exporter {
    repository: Arc<dyn WikiRepository>,
    config: ExportConfig,
    limiter: Semaphore,
    exported: DashSet<PageId>,
    claimed_dirs: DashMap<PathBuf, PageId>,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct AssetTally {
    downloaded: usize,
    failed: usize,
}

impl Exporter {
    pub fn new(
        repository: Arc<dyn WikiRepository>,
        config: ExportConfig,
        cancel: CancellationToken,
    ) -> Self {
        let permits = config.max_concurrent.max(1);
        Self {
            repository,
            config,
            limiter: Semaphore::new(permits),
            exported: DashSet::new(),
            claimed_dirs: DashMap::new(),
            cancel,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Exports a single page. `Ok(None)` if the page does not exist.
    pub async fn export_page(&self, id: &PageId) -> Result<Option<ExportSummary>, AppError> {
        let started = Instant::now();
        let Some(page) = self.repository.get_page(id).await? else {
            log::warn!("Page {} not found; nothing exported", id);
            return Ok(None);
        };

        let summary = self.export_pages(std::slice::from_ref(&page)).await?;
        Ok(Some(summary.finished(started)))
    }

    /// Exports every page of a space and, if enabled, its `INDEX.md`.
    /// `Ok(None)` if the space does not exist.
    pub async fn export_space(&self, key: &SpaceKey) -> Result<Option<ExportSummary>, AppError> {
        let started = Instant::now();
        let Some(space) = self.repository.get_space(key).await? else {
            log::warn!("Space {} not found; nothing exported", key);
            return Ok(None);
        };

        let summary = self.export_space_contents(&space).await?;
        Ok(Some(summary.finished(started)))
    }

    /// Exports a page with all its descendants, then `HIERARCHY_INDEX.md`.
    /// `Ok(None)` if the root page does not exist.
    pub async fn export_hierarchy(
        &self,
        root: &PageId,
    ) -> Result<Option<ExportSummary>, AppError> {
        let started = Instant::now();
        let pages = self.repository.get_hierarchy(root).await?;
        let Some(root_page) = pages.first() else {
            log::warn!("Page {} not found; nothing exported", root);
            return Ok(None);
        };
        log::info!(
            "Exporting hierarchy under '{}' ({} pages)",
            root_page.title,
            pages.len()
        );

        let summary = self.export_pages(&pages).await?;

        let index_dir = match root_page.space_name() {
            Some(space) => space_directory(&self.config.output_dir, space),
            None => self.config.output_dir.clone(),
        };
        let index_path = index_dir.join(HIERARCHY_INDEX_FILE);
        let index = render_hierarchy_index(&root_page.title, &index_path, &summary.index_entries())?;
        write_file(&index_path, index, &self.cancel).await?;

        Ok(Some(summary.finished(started)))
    }

    /// Exports every space the filter allows, one after another, then the
    /// global `README.md`.
    pub async fn export_all_spaces(&self) -> Result<ExportSummary, AppError> {
        let started = Instant::now();
        let spaces = self.list_spaces().await?;

        let mut summary = ExportSummary::new();
        for space in &spaces {
            if self.cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            summary = summary.merge(self.export_space_contents(space).await?);
        }

        create_directory(&self.config.output_dir).await?;
        let index_path = self.config.output_dir.join(GLOBAL_INDEX_FILE);
        let entries: Vec<_> = summary.spaces.iter().map(ExportedSpace::index_entry).collect();
        let index = render_global_index(&index_path, &entries)?;
        write_file(&index_path, index, &self.cancel).await?;

        Ok(summary.finished(started))
    }

    /// Spaces visible to the account, after include/exclude filtering.
    pub async fn list_spaces(&self) -> Result<Vec<Space>, AppError> {
        let spaces = self.repository.list_spaces().await?;
        let total = spaces.len();
        let selected = self.config.spaces.apply(spaces);
        log::info!("{} of {} spaces selected", selected.len(), total);
        Ok(selected)
    }

    async fn export_space_contents(&self, space: &Space) -> Result<ExportSummary, AppError> {
        let started = Instant::now();
        let name = space.display_name().to_string();
        log::info!("Exporting space {} ({})", space.key, name);

        let space_ref = SpaceRef {
            key: space.key.clone(),
            name: name.clone(),
        };
        let mut pages = self.repository.list_space_pages(&space.key).await?;
        for page in &mut pages {
            page.space.get_or_insert_with(|| space_ref.clone());
        }

        let summary = self.export_pages(&pages).await?;

        let directory = space_directory(&self.config.output_dir, &name);
        let index = if self.config.create_index {
            let index_path = directory.join(SPACE_INDEX_FILE);
            let index = render_space_index(&name, &index_path, &summary.index_entries())?;
            write_file(&index_path, index, &self.cancel).await?;
            Some(index_path)
        } else {
            None
        };

        let page_count = summary.exported.len();
        log::info!(
            "Space {} done: {} pages in {:.1}s",
            space.key,
            page_count,
            started.elapsed().as_secs_f64()
        );
        Ok(summary.with_space(ExportedSpace {
            key: space.key.clone(),
            name,
            directory,
            index,
            page_count,
        }))
    }

    /// Exports pages concurrently and waits for all of them to settle.
    async fn export_pages(&self, pages: &[Page]) -> Result<ExportSummary, AppError> {
        create_directory(&self.config.output_dir).await?;

        let results = join_all(pages.iter().map(|page| self.export_in_slot(page))).await;

        let mut summary = ExportSummary::new();
        let mut cancelled = false;
        for (page, result) in pages.iter().zip(results) {
            summary = match result {
                Ok(Some(exported)) => summary.with_exported(exported),
                Ok(None) => summary.with_duplicate(),
                Err(AppError::Cancelled) => {
                    cancelled = true;
                    summary
                }
                Err(e) => {
                    log::error!("Failed to export page {} '{}': {}", page.id, page.title, e);
                    summary.with_failed(FailedPage {
                        id: page.id.clone(),
                        title: page.title.clone(),
                        error: e.to_string(),
                    })
                }
            };
        }

        if cancelled {
            return Err(AppError::Cancelled);
        }
        Ok(summary)
    }

    /// One page export holding a limiter slot. The slot is kept through the
    /// configured delay so the request rate stays bounded.
    async fn export_in_slot(&self, page: &Page) -> Result<Option<ExportedPage>, AppError> {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
            permit = self.limiter.acquire() => permit.map_err(|e| AppError::InternalError {
                message: "export limiter closed".to_string(),
                source: Some(Box::new(e)),
            })?,
        };

        if !self.exported.insert(page.id.clone()) {
            log::debug!("Page {} already exported in this run", page.id);
            return Ok(None);
        }

        let outcome = self.write_page(page).await;

        if !self.config.delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(self.config.delay) => {}
            }
        }

        outcome.map(Some)
    }

    /// Writes one page's documents and assets into its directory.
    pub async fn write_page(&self, page: &Page) -> Result<ExportedPage, AppError> {
        let directory = self.claim_directory(page);
        log::debug!("Writing page {} to {}", page.id, directory.display());

        let mut bytes_written = 0;
        let mut document = None;

        if self.config.format.writes_markdown() {
            let body = formatting::convert(&page.body);
            let path = directory.join(MARKDOWN_FILE);
            bytes_written +=
                write_file(&path, render_markdown_document(page, &body), &self.cancel).await?;
            document = Some(path);
        }

        if self.config.format.writes_html() {
            let path = directory.join(HTML_FILE);
            bytes_written += write_file(&path, render_html_document(page)?, &self.cancel).await?;
            document.get_or_insert(path);
        }

        let assets = self.download_assets(page, &directory).await?;

        log::info!("Exported '{}' ({})", page.title, page.id);
        Ok(ExportedPage {
            id: page.id.clone(),
            title: page.title.clone(),
            ancestor_titles: page.ancestors.iter().map(|a| a.title.clone()).collect(),
            document: document.unwrap_or_else(|| directory.clone()),
            directory,
            assets_downloaded: assets.downloaded,
            assets_failed: assets.failed,
            bytes_written,
        })
    }

    async fn download_assets(&self, page: &Page, directory: &Path) -> Result<AssetTally, AppError> {
        let selection = AssetSelection {
            images: self.config.include_images,
            attachments: self.config.include_attachments,
        };
        let mut tally = AssetTally::default();
        if !selection.any() {
            return Ok(tally);
        }

        let assets_dir = directory.join(ASSETS_DIR);
        for asset in extract_assets(&page.id, &page.body, selection) {
            match self.download_asset(&asset, &assets_dir).await {
                Ok(()) => tally.downloaded += 1,
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    log::warn!(
                        "Skipping asset {} of page '{}': {}",
                        asset.url,
                        page.title,
                        e
                    );
                    tally.failed += 1;
                }
            }
        }
        Ok(tally)
    }

    async fn download_asset(
        &self,
        asset: &AssetReference,
        assets_dir: &Path,
    ) -> Result<(), AppError> {
        let bytes = self.repository.get_asset(&asset.url).await?;
        write_file(&assets_dir.join(&asset.file_name), bytes, &self.cancel).await?;
        Ok(())
    }

    /// The page's directory, made unique within the run. A page whose
    /// directory is taken by a different page gets its id appended.
    fn claim_directory(&self, page: &Page) -> PathBuf {
        let preferred = page_directory(&self.config.output_dir, page, self.config.preserve_hierarchy);
        if self.claim(&preferred, &page.id) {
            return preferred;
        }

        let suffix = format!(" ({})", page.id);
        let stem: String = sanitize_path_segment(&page.title)
            .chars()
            .take(MAX_PATH_SEGMENT_LEN.saturating_sub(suffix.chars().count()))
            .collect();
        let fallback = preferred.with_file_name(format!("{}{}", stem.trim_end(), suffix));
        log::warn!(
            "{} is already used by another page; writing page {} to {}",
            preferred.display(),
            page.id,
            fallback.display()
        );
        self.claim(&fallback, &page.id);
        fallback
    }

    fn claim(&self, directory: &Path, id: &PageId) -> bool {
        match self.claimed_dirs.entry(directory.to_path_buf()) {
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
                true
            }
            Entry::Occupied(owner) => owner.get() == id,
        }
    }
}
