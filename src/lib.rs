// src/lib.rs
//! wiki2md library: exports wiki spaces and page trees into static
//! Markdown/HTML directories.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling**: `AppError`, `ApiErrorCode`, `ValidationError`
//! - **Configuration**: `PipelineConfig`, `ExportConfig`, `ExportScope`
//! - **Domain model**: `Space`, `Page`, `PageVersion`, `Ancestor`
//! - **Domain types**: `PageId`, `SpaceKey`, `BaseUrl`, `Credentials`
//! - **API client**: `WikiRepository`, `ConfluenceHttpClient`, `HierarchyWalker`
//! - **Conversion**: `convert`, `render_markdown_document`, `render_html_document`
//! - **Export**: `Exporter`, `ExportSummary`, `SpaceFilter`
//! - **Usage reporting**: `Reporter`, `NoopReporter`, `HttpUsageReporter`

mod analytics;
mod api;
mod config;
mod constants;
mod error;
mod error_recovery;
mod export;
mod formatting;
mod model;
mod output;
mod types;

// --- Error Handling ---
pub use crate::error::{ApiErrorCode, AppError};
pub use crate::types::ValidationError;

// --- Configuration ---
pub use crate::config::{
    Command, CommandLineInput, ConnectionSettings, ExportConfig, ExportScope, OutputFormat,
    PipelineConfig,
};

// --- Domain Model ---
pub use crate::model::{Ancestor, Page, PageVersion, Space, SpaceRef};

// --- Domain Types ---
pub use crate::types::{BaseUrl, Credentials, PageId, SpaceKey};

// --- API Client ---
pub use crate::api::{
    BreakerState, CircuitBreaker, ConfluenceHttpClient, HierarchyWalker, PageCursor,
    PaginationStrategy, WikiRepository,
};
pub use crate::error_recovery::RetryPolicy;

// --- Conversion ---
pub use crate::formatting::{
    convert, render_html_document, render_markdown_document, AdmonitionKind, Macro,
};
pub use crate::output::paths::sanitize_path_segment;

// --- Export ---
pub use crate::export::{
    ExportStats, ExportSummary, ExportedPage, ExportedSpace, Exporter, FailedPage, SpaceFilter,
};

// --- Usage Reporting ---
pub use crate::analytics::{
    reporter_for, spawn_report, HttpUsageReporter, NoopReporter, Reporter, UsageReport,
};
