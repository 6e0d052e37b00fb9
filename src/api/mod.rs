// src/api/mod.rs
//! Wiki API interaction: the ability to read spaces, pages and assets.
//!
//! Business logic depends on the [`WikiRepository`] trait, never on HTTP
//! details; [`ConfluenceHttpClient`] is the production implementation.

pub mod circuit_breaker;
pub mod client;
pub mod hierarchy;
pub mod pagination;
pub mod responses;

use crate::error::AppError;
use crate::model::{Page, Space};
use crate::types::{PageId, SpaceKey};

/// Read access to a wiki tenant.
///
/// Lookups return `Ok(None)` when the target does not exist, so callers can
/// distinguish absence from failure.
#[async_trait::async_trait]
pub trait WikiRepository: Send + Sync {
    /// All spaces, in server order.
    async fn list_spaces(&self) -> Result<Vec<Space>, AppError>;
    async fn get_space(&self, key: &SpaceKey) -> Result<Option<Space>, AppError>;
    /// Every page of a space, each with its stored body.
    async fn list_space_pages(&self, key: &SpaceKey) -> Result<Vec<Page>, AppError>;
    async fn get_page(&self, id: &PageId) -> Result<Option<Page>, AppError>;
    /// Direct children, each resolved to its full record.
    async fn list_page_children(&self, id: &PageId) -> Result<Vec<Page>, AppError>;
    /// Raw bytes of an image or attachment.
    async fn get_asset(&self, url: &str) -> Result<Vec<u8>, AppError>;

    /// The root page plus all transitive descendants, each exactly once.
    async fn get_hierarchy(&self, root: &PageId) -> Result<Vec<Page>, AppError> {
        HierarchyWalker::new(self).walk(root).await
    }
}

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use client::ConfluenceHttpClient;
pub use hierarchy::HierarchyWalker;
pub use pagination::{PageCursor, PaginationStrategy};
