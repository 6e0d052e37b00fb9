// src/api/hierarchy.rs
//! Discovery of a page and all of its descendants.

use super::WikiRepository;
use crate::error::AppError;
use crate::model::Page;
use crate::types::PageId;
use std::collections::HashSet;

/// Depth-first walker over the child relation of a [`WikiRepository`].
///
/// Traversal uses an explicit stack. Every page id is visited at most once;
/// duplicate child links and cycles are skipped.
pub struct HierarchyWalker<'a, R: WikiRepository + ?Sized> {
    repository: &'a R,
    visited: HashSet<PageId>,
}

impl<'a, R: WikiRepository + ?Sized> HierarchyWalker<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        Self {
            repository,
            visited: HashSet::new(),
        }
    }

    /// Returns the root followed by its descendants in pre-order.
    ///
    /// Children are visited in provider order. A missing root yields an
    /// empty list.
    pub async fn walk(mut self, root: &PageId) -> Result<Vec<Page>, AppError> {
        let Some(root_page) = self.repository.get_page(root).await? else {
            log::warn!("Hierarchy root {} not found", root);
            return Ok(Vec::new());
        };

        let mut pages = Vec::new();
        let mut stack = vec![root_page];

        while let Some(page) = stack.pop() {
            // Check and mark in one step
            if !self.visited.insert(page.id.clone()) {
                log::debug!("Skipping already visited page {}", page.id);
                continue;
            }

            let children = self.repository.list_page_children(&page.id).await?;
            log::debug!(
                "Visited '{}' ({}), {} children",
                page.title,
                page.id,
                children.len()
            );
            pages.push(page);

            // Reverse so the first child is popped first
            stack.extend(
                children
                    .into_iter()
                    .rev()
                    .filter(|child| !self.visited.contains(&child.id)),
            );
        }

        log::info!("Hierarchy under {} has {} pages", root, pages.len());
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageVersion, Space};
    use crate::types::SpaceKey;
    use std::collections::HashMap;

    /// Child links only; every id present in `children` or as a key exists.
    struct TreeRepo {
        children: HashMap<&'static str, Vec<&'static str>>,
    }

    fn page(id: &str) -> Page {
        Page {
            id: PageId::from_api(id),
            title: format!("Page {}", id),
            kind: "page".to_string(),
            status: "current".to_string(),
            space: None,
            body: String::new(),
            version: PageVersion::default(),
            ancestors: Vec::new(),
        }
    }

    #[async_trait::async_trait]
    impl WikiRepository for TreeRepo {
        async fn list_spaces(&self) -> Result<Vec<Space>, AppError> {
            Ok(Vec::new())
        }
        async fn get_space(&self, _key: &SpaceKey) -> Result<Option<Space>, AppError> {
            Ok(None)
        }
        async fn list_space_pages(&self, _key: &SpaceKey) -> Result<Vec<Page>, AppError> {
            Ok(Vec::new())
        }
        async fn get_page(&self, id: &PageId) -> Result<Option<Page>, AppError> {
            let known = self.children.contains_key(id.as_str())
                || self.children.values().flatten().any(|c| *c == id.as_str());
            Ok(known.then(|| page(id.as_str())))
        }
        async fn list_page_children(&self, id: &PageId) -> Result<Vec<Page>, AppError> {
            Ok(self
                .children
                .get(id.as_str())
                .map(|ids| ids.iter().map(|c| page(c)).collect())
                .unwrap_or_default())
        }
        async fn get_asset(&self, _url: &str) -> Result<Vec<u8>, AppError> {
            Ok(Vec::new())
        }
    }

    fn ids(pages: &[Page]) -> Vec<&str> {
        pages.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_preorder_in_provider_order() {
        let repo = TreeRepo {
            children: HashMap::from([("1", vec!["2", "3"]), ("2", vec!["4"])]),
        };
        let pages = repo.get_hierarchy(&PageId::from_api("1")).await.unwrap();
        assert_eq!(ids(&pages), vec!["1", "2", "4", "3"]);
    }

    #[tokio::test]
    async fn test_cycle_and_duplicate_links_terminate() {
        let repo = TreeRepo {
            children: HashMap::from([
                ("1", vec!["2", "3", "2"]),
                ("2", vec!["1", "3"]),
                ("3", vec!["1"]),
            ]),
        };
        let pages = HierarchyWalker::new(&repo)
            .walk(&PageId::from_api("1"))
            .await
            .unwrap();
        assert_eq!(ids(&pages), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let repo = TreeRepo {
            children: HashMap::new(),
        };
        let pages = repo.get_hierarchy(&PageId::from_api("404")).await.unwrap();
        assert!(pages.is_empty());
    }
}
