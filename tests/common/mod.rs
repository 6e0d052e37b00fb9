// tests/common/mod.rs
//! Shared fixtures: an in-memory wiki and record builders.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiki2md::{
    Ancestor, AppError, Page, PageId, PageVersion, Space, SpaceKey, SpaceRef, WikiRepository,
};

/// A wiki held in memory. Asset downloads are instrumented so tests can
/// observe how many run at once.
#[derive(Default)]
pub struct InMemoryWiki {
    spaces: Vec<Space>,
    pages: Vec<Page>,
    children: HashMap<String, Vec<String>>,
    assets: HashMap<String, Vec<u8>>,
    asset_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    asset_requests: AtomicUsize,
}

impl InMemoryWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_space(mut self, space: Space) -> Self {
        self.spaces.push(space);
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.pages.push(page);
        self
    }

    pub fn with_children(mut self, parent: &str, children: &[&str]) -> Self {
        self.children.insert(
            parent.to_string(),
            children.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn with_asset(mut self, url: &str, bytes: &[u8]) -> Self {
        self.assets.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Every asset request takes this long.
    pub fn with_asset_delay(mut self, delay: Duration) -> Self {
        self.asset_delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn asset_requests(&self) -> usize {
        self.asset_requests.load(Ordering::SeqCst)
    }

    fn find_page(&self, id: &str) -> Option<Page> {
        self.pages.iter().find(|p| p.id.as_str() == id).cloned()
    }
}

#[async_trait]
impl WikiRepository for InMemoryWiki {
    async fn list_spaces(&self) -> Result<Vec<Space>, AppError> {
        Ok(self.spaces.clone())
    }

    async fn get_space(&self, key: &SpaceKey) -> Result<Option<Space>, AppError> {
        Ok(self.spaces.iter().find(|s| s.key.matches(key.as_str())).cloned())
    }

    async fn list_space_pages(&self, key: &SpaceKey) -> Result<Vec<Page>, AppError> {
        Ok(self
            .pages
            .iter()
            .filter(|p| p.space.as_ref().is_some_and(|s| s.key == *key))
            .cloned()
            .collect())
    }

    async fn get_page(&self, id: &PageId) -> Result<Option<Page>, AppError> {
        Ok(self.find_page(id.as_str()))
    }

    async fn list_page_children(&self, id: &PageId) -> Result<Vec<Page>, AppError> {
        Ok(self
            .children
            .get(id.as_str())
            .into_iter()
            .flatten()
            .filter_map(|child| self.find_page(child))
            .collect())
    }

    async fn get_asset(&self, url: &str) -> Result<Vec<u8>, AppError> {
        self.asset_requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.asset_delay.is_zero() {
            tokio::time::sleep(self.asset_delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.assets
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::MalformedResponse(format!("no asset at {}", url)))
    }
}

pub fn space(key: &str, name: &str) -> Space {
    Space {
        id: format!("id-{}", key.to_lowercase()),
        key: SpaceKey::new(key).unwrap(),
        name: name.to_string(),
        kind: "global".to_string(),
        status: "current".to_string(),
    }
}

/// A page in `space`; `ancestors` are `(id, title)` pairs from the top down.
pub fn page(id: &str, title: &str, space: &Space, ancestors: &[(&str, &str)], body: &str) -> Page {
    Page {
        id: PageId::parse(id).unwrap(),
        title: title.to_string(),
        kind: "page".to_string(),
        status: "current".to_string(),
        space: Some(SpaceRef {
            key: space.key.clone(),
            name: space.name.clone(),
        }),
        body: body.to_string(),
        version: PageVersion {
            number: 1,
            when: None,
            author: None,
        },
        ancestors: ancestors
            .iter()
            .map(|(id, title)| Ancestor {
                id: PageId::parse(id).unwrap(),
                title: title.to_string(),
            })
            .collect(),
    }
}
