//! Read-only mirror of the wiki's content model.
//!
//! Records are materialized from API responses and never mutated by the
//! exporter.

use crate::types::{PageId, SpaceKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A top-level content container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub key: SpaceKey,
    pub name: String,
    pub kind: String,
    pub status: String,
}

impl Space {
    /// Name used for the space's output directory and index headings.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.key.as_str()
        } else {
            &self.name
        }
    }
}

/// The owning space as embedded in a page response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceRef {
    pub key: SpaceKey,
    pub name: String,
}

/// Version information of a page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageVersion {
    pub number: u32,
    pub when: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

/// One entry of a page's ancestor chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ancestor {
    pub id: PageId,
    pub title: String,
}

/// A content node within a space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub title: String,
    pub kind: String,
    pub status: String,
    pub space: Option<SpaceRef>,
    /// Stored markup (macro elements mixed with HTML).
    pub body: String,
    pub version: PageVersion,
    /// Root-to-parent order.
    pub ancestors: Vec<Ancestor>,
}

impl Page {
    /// The direct parent, i.e. the last ancestor.
    pub fn parent(&self) -> Option<&PageId> {
        self.ancestors.last().map(|a| &a.id)
    }

    /// Number of ancestors above this page.
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Space name if known, falling back to the key.
    pub fn space_name(&self) -> Option<&str> {
        self.space.as_ref().map(|s| {
            if s.name.trim().is_empty() {
                s.key.as_str()
            } else {
                s.name.as_str()
            }
        })
    }
}
