// src/api/responses.rs
//! Wire shapes of the wiki REST API and their conversion into the domain model.

use crate::error::AppError;
use crate::model::{Ancestor, Page, PageVersion, Space, SpaceRef};
use crate::types::{PageId, SpaceKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(rename = "_links", default)]
    pub links: ListingLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingLinks {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpaceResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub space: Option<SpaceStub>,
    #[serde(default)]
    pub version: Option<VersionResponse>,
    #[serde(default)]
    pub ancestors: Vec<AncestorResponse>,
    #[serde(default)]
    pub body: Option<BodyResponse>,
}

/// Lightweight child entry; the full record is fetched separately.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentStub {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpaceStub {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionResponse {
    #[serde(default)]
    pub number: u32,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub when: Option<DateTime<Utc>>,
    #[serde(default)]
    pub by: Option<UserResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub public_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AncestorResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BodyResponse {
    #[serde(default)]
    pub storage: Option<StorageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageResponse {
    #[serde(default)]
    pub value: String,
}

/// Trait for converting wire types to domain types
pub trait ToDomain<T> {
    fn to_domain(self) -> Result<T, AppError>;
}

impl ToDomain<Space> for SpaceResponse {
    fn to_domain(self) -> Result<Space, AppError> {
        if self.key.trim().is_empty() {
            return Err(AppError::MalformedResponse(format!(
                "space {} has no key",
                self.id
            )));
        }
        Ok(Space {
            id: self.id,
            key: SpaceKey::from_api(self.key),
            name: self.name,
            kind: self.kind,
            status: self.status,
        })
    }
}

impl ToDomain<Page> for ContentResponse {
    fn to_domain(self) -> Result<Page, AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::MalformedResponse(
                "content record without an id".to_string(),
            ));
        }

        let version = self
            .version
            .map(|v| PageVersion {
                number: v.number,
                when: v.when,
                author: v.by.and_then(|u| u.display_name.or(u.public_name)),
            })
            .unwrap_or_default();

        Ok(Page {
            id: PageId::from_api(self.id),
            title: self.title,
            kind: self.kind,
            status: self.status,
            space: self.space.map(|s| SpaceRef {
                key: SpaceKey::from_api(s.key),
                name: s.name,
            }),
            body: self
                .body
                .and_then(|b| b.storage)
                .map(|s| s.value)
                .unwrap_or_default(),
            version,
            ancestors: self
                .ancestors
                .into_iter()
                .map(|a| Ancestor {
                    id: PageId::from_api(a.id),
                    title: a.title,
                })
                .collect(),
        })
    }
}

fn default_status() -> String {
    "current".to_string()
}

fn default_kind() -> String {
    "page".to_string()
}

/// Space ids are numbers in some API generations and strings in others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// Unparseable timestamps are dropped rather than failing the whole record.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match DateTime::parse_from_rfc3339(&s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            log::debug!("Ignoring unparseable timestamp '{}': {}", s, e);
            None
        }
    }))
}
