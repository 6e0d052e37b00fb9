use super::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a wiki page (Confluence content id).
///
/// Accepts a bare numeric id or any page URL that carries one, e.g.
/// `https://acme.atlassian.net/wiki/spaces/ENG/pages/123456/Title` or
/// `.../pages/viewpage.action?pageId=123456`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Parses a page id from a raw id or a page URL.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let cleaned = input.trim().trim_end_matches('/');

        if cleaned.is_empty() {
            return Err(ValidationError::InvalidId("page id cannot be empty".to_string()));
        }

        if cleaned.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Self(cleaned.to_string()));
        }

        if cleaned.starts_with("http://") || cleaned.starts_with("https://") {
            return Self::extract_from_url(cleaned);
        }

        Err(ValidationError::InvalidId(format!(
            "Could not parse page id from: {}",
            input
        )))
    }

    /// Wraps an id reported by the API without validation.
    pub(crate) fn from_api(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn extract_from_url(url: &str) -> Result<Self, ValidationError> {
        static PAGE_ID_IN_URL: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?:[?&]pageId=|/pages/)(\d+)(?:[/?#&]|$)")
                .expect("page id regex is valid")
        });

        PAGE_ID_IN_URL
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| ValidationError::InvalidId(format!("No page id found in URL: {}", url)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External, tenant-unique key of a space (e.g. `ENG`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceKey(String);

impl SpaceKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into().trim().to_string();

        if key.is_empty() {
            return Err(ValidationError::EmptyField("space key"));
        }

        if key.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(ValidationError::InvalidId(format!(
                "Space key may not contain whitespace or '/': {}",
                key
            )));
        }

        Ok(Self(key))
    }

    pub(crate) fn from_api(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Space keys are matched case-insensitively everywhere a user supplies one.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for SpaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_parsing() {
        assert_eq!(PageId::parse("123456").unwrap().as_str(), "123456");
        assert_eq!(PageId::parse("  42 ").unwrap().as_str(), "42");

        let id = PageId::parse("https://acme.atlassian.net/wiki/spaces/ENG/pages/98765/Release+Notes")
            .unwrap();
        assert_eq!(id.as_str(), "98765");

        let id = PageId::parse(
            "https://wiki.example.com/pages/viewpage.action?pageId=555&focusedCommentId=1",
        )
        .unwrap();
        assert_eq!(id.as_str(), "555");
    }

    #[test]
    fn test_invalid_page_ids() {
        assert!(PageId::parse("").is_err());
        assert!(PageId::parse("not-an-id").is_err());
        assert!(PageId::parse("https://acme.atlassian.net/wiki/spaces/ENG").is_err());
    }

    #[test]
    fn test_space_key() {
        let key = SpaceKey::new(" ENG ").unwrap();
        assert_eq!(key.as_str(), "ENG");
        assert!(key.matches("eng"));
        assert!(!key.matches("ops"));
        assert!(SpaceKey::new("").is_err());
        assert!(SpaceKey::new("A B").is_err());
    }
}
