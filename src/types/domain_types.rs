// src/types/domain_types.rs
//! Domain-specific newtypes for type safety and validation.

use super::ValidationError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use url::Url;

/// Username + API token pair used for basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    token: String,
}

impl Credentials {
    /// Creates a credential pair with validation
    pub fn new(
        username: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let username = username.into();
        let token = token.into();

        if username.trim().is_empty() {
            return Err(ValidationError::EmptyField("username"));
        }

        if token.trim().is_empty() {
            return Err(ValidationError::InvalidApiToken {
                reason: "API token cannot be empty".to_string(),
            });
        }

        Ok(Self { username, token })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The `Authorization` header value for this credential pair.
    pub fn basic_auth_header(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.token));
        format!("Basic {}", encoded)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the token
        write!(f, "{}:***", self.username)
    }
}

/// Tenant root URL (e.g. `https://acme.atlassian.net`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    pub fn parse(url: &str) -> Result<Self, ValidationError> {
        let parsed = Url::parse(url.trim()).map_err(|e| ValidationError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: "Only HTTP and HTTPS URLs are supported".to_string(),
            });
        }

        Ok(Self(parsed))
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Root of the wiki application, always ending in `/wiki` and never in `/`.
    pub fn wiki_root(&self) -> String {
        let trimmed = self.0.as_str().trim_end_matches('/');
        if trimmed.ends_with("/wiki") {
            trimmed.to_string()
        } else {
            format!("{}/wiki", trimmed)
        }
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
