// src/constants.rs
//! Domain constants that define the operational boundaries of the exporter.
//!
//! Each constant is named for the domain concept it constrains, not its
//! technical role.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Wiki API boundaries
// ---------------------------------------------------------------------------

/// How many records are requested per page of a paginated listing.
pub const WIKI_API_PAGE_SIZE: u32 = 50;

/// Expansions requested with every full page fetch.
pub const PAGE_EXPANSIONS: &str = "body.storage,version,ancestors,space";

/// Overall timeout for a single HTTP request.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum characters shown when previewing error response bodies.
pub const ERROR_BODY_PREVIEW_LENGTH: usize = 200;

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

/// Attempts per request before a transient failure becomes terminal.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubles on each further attempt.
pub const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Upper bound for a single backoff delay.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(8);

/// Consecutive transient failures that open the circuit breaker.
pub const BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// How long the breaker stays open before letting a trial request through.
pub const BREAKER_COOLDOWN: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Output boundaries
// ---------------------------------------------------------------------------

/// Maximum length, in characters, of any path segment derived from a title.
pub const MAX_PATH_SEGMENT_LEN: usize = 100;

/// Images downloaded per page at most.
pub const MAX_IMAGES_PER_PAGE: usize = 10;

/// Attachment links downloaded per page at most.
pub const MAX_ATTACHMENTS_PER_PAGE: usize = 10;

/// Directory, relative to a page's own directory, that holds its assets.
pub const ASSETS_DIR: &str = "assets";

/// Timestamp format used in front matter.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Export defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_OUTPUT_DIR: &str = "./export";

/// Pages exported at the same time.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Pause after each page export, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Usage reporting
// ---------------------------------------------------------------------------

/// Time budget for the fire-and-forget usage report.
pub const USAGE_REPORT_TIMEOUT: Duration = Duration::from_secs(5);
