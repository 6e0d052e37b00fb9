// src/formatting/mod.rs
//! Turns stored wiki markup into Markdown and renders page documents.
//!
//! Conversion is a fixed pipeline: macro resolution, HTML normalization,
//! generic HTML to Markdown conversion, then cleanup.

pub mod document;
pub mod macros;
pub mod markdown;
pub mod markup;
pub mod normalize;
pub mod postprocess;

pub use document::{render_html_document, render_markdown_document};
pub use macros::{AdmonitionKind, Macro};

use crate::error::AppError;
use std::panic::{self, AssertUnwindSafe};

/// Converts stored markup to Markdown.
///
/// Never fails: if any stage errors, the raw markup is returned in a fenced
/// block headed by the failure reason, so one bad page cannot abort an export.
pub fn convert(markup: &str) -> String {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| try_convert(markup)));

    let error = match outcome {
        Ok(Ok(markdown)) => return markdown,
        Ok(Err(e)) => e.to_string(),
        Err(_) => "converter panicked".to_string(),
    };

    log::warn!("Falling back to raw markup: {}", error);
    conversion_fallback(markup, &error)
}

/// The conversion pipeline, surfacing the first error.
pub fn try_convert(markup: &str) -> Result<String, AppError> {
    let html = macros::resolve_macros(markup)?;
    let html = normalize::normalize(&html)?;
    let converted = markdown::html_to_markdown(&html);
    Ok(postprocess::clean_markdown(&converted))
}

fn conversion_fallback(markup: &str, reason: &str) -> String {
    let longest_run = markup
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);

    format!(
        "**Conversion failed:** {}\n\n{}html\n{}\n{}",
        reason,
        fence,
        markup.trim_end(),
        fence
    )
}
