// src/formatting/macros.rs
//! Resolution of macro elements and other storage-only elements into plain HTML.
//!
//! Runs before any other stage: the generic HTML converter knows nothing
//! about `ac:`/`ri:` elements and would drop them.

use super::markup::{self, escape_html, text_content, Element};
use crate::error::AppError;
use crate::output::paths::asset_link;
use std::fmt;

const MACRO_TAGS: [&str; 2] = ["ac:structured-macro", "ac:macro"];

/// Semantic kind of an admonition macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmonitionKind {
    Info,
    Note,
    Warning,
    Tip,
}

impl AdmonitionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "info" | "information" => Some(Self::Info),
            "note" => Some(Self::Note),
            "warning" => Some(Self::Warning),
            "tip" => Some(Self::Tip),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Note => "note",
            Self::Warning => "warning",
            Self::Tip => "tip",
        }
    }
}

impl fmt::Display for AdmonitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed macro. Every macro name maps to exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Macro {
    Code {
        language: Option<String>,
        body: String,
    },
    Admonition {
        kind: AdmonitionKind,
        title: Option<String>,
        /// Rich body, already resolved.
        body: String,
    },
    TableOfContents,
    Children,
    Include {
        page_title: Option<String>,
    },
    Excerpt {
        body: String,
    },
    Status {
        title: String,
        colour: Option<String>,
    },
    Unknown {
        name: String,
        parameters: Vec<(String, String)>,
    },
}

/// The raw parts of a macro element.
#[derive(Debug, Default)]
struct MacroParts {
    name: String,
    parameters: Vec<(String, String)>,
    plain_body: Option<String>,
    rich_body: Option<String>,
}

impl MacroParts {
    fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }
}

impl Macro {
    fn from_parts(parts: MacroParts) -> Self {
        let name = parts.name.to_ascii_lowercase();

        if let Some(kind) = AdmonitionKind::from_name(&name) {
            return Self::Admonition {
                kind,
                title: parts.parameter("title").map(str::to_string),
                body: parts.rich_body.unwrap_or_default(),
            };
        }

        match name.as_str() {
            "code" | "noformat" => Self::Code {
                language: parts.parameter("language").map(str::to_string),
                body: parts.plain_body.unwrap_or_default(),
            },
            "toc" | "table-of-contents" => Self::TableOfContents,
            "children" => Self::Children,
            "include" => Self::Include {
                // The default parameter of an include is unnamed
                page_title: parts
                    .parameter("")
                    .or_else(|| parts.parameter("page"))
                    .map(str::to_string),
            },
            "excerpt" => Self::Excerpt {
                body: parts.rich_body.unwrap_or_default(),
            },
            "status" => Self::Status {
                title: parts.parameter("title").unwrap_or_default().to_string(),
                colour: parts.parameter("colour").map(str::to_ascii_lowercase),
            },
            _ => Self::Unknown {
                name: parts.name,
                parameters: parts.parameters,
            },
        }
    }

    /// HTML that the generic converter turns into the intended Markdown.
    pub fn to_html(&self) -> String {
        match self {
            Self::Code { language, body } => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                escape_html(language.as_deref().unwrap_or("text")),
                escape_html(body)
            ),
            Self::Admonition { kind, title, body } => match title {
                Some(title) => format!(
                    "<blockquote class=\"admonition-{}\"><p><strong>{}</strong></p>{}</blockquote>",
                    kind,
                    escape_html(title),
                    body
                ),
                None => {
                    let label = format!("<strong>{}:</strong>", kind.as_str().to_uppercase());
                    let body = body.trim_start();
                    let inner = match body.strip_prefix("<p>") {
                        Some(rest) => format!("<p>{} {}", label, rest),
                        None => format!("<p>{}</p>{}", label, body),
                    };
                    format!("<blockquote class=\"admonition-{}\">{}</blockquote>", kind, inner)
                }
            },
            Self::TableOfContents => "<p><em>[Table of Contents]</em></p>".to_string(),
            Self::Children => "<p><em>[Child pages are exported as subdirectories]</em></p>".to_string(),
            Self::Include { page_title } => match page_title {
                Some(title) => format!("<p><em>[Included page: {}]</em></p>", escape_html(title)),
                None => "<p><em>[Included page]</em></p>".to_string(),
            },
            Self::Excerpt { body } => body.clone(),
            Self::Status { title, colour } => format!(
                "<span class=\"badge badge-{}\">{}</span>",
                escape_html(colour.as_deref().unwrap_or("grey")),
                escape_html(title)
            ),
            Self::Unknown { name, parameters } => {
                let params = parameters
                    .iter()
                    .filter(|(key, _)| !key.is_empty())
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect::<Vec<_>>()
                    .join(", ");
                let label = if params.is_empty() {
                    format!("[Macro: {}]", name)
                } else {
                    format!("[Macro: {} - {}]", name, params)
                };
                format!("<p><em>{}</em></p>", escape_html(&label))
            }
        }
    }
}

/// Replaces every macro element (nested ones included) with its HTML rendition,
/// then resolves storage-format images and links.
pub fn resolve_macros(markup: &str) -> Result<String, AppError> {
    let mut resolved = markup.to_string();
    for tag in MACRO_TAGS {
        resolved = markup::rewrite_elements(&resolved, tag, &mut |element| {
            let parsed = parse_macro(element)?;
            log::trace!("Resolved macro {:?}", parsed);
            Ok(Some(parsed.to_html()))
        })?;
    }

    let resolved = resolve_images(&resolved)?;
    resolve_links(&resolved)
}

/// Parses one macro element; macros nested in its rich body are resolved first.
pub fn parse_macro(element: &Element<'_>) -> Result<Macro, AppError> {
    let mut parts = MacroParts {
        name: element.attr("ac:name").unwrap_or_default(),
        ..Default::default()
    };

    // Only direct children belong to this macro; skip over nested macros
    let inner = element.inner;
    let mut pos = 0;
    while let Some(offset) = inner[pos..].find("<ac:") {
        let at = pos + offset;
        let rest = &inner[at..];

        if let Some(tag) = ["ac:parameter", "ac:plain-text-body", "ac:rich-text-body"]
            .into_iter()
            .chain(MACRO_TAGS)
            .find(|tag| rest[1..].starts_with(tag) && is_tag_boundary(&rest[1 + tag.len()..]))
        {
            let Some(child) = markup::next_element(inner, tag, at)? else {
                break;
            };
            match tag {
                "ac:parameter" => parts.parameters.push((
                    child.attr("ac:name").unwrap_or_default(),
                    parameter_value(child.inner),
                )),
                "ac:plain-text-body" => parts.plain_body = Some(text_content(child.inner)),
                "ac:rich-text-body" => parts.rich_body = Some(resolve_macros(child.inner)?),
                _ => {}
            }
            pos = child.end;
        } else {
            pos = at + 4;
        }
    }

    Ok(Macro::from_parts(parts))
}

fn is_tag_boundary(rest: &str) -> bool {
    rest.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/')
}

/// Parameter values are usually text, but page references carry the title
/// in an attribute.
fn parameter_value(inner: &str) -> String {
    if let Ok(Some(page)) = markup::next_element(inner, "ri:page", 0) {
        if let Some(title) = page.attr("ri:content-title") {
            return title;
        }
    }
    text_content(inner).trim().to_string()
}

/// `<ac:image>` with an attachment or URL resource becomes an `<img>`.
fn resolve_images(markup: &str) -> Result<String, AppError> {
    markup::rewrite_elements(markup, "ac:image", &mut |element| {
        let alt = element
            .attr("ac:alt")
            .or_else(|| element.attr("ac:title"))
            .unwrap_or_default();

        let src = if let Some(attachment) = markup::next_element(element.inner, "ri:attachment", 0)? {
            attachment.attr("ri:filename").map(|f| asset_link(&f))
        } else if let Some(url) = markup::next_element(element.inner, "ri:url", 0)? {
            url.attr("ri:value")
        } else {
            None
        };

        Ok(Some(match src {
            Some(src) => format!(
                "<img src=\"{}\" alt=\"{}\" />",
                escape_html(&src),
                escape_html(&alt)
            ),
            None => String::new(),
        }))
    })
}

/// `<ac:link>` becomes its visible text; page references are bracketed and
/// attachment links point at the page's assets directory.
fn resolve_links(markup: &str) -> Result<String, AppError> {
    markup::rewrite_elements(markup, "ac:link", &mut |element| {
        let body = match markup::next_element(element.inner, "ac:link-body", 0)? {
            Some(body) => body.inner.to_string(),
            None => match markup::next_element(element.inner, "ac:plain-text-link-body", 0)? {
                Some(body) => escape_html(&text_content(body.inner)),
                None => String::new(),
            },
        };

        if let Some(attachment) = markup::next_element(element.inner, "ri:attachment", 0)? {
            let filename = attachment.attr("ri:filename").unwrap_or_default();
            let text = if body.is_empty() {
                escape_html(&filename)
            } else {
                body
            };
            return Ok(Some(format!(
                "<a href=\"{}\">{}</a>",
                escape_html(&asset_link(&filename)),
                text
            )));
        }

        // Page references stay annotated as `[text]` until cross links are resolved
        if let Some(page) = markup::next_element(element.inner, "ri:page", 0)? {
            let text = if body.is_empty() {
                escape_html(&page.attr("ri:content-title").unwrap_or_default())
            } else {
                body
            };
            return Ok(Some(format!("[{}]", text)));
        }

        Ok(Some(body))
    })
}
