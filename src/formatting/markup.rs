// src/formatting/markup.rs
//! Low-level scanning of stored markup.
//!
//! Stored pages are XHTML with namespaced macro elements. These helpers find
//! elements by tag name with proper nesting, skipping CDATA sections and
//! comments, without building a full document tree.

use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;

/// One element located in a markup string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element<'a> {
    /// Byte offset of the opening `<`.
    pub start: usize,
    /// Byte offset just past the closing tag.
    pub end: usize,
    /// The full opening tag, e.g. `<div class="x">`.
    pub open_tag: &'a str,
    /// Everything between the opening and closing tag; empty when self-closing.
    pub inner: &'a str,
}

impl Element<'_> {
    pub fn attr(&self, name: &str) -> Option<String> {
        attribute(self.open_tag, name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }
}

enum Token {
    Open { end: usize, self_closing: bool },
    Close { end: usize },
}

/// Finds the first `tag` element starting at or after `from`.
///
/// Returns an error for an opening tag that is never closed.
pub fn next_element<'a>(
    markup: &'a str,
    tag: &str,
    from: usize,
) -> Result<Option<Element<'a>>, AppError> {
    let mut pos = from;
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut open_end = 0usize;

    while let Some(offset) = markup[pos..].find('<') {
        let lt = pos + offset;
        let rest = &markup[lt..];

        if rest.starts_with("<![CDATA[") {
            pos = skip_past(markup, lt, "]]>")?;
            continue;
        }
        if rest.starts_with("<!--") {
            pos = skip_past(markup, lt, "-->")?;
            continue;
        }

        match classify(markup, lt, tag)? {
            Some(Token::Open { end, self_closing }) => {
                if depth == 0 {
                    start = lt;
                    open_end = end;
                    if self_closing {
                        return Ok(Some(Element {
                            start,
                            end,
                            open_tag: &markup[start..end],
                            inner: "",
                        }));
                    }
                    depth = 1;
                } else if !self_closing {
                    depth += 1;
                }
                pos = end;
            }
            Some(Token::Close { end }) => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Some(Element {
                            start,
                            end,
                            open_tag: &markup[start..open_end],
                            inner: &markup[open_end..lt],
                        }));
                    }
                }
                pos = end;
            }
            None => pos = lt + 1,
        }
    }

    if depth > 0 {
        return Err(AppError::Conversion(format!(
            "unterminated <{}> element at byte {}",
            tag, start
        )));
    }
    Ok(None)
}

/// All top-level `tag` elements of `markup`, in document order.
pub fn elements<'a>(markup: &'a str, tag: &str) -> Result<Vec<Element<'a>>, AppError> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(element) = next_element(markup, tag, pos)? {
        pos = element.end;
        found.push(element);
    }
    Ok(found)
}

/// Rewrites `tag` elements through `rewrite`.
///
/// When `rewrite` declines an element (returns `None`) its inner markup is
/// searched for further matches, so nested elements are reached too.
pub fn rewrite_elements<F>(markup: &str, tag: &str, rewrite: &mut F) -> Result<String, AppError>
where
    F: FnMut(&Element<'_>) -> Result<Option<String>, AppError>,
{
    let mut out = String::with_capacity(markup.len());
    let mut pos = 0;

    while let Some(element) = next_element(markup, tag, pos)? {
        out.push_str(&markup[pos..element.start]);
        match rewrite(&element)? {
            Some(replacement) => out.push_str(&replacement),
            None if element.inner.is_empty() => out.push_str(&markup[element.start..element.end]),
            None => {
                let inner_end = element.start + element.open_tag.len() + element.inner.len();
                out.push_str(element.open_tag);
                out.push_str(&rewrite_elements(element.inner, tag, rewrite)?);
                out.push_str(&markup[inner_end..element.end]);
            }
        }
        pos = element.end;
    }

    out.push_str(&markup[pos..]);
    Ok(out)
}

fn classify(markup: &str, lt: usize, tag: &str) -> Result<Option<Token>, AppError> {
    let rest = &markup[lt + 1..];

    let (closing, name_rest) = match rest.strip_prefix('/') {
        Some(r) => (true, r),
        None => (false, rest),
    };

    let Some(after_name) = strip_prefix_ignore_case(name_rest, tag) else {
        return Ok(None);
    };
    // `<ac:parameter` must not match `<ac:parameters`
    if !after_name.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/') {
        return Ok(None);
    }

    let end = tag_end(markup, lt)?;
    if closing {
        Ok(Some(Token::Close { end }))
    } else {
        let self_closing = markup[..end - 1].trim_end().ends_with('/');
        Ok(Some(Token::Open { end, self_closing }))
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

/// Byte offset just past the `>` ending the tag that starts at `lt`.
fn tag_end(markup: &str, lt: usize) -> Result<usize, AppError> {
    let mut quote: Option<char> = None;
    for (i, c) in markup[lt..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Ok(lt + i + 1),
            _ => {}
        }
    }
    Err(AppError::Conversion(format!(
        "unterminated tag at byte {}",
        lt
    )))
}

fn skip_past(markup: &str, from: usize, terminator: &str) -> Result<usize, AppError> {
    markup[from..]
        .find(terminator)
        .map(|i| from + i + terminator.len())
        .ok_or_else(|| {
            AppError::Conversion(format!(
                "unterminated section at byte {} (expected '{}')",
                from, terminator
            ))
        })
}

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute regex is valid")
});

/// All attributes of an opening tag, entity-decoded, in source order.
pub fn attributes(open_tag: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(open_tag)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (caps[1].to_string(), decode_entities(value))
        })
        .collect()
}

pub fn attribute(open_tag: &str, name: &str) -> Option<String> {
    attributes(open_tag)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Tag name of an opening tag, e.g. `img` for `<img src="x"/>`.
pub fn tag_name(open_tag: &str) -> &str {
    let name = open_tag.trim_start_matches('<');
    let end = name
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(name.len());
    &name[..end]
}

/// Rebuilds an opening tag from a name and attribute list.
pub fn build_tag(name: &str, attrs: &[(String, String)], self_closing: bool) -> String {
    let mut tag = format!("<{}", name);
    for (key, value) in attrs {
        tag.push_str(&format!(" {}=\"{}\"", key, escape_html(value)));
    }
    tag.push_str(if self_closing { " />" } else { ">" });
    tag
}

/// Text content of `markup`: CDATA unwrapped, tags dropped, entities decoded.
pub fn text_content(markup: &str) -> String {
    static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"));
    static CDATA: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("cdata regex is valid"));

    let mut out = String::new();
    let mut last = 0;
    for caps in CDATA.captures_iter(markup) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&decode_entities(&TAG.replace_all(&markup[last..whole.start()], "")));
        out.push_str(&caps[1]);
        last = whole.end();
    }
    out.push_str(&decode_entities(&TAG.replace_all(&markup[last..], "")));
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}
