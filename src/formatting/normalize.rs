// src/formatting/normalize.rs
//! HTML normalization passes run between macro resolution and Markdown
//! conversion.
//!
//! Each pass rewrites one construct of rendered wiki HTML into the plain
//! form the Markdown converter understands. Running a pass twice changes
//! nothing.

use super::macros::AdmonitionKind;
use super::markup::{self, attributes, build_tag, Element};
use crate::error::AppError;
use crate::output::paths::asset_link;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const TABLE_CLASS: &str = "wiki-table";
pub const HEADER_ROW_CLASS: &str = "header-row";

static IMG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("img regex is valid"));
static ANCHOR_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<a\b[^>]*>").expect("anchor regex is valid"));
static PAGE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:viewpage\.action\?(?:[^#]*&)?pageId=|/pages/)(\d+)")
        .expect("page link regex is valid")
});
static BRUSH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"brush:\s*([\w+#-]+)").expect("brush regex is valid"));
static LOZENGE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<span\b[^>]*class="[^"]*\bstatus-macro\b[^"]*"[^>]*>"#)
        .expect("lozenge regex is valid")
});

/// Runs every normalization pass in order.
pub fn normalize(html: &str) -> Result<String, AppError> {
    let html = normalize_tables(html)?;
    let html = normalize_code_panels(&html)?;
    let html = rewrite_images(&html);
    let html = annotate_page_links(&html);
    let html = normalize_status_badges(&html);
    normalize_panels(&html)
}

/// Tags every table with [`TABLE_CLASS`] and marks its first row that
/// contains header cells with [`HEADER_ROW_CLASS`].
pub fn normalize_tables(html: &str) -> Result<String, AppError> {
    markup::rewrite_elements(html, "table", &mut |table| {
        let open = with_class(table.open_tag, TABLE_CLASS);
        let inner = normalize_tables(table.inner)?;

        let mut marked = false;
        let inner = markup::rewrite_elements(&inner, "tr", &mut |row| {
            if marked || !row.inner.to_ascii_lowercase().contains("<th") {
                // Rows are never nested, so don't descend
                return Ok(Some(element_source(row)));
            }
            marked = true;
            Ok(Some(format!(
                "{}{}</tr>",
                with_class(row.open_tag, HEADER_ROW_CLASS),
                row.inner
            )))
        })?;

        Ok(Some(format!("{}{}</table>", open, inner)))
    })
}

/// Legacy code panels become `<pre><code>` blocks.
///
/// ```text
/// <div class="code panel"><div class="codeContent panelContent">
///   <pre class="syntaxhighlighter-pre" data-syntaxhighlighter-params="brush: java">...</pre>
/// </div></div>
/// ```
pub fn normalize_code_panels(html: &str) -> Result<String, AppError> {
    markup::rewrite_elements(html, "div", &mut |div| {
        if !(div.has_class("code") && div.has_class("panel")) {
            return Ok(None);
        }

        let content = markup::elements(div.inner, "div")?
            .into_iter()
            .find(|inner| inner.has_class("codeContent"))
            .map(|inner| inner.inner)
            .unwrap_or(div.inner);

        let Some(pre) = markup::next_element(content, "pre", 0)? else {
            return Ok(None);
        };

        let language = pre
            .attr("data-syntaxhighlighter-params")
            .and_then(|params| BRUSH.captures(&params).map(|c| c[1].to_string()))
            .unwrap_or_else(|| "text".to_string());

        // Content is already escaped HTML; keep it as is
        let code = match markup::next_element(pre.inner, "code", 0)? {
            Some(code) => code.inner,
            None => pre.inner,
        };
        Ok(Some(format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            language, code
        )))
    })
}

/// Site-relative image sources point into the page's assets directory; a
/// `title` fills an empty `alt`.
pub fn rewrite_images(html: &str) -> String {
    IMG_TAG
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[0];
            let mut attrs = attributes(tag);

            let is_site_relative = |src: &str| src.starts_with('/') && !src.starts_with("//");
            for (key, value) in attrs.iter_mut() {
                if key.eq_ignore_ascii_case("src") && is_site_relative(value) {
                    *value = asset_link(value);
                }
            }

            let title = attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("title"))
                .map(|(_, v)| v.clone())
                .filter(|t| !t.trim().is_empty());
            if let Some(title) = title {
                match attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case("alt")) {
                    Some((_, alt)) if alt.trim().is_empty() => *alt = title,
                    Some(_) => {}
                    None => attrs.push(("alt".to_string(), title)),
                }
            }

            build_tag("img", &attrs, true)
        })
        .into_owned()
}

/// Links to wiki pages by id get a `data-page-id` and a descriptive title.
///
/// The link target itself is left alone.
pub fn annotate_page_links(html: &str) -> String {
    ANCHOR_TAG
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[0];
            let mut attrs = attributes(tag);

            let page_id = attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("href"))
                .and_then(|(_, href)| PAGE_LINK.captures(href).map(|c| c[1].to_string()));
            let Some(page_id) = page_id else {
                return tag.to_string();
            };
            if attrs.iter().any(|(k, _)| k == "data-page-id") {
                return tag.to_string();
            }

            attrs.push(("data-page-id".to_string(), page_id.clone()));
            if !attrs
                .iter()
                .any(|(k, v)| k.eq_ignore_ascii_case("title") && !v.is_empty())
            {
                attrs.retain(|(k, _)| !k.eq_ignore_ascii_case("title"));
                attrs.push(("title".to_string(), format!("Wiki page {}", page_id)));
            }
            build_tag("a", &attrs, false)
        })
        .into_owned()
}

/// Rendered status lozenges become `badge` spans.
pub fn normalize_status_badges(html: &str) -> String {
    LOZENGE_SPAN
        .replace_all(html, |caps: &Captures| {
            let class = markup::attribute(&caps[0], "class").unwrap_or_default();
            let colour = class
                .split_whitespace()
                .filter_map(|c| c.strip_prefix("aui-lozenge-"))
                .find_map(lozenge_colour)
                .unwrap_or("grey");
            format!("<span class=\"badge badge-{}\">", colour)
        })
        .into_owned()
}

/// `None` for style modifiers such as `subtle`.
fn lozenge_colour(modifier: &str) -> Option<&'static str> {
    match modifier {
        "success" => Some("green"),
        "error" | "removed" => Some("red"),
        "current" | "complete" | "progress" => Some("blue"),
        "moved" => Some("yellow"),
        "default" => Some("grey"),
        _ => None,
    }
}

/// Rendered info/note/warning/tip panels become tagged block quotes.
pub fn normalize_panels(html: &str) -> Result<String, AppError> {
    markup::rewrite_elements(html, "div", &mut |div| {
        let Some(kind) = panel_kind(div) else {
            return Ok(None);
        };

        let body = markup::elements(div.inner, "div")?
            .into_iter()
            .find(|inner| {
                inner.has_class("confluence-information-macro-body") || inner.has_class("panelContent")
            })
            .map(|inner| inner.inner)
            .unwrap_or(div.inner);

        Ok(Some(format!(
            "<blockquote class=\"admonition-{}\">{}</blockquote>",
            kind,
            normalize_panels(body)?
        )))
    })
}

fn panel_kind(div: &Element<'_>) -> Option<AdmonitionKind> {
    let class = div.attr("class")?;
    let classes: Vec<&str> = class.split_whitespace().collect();

    if classes.contains(&"confluence-information-macro") {
        let kind = classes
            .iter()
            .filter_map(|c| c.strip_prefix("confluence-information-macro-"))
            .find_map(AdmonitionKind::from_name)
            .unwrap_or(AdmonitionKind::Info);
        return Some(kind);
    }

    if classes.contains(&"panel") && !classes.contains(&"code") {
        return Some(AdmonitionKind::Info);
    }
    None
}

fn with_class(open_tag: &str, class: &str) -> String {
    let name = markup::tag_name(open_tag);
    let mut attrs = attributes(open_tag);

    match attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case("class")) {
        Some((_, existing)) if existing.split_whitespace().any(|c| c == class) => {
            return open_tag.to_string();
        }
        Some((_, existing)) => *existing = format!("{} {}", existing.trim(), class).trim().to_string(),
        None => attrs.push(("class".to_string(), class.to_string())),
    }
    build_tag(name, &attrs, false)
}

fn element_source(element: &Element<'_>) -> String {
    if element.inner.is_empty() && element.open_tag.ends_with("/>") {
        return element.open_tag.to_string();
    }
    format!(
        "{}{}</{}>",
        element.open_tag,
        element.inner,
        markup::tag_name(element.open_tag)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_normalization() {
        let html = "<table><tbody><tr><th>A</th></tr><tr><td>1</td></tr></tbody></table>";
        let out = normalize_tables(html).unwrap();
        assert_eq!(
            out,
            "<table class=\"wiki-table\"><tbody><tr class=\"header-row\"><th>A</th></tr><tr><td>1</td></tr></tbody></table>"
        );
        assert_eq!(normalize_tables(&out).unwrap(), out);
    }

    #[test]
    fn test_table_without_header_cells() {
        let html = "<table class=\"confluenceTable\"><tr><td>1</td></tr></table>";
        assert_eq!(
            normalize_tables(html).unwrap(),
            "<table class=\"confluenceTable wiki-table\"><tr><td>1</td></tr></table>"
        );
    }

    #[test]
    fn test_legacy_code_panel() {
        let html = r#"<div class="code panel pdl"><div class="codeContent panelContent pdl"><pre class="syntaxhighlighter-pre" data-syntaxhighlighter-params="brush: java; gutter: false">int a = b &lt; c;</pre></div></div>"#;
        assert_eq!(
            normalize_code_panels(html).unwrap(),
            "<pre><code class=\"language-java\">int a = b &lt; c;</code></pre>"
        );
    }

    #[test]
    fn test_image_rewriting() {
        let html = r#"<p><img src="/wiki/download/attachments/1/chart.png?api=v2" title="Chart" alt=""><img src="https://cdn.example.com/x.png"></p>"#;
        assert_eq!(
            rewrite_images(html),
            r#"<p><img src="./assets/chart.png" title="Chart" alt="Chart" /><img src="https://cdn.example.com/x.png" /></p>"#
        );
    }

    #[test]
    fn test_page_link_annotation() {
        let html = r#"<a href="/wiki/pages/viewpage.action?pageId=4242">Setup</a> <a href="https://example.com">x</a>"#;
        let out = annotate_page_links(html);
        assert_eq!(
            out,
            r#"<a href="/wiki/pages/viewpage.action?pageId=4242" data-page-id="4242" title="Wiki page 4242">Setup</a> <a href="https://example.com">x</a>"#
        );
        assert_eq!(annotate_page_links(&out), out);
    }

    #[test]
    fn test_status_badge() {
        let html = r#"<span class="status-macro aui-lozenge aui-lozenge-subtle aui-lozenge-success">DONE</span>"#;
        assert_eq!(
            normalize_status_badges(html),
            r#"<span class="badge badge-green">DONE</span>"#
        );
    }

    #[test]
    fn test_information_panel() {
        let html = r#"<div class="confluence-information-macro confluence-information-macro-warning"><span class="aui-icon"></span><div class="confluence-information-macro-body"><p>Hot</p></div></div>"#;
        assert_eq!(
            normalize_panels(html).unwrap(),
            r#"<blockquote class="admonition-warning"><p>Hot</p></blockquote>"#
        );

        let plain = r#"<div class="panel"><div class="panelContent"><p>x</p></div></div>"#;
        assert_eq!(
            normalize_panels(plain).unwrap(),
            r#"<blockquote class="admonition-info"><p>x</p></blockquote>"#
        );
    }
}
