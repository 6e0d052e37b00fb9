// src/formatting/document.rs
//! Renders a page into its on-disk documents: Markdown with front matter,
//! and a standalone HTML twin.

use crate::constants::TIMESTAMP_FORMAT;
use crate::error::AppError;
use crate::model::Page;
use handlebars::Handlebars;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::json;

const HTML_TEMPLATE_NAME: &str = "page";

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{title}}</title>
{{#each meta}}
<meta name="{{name}}" content="{{content}}">
{{/each}}
</head>
<body>
<h1>{{title}}</h1>
{{{body}}}
</body>
</html>
"#;

/// Registered once; a registration failure is kept and reported per render.
static HTML_REGISTRY: Lazy<Result<Handlebars<'static>, String>> = Lazy::new(|| {
    let mut handlebars = Handlebars::new();
    handlebars
        .register_template_string(HTML_TEMPLATE_NAME, HTML_TEMPLATE)
        .map_err(|e| e.to_string())?;
    Ok(handlebars)
});

/// Page metadata in front-matter order.
pub fn page_metadata(page: &Page) -> IndexMap<&'static str, String> {
    let mut meta = IndexMap::new();
    meta.insert("title", page.title.clone());
    meta.insert("id", page.id.to_string());
    meta.insert("type", page.kind.clone());
    meta.insert("status", page.status.clone());
    meta.insert("space", page.space_name().unwrap_or_default().to_string());
    meta.insert("version", page.version.number.to_string());
    meta.insert(
        "last_modified",
        page.version
            .when
            .map(|when| when.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default(),
    );
    meta
}

/// Front matter block, a blank line, then the converted body.
pub fn render_markdown_document(page: &Page, markdown_body: &str) -> String {
    let mut doc = String::from("---\n");
    for (key, value) in page_metadata(page) {
        doc.push_str(key);
        doc.push_str(": ");
        doc.push_str(&front_matter_value(&value));
        doc.push('\n');
    }
    doc.push_str("---\n\n");
    doc.push_str(markdown_body);
    if !markdown_body.ends_with('\n') {
        doc.push('\n');
    }
    doc
}

/// Quotes values a YAML reader would otherwise misread.
fn front_matter_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value != value.trim()
        || value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.contains(['\n', '\r', '\t'])
        || value.starts_with([
            '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
            '@', '`',
        ]);

    if needs_quotes {
        // A JSON string is a valid YAML double-quoted scalar
        serde_json::Value::String(value.to_string()).to_string()
    } else {
        value.to_string()
    }
}

/// Standalone HTML document: metadata as `<meta>` tags, the title as `<h1>`,
/// then the raw stored markup.
pub fn render_html_document(page: &Page) -> Result<String, AppError> {
    let handlebars = HTML_REGISTRY
        .as_ref()
        .map_err(|message| AppError::TemplateRenderError {
            name: HTML_TEMPLATE_NAME.to_string(),
            message: message.clone(),
        })?;

    let meta: Vec<_> = page_metadata(page)
        .into_iter()
        .map(|(name, content)| json!({ "name": name, "content": content }))
        .collect();

    handlebars
        .render(
            HTML_TEMPLATE_NAME,
            &json!({
                "title": page.title,
                "meta": meta,
                "body": page.body,
            }),
        )
        .map_err(|e| AppError::TemplateRenderError {
            name: HTML_TEMPLATE_NAME.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageVersion, SpaceRef};
    use crate::types::{PageId, SpaceKey};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn sample_page() -> Page {
        Page {
            id: PageId::from_api("42"),
            title: "Q3: Plans & <Goals>".to_string(),
            kind: "page".to_string(),
            status: "current".to_string(),
            space: Some(SpaceRef {
                key: SpaceKey::from_api("ENG"),
                name: "Engineering".to_string(),
            }),
            body: "<p>Raw <b>body</b></p>".to_string(),
            version: PageVersion {
                number: 3,
                when: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
                author: None,
            },
            ancestors: Vec::new(),
        }
    }

    #[test]
    fn test_markdown_document_front_matter() {
        let doc = render_markdown_document(&sample_page(), "Body text");
        assert_eq!(
            doc,
            "---\ntitle: \"Q3: Plans & <Goals>\"\nid: 42\ntype: page\nstatus: current\nspace: Engineering\nversion: 3\nlast_modified: 2024-01-02 03:04:05\n---\n\nBody text\n"
        );
    }

    #[test]
    fn test_html_document() {
        let html = render_html_document(&sample_page()).unwrap();
        assert!(html.contains("<title>Q3: Plans &amp; &lt;Goals&gt;</title>"));
        assert!(html.contains("<h1>Q3: Plans &amp; &lt;Goals&gt;</h1>"));
        assert!(html.contains("<meta name=\"last_modified\" content=\"2024-01-02 03:04:05\">"));
        assert!(html.contains("<meta name=\"space\" content=\"Engineering\">"));
        assert!(html.contains("<p>Raw <b>body</b></p>"));
    }

    #[test]
    fn test_missing_timestamp_is_quoted_empty() {
        let mut page = sample_page();
        page.version.when = None;
        let doc = render_markdown_document(&page, "");
        assert!(doc.contains("last_modified: \"\"\n"));
    }

    #[test]
    fn test_front_matter_quotes_only_ambiguous_values() {
        assert_eq!(front_matter_value("2024-01-02 03:04:05"), "2024-01-02 03:04:05");
        assert_eq!(front_matter_value("http://host/x"), "http://host/x");
        assert_eq!(front_matter_value("Note: read me"), "\"Note: read me\"");
        assert_eq!(front_matter_value("Todo:"), "\"Todo:\"");
        assert_eq!(front_matter_value("C # notes"), "\"C # notes\"");
        assert_eq!(front_matter_value("- item"), "\"- item\"");
        assert_eq!(front_matter_value("\"quoted\""), "\"\\\"quoted\\\"\"");
    }

    #[test]
    fn test_html_documents_share_one_registry() {
        let first = render_html_document(&sample_page()).unwrap();
        let second = render_html_document(&sample_page()).unwrap();
        assert_eq!(first, second);
        assert!(HTML_REGISTRY.as_ref().is_ok_and(|h| h.has_template(HTML_TEMPLATE_NAME)));
    }
}
