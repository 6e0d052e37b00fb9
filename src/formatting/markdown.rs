// src/formatting/markdown.rs
//! HTML to GitHub-flavored Markdown.
//!
//! Covers the constructs that wiki pages produce after macro resolution and
//! normalization. Unknown elements are transparent: their content is kept,
//! their tags are not. Comments, scripts and styles are dropped.

use super::normalize::HEADER_ROW_CLASS;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum HtmlNode {
    Text(String),
    Element(HtmlElement),
}

#[derive(Debug, Clone, PartialEq)]
struct HtmlElement {
    tag_name: String,
    attributes: HashMap<String, String>,
    children: Vec<HtmlNode>,
}

impl HtmlElement {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    fn child_elements<'a>(&'a self, tags: &'a [&'a str]) -> impl Iterator<Item = &'a HtmlElement> {
        self.children.iter().filter_map(move |node| match node {
            HtmlNode::Element(el) if tags.contains(&el.tag_name.as_str()) => Some(el),
            _ => None,
        })
    }
}

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "html", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "ul",
];

const DROPPED_TAGS: &[&str] = &["script", "style", "head", "title", "noscript", "template"];

/// Converts an HTML fragment to Markdown.
pub fn html_to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let root = map_element(fragment.root_element());
    convert_blocks(&root.children, "\n\n")
}

fn map_element(element: ElementRef<'_>) -> HtmlElement {
    let mut children = Vec::new();
    for child in element.children() {
        match child.value() {
            Node::Text(text) => children.push(HtmlNode::Text(text.to_string())),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    children.push(HtmlNode::Element(map_element(child_element)));
                }
            }
            // Comments, doctypes and processing instructions carry no content
            _ => {}
        }
    }

    let value = element.value();
    HtmlElement {
        tag_name: value.name().to_ascii_lowercase(),
        attributes: value
            .attrs()
            .map(|(name, v)| (name.to_ascii_lowercase(), v.to_string()))
            .collect(),
        children,
    }
}

fn is_block(element: &HtmlElement) -> bool {
    BLOCK_TAGS.contains(&element.tag_name.as_str())
}

fn contains_block(element: &HtmlElement) -> bool {
    element.children.iter().any(|node| match node {
        HtmlNode::Element(el) => is_block(el) || contains_block(el),
        HtmlNode::Text(_) => false,
    })
}

/// Renders a sequence of nodes as blocks joined by `separator`.
fn convert_blocks(nodes: &[HtmlNode], separator: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut inline_run = String::new();

    let flush = |run: &mut String, blocks: &mut Vec<String>| {
        let text = run.trim();
        if !text.is_empty() {
            blocks.push(text.to_string());
        }
        run.clear();
    };

    for node in nodes {
        let element = match node {
            HtmlNode::Text(text) => {
                inline_run.push_str(&convert_text(text));
                continue;
            }
            HtmlNode::Element(el) => el,
        };

        if DROPPED_TAGS.contains(&element.tag_name.as_str()) {
            continue;
        }

        if !is_block(element) && !contains_block(element) {
            inline_run.push_str(&convert_inline_element(element));
            continue;
        }

        flush(&mut inline_run, &mut blocks);
        let block = convert_block_element(element);
        if !block.trim().is_empty() {
            blocks.push(block);
        }
    }
    flush(&mut inline_run, &mut blocks);

    blocks.join(separator)
}

fn convert_block_element(element: &HtmlElement) -> String {
    match element.tag_name.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = element.tag_name[1..].parse::<usize>().unwrap_or(1);
            let text = single_line(&convert_inline(&element.children));
            if text.is_empty() {
                String::new()
            } else {
                format!("{} {}", "#".repeat(level), text)
            }
        }
        "p" => convert_inline(&element.children).trim().to_string(),
        "hr" => "---".to_string(),
        "pre" => convert_pre(element),
        "blockquote" => convert_blockquote(element),
        "ul" | "ol" => convert_list(element),
        "table" => convert_table(element),
        "dt" => {
            let text = single_line(&convert_inline(&element.children));
            if text.is_empty() {
                text
            } else {
                format!("**{}**", text)
            }
        }
        // Containers and unknown elements holding blocks
        _ => convert_blocks(&element.children, "\n\n"),
    }
}

fn convert_inline(nodes: &[HtmlNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            HtmlNode::Text(text) => out.push_str(&convert_text(text)),
            HtmlNode::Element(el) if DROPPED_TAGS.contains(&el.tag_name.as_str()) => {}
            HtmlNode::Element(el) if is_block(el) => {
                // A block inside inline content, e.g. a paragraph in a table cell
                let block = convert_block_element(el);
                if !block.trim().is_empty() {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(block.trim());
                    out.push('\n');
                }
            }
            HtmlNode::Element(el) => out.push_str(&convert_inline_element(el)),
        }
    }
    out
}

fn convert_inline_element(element: &HtmlElement) -> String {
    match element.tag_name.as_str() {
        "strong" | "b" => wrap_emphasis(&convert_inline(&element.children), "**"),
        "em" | "i" | "cite" => wrap_emphasis(&convert_inline(&element.children), "*"),
        "del" | "s" | "strike" => wrap_emphasis(&convert_inline(&element.children), "~~"),
        "code" | "tt" | "kbd" | "samp" => inline_code(&raw_text(&element.children)),
        "br" => "\n".to_string(),
        "a" => convert_link(element),
        "img" => convert_image(element),
        "span" if element.has_class("badge") => {
            let text = single_line(&raw_text(&element.children));
            if text.is_empty() {
                String::new()
            } else {
                inline_code(&text)
            }
        }
        // Unknown inline elements are transparent
        _ => convert_inline(&element.children),
    }
}

/// Wraps `content` in `marker`, keeping surrounding whitespace outside.
fn wrap_emphasis(content: &str, marker: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return content.to_string();
    }
    let leading = if content.starts_with(char::is_whitespace) { " " } else { "" };
    let trailing = if content.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{}{}{}{}{}", leading, marker, trimmed, marker, trailing)
}

fn inline_code(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let fence = if text.contains('`') { "``" } else { "`" };
    let pad = if text.starts_with('`') || text.ends_with('`') { " " } else { "" };
    format!("{}{}{}{}{}", fence, pad, text, pad, fence)
}

fn convert_link(element: &HtmlElement) -> String {
    let text = single_line(&convert_inline(&element.children));
    let Some(href) = element.attr("href").filter(|h| !h.trim().is_empty()) else {
        return text;
    };
    if text.is_empty() {
        return String::new();
    }

    let title = element
        .attr("title")
        .filter(|t| !t.is_empty())
        .map(|t| format!(" \"{}\"", t.replace('"', "\\\"")))
        .unwrap_or_default();
    format!("[{}]({}{})", text, markdown_url(href), title)
}

fn convert_image(element: &HtmlElement) -> String {
    let Some(src) = element.attr("src").filter(|s| !s.trim().is_empty()) else {
        return String::new();
    };
    let alt = element.attr("alt").unwrap_or_default().replace(['[', ']'], "");
    format!("![{}]({})", single_line(&alt), markdown_url(src))
}

fn markdown_url(url: &str) -> String {
    url.trim().replace(' ', "%20")
}

fn convert_pre(element: &HtmlElement) -> String {
    let code = element.child_elements(&["code"]).next();

    let language = code
        .and_then(language_of)
        .or_else(|| language_of(element))
        .unwrap_or_default();

    let text = raw_text(&element.children);
    let text = text.strip_suffix('\n').unwrap_or(&text);

    // A fence longer than any backtick run inside the code
    let longest_run = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);

    format!("{}{}\n{}\n{}", fence, language, text, fence)
}

fn language_of(element: &HtmlElement) -> Option<String> {
    element
        .attr("class")?
        .split_whitespace()
        .find_map(|c| c.strip_prefix("language-"))
        .map(str::to_string)
}

fn convert_blockquote(element: &HtmlElement) -> String {
    let inner = convert_blocks(&element.children, "\n\n");
    inner
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn convert_list(element: &HtmlElement) -> String {
    let ordered = element.tag_name == "ol";
    let start = element
        .attr("start")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);

    let mut items = Vec::new();
    for (index, item) in element.child_elements(&["li"]).enumerate() {
        let marker = if ordered {
            format!("{}. ", start + index)
        } else {
            "- ".to_string()
        };
        let indent = " ".repeat(marker.len());

        let content = convert_blocks(&item.children, "\n");
        let mut lines = content.lines();
        let first = lines.next().unwrap_or_default();

        let mut rendered = format!("{}{}", marker, first);
        for line in lines {
            rendered.push('\n');
            if !line.is_empty() {
                rendered.push_str(&indent);
                rendered.push_str(line);
            }
        }
        items.push(rendered.trim_end().to_string());
    }
    items.join("\n")
}

fn convert_table(element: &HtmlElement) -> String {
    let mut rows: Vec<&HtmlElement> = Vec::new();
    for child in element.child_elements(&["thead", "tbody", "tfoot", "tr"]) {
        if child.tag_name == "tr" {
            rows.push(child);
        } else {
            rows.extend(child.child_elements(&["tr"]));
        }
    }
    if rows.is_empty() {
        return String::new();
    }

    let header_index = rows
        .iter()
        .position(|row| row.has_class(HEADER_ROW_CLASS))
        .unwrap_or(0);

    let cells = |row: &HtmlElement| -> Vec<String> {
        row.child_elements(&["th", "td"])
            .map(|cell| table_cell(&convert_inline(&cell.children)))
            .collect()
    };

    let header = cells(rows[header_index]);
    let body: Vec<Vec<String>> = rows
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != header_index)
        .map(|(_, row)| cells(*row))
        .collect();

    let columns = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0)
        .max(1);

    let render_row = |row: &[String]| {
        let mut padded: Vec<&str> = row.iter().map(String::as_str).collect();
        padded.resize(columns, "");
        format!("| {} |", padded.join(" | "))
    };

    let mut lines = vec![
        render_row(&header[..]),
        format!("|{}", " --- |".repeat(columns)),
    ];
    lines.extend(body.iter().map(|row| render_row(&row[..])));
    lines.join("\n")
}

fn table_cell(content: &str) -> String {
    content
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("<br>")
        .replace('|', "\\|")
}

/// Text exactly as written, for code. `<br>` becomes a newline.
fn raw_text(nodes: &[HtmlNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            HtmlNode::Text(text) => out.push_str(text),
            HtmlNode::Element(el) if el.tag_name == "br" => out.push('\n'),
            HtmlNode::Element(el) => out.push_str(&raw_text(&el.children)),
        }
    }
    out
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace runs and escapes emphasis characters.
fn convert_text(text: &str) -> String {
    static WHITESPACE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[\s\u{a0}]+").expect("whitespace regex is valid"));

    let collapsed = WHITESPACE.replace_all(text, " ");
    let mut out = String::with_capacity(collapsed.len());
    for c in collapsed.chars() {
        if matches!(c, '*' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_headings_and_paragraphs() {
        let md = html_to_markdown("<h2>Intro  <em>now</em></h2><p>Hello <strong>bold </strong>world</p>");
        assert_eq!(md, "## Intro *now*\n\nHello **bold** world");
    }

    #[test]
    fn test_fenced_code_keeps_text_verbatim() {
        let md = html_to_markdown(
            "<pre><code class=\"language-python\">if a &lt; b:\n    print(1)</code></pre>",
        );
        assert_eq!(md, "```python\nif a < b:\n    print(1)\n```");
    }

    #[test]
    fn test_nested_lists() {
        let md = html_to_markdown(
            "<ul><li>One<ul><li>Sub</li></ul></li><li><p>Two</p></li></ul><ol start=\"3\"><li>Three</li></ol>",
        );
        assert_eq!(md, "- One\n  - Sub\n- Two\n\n3. Three");
    }

    #[test]
    fn test_blockquote() {
        let md = html_to_markdown("<blockquote><p><strong>Note</strong></p><p>Body</p></blockquote>");
        assert_eq!(md, "> **Note**\n>\n> Body");
    }

    #[test]
    fn test_table_with_marked_header_row() {
        let md = html_to_markdown(
            "<table class=\"wiki-table\"><tbody><tr class=\"header-row\"><th>Name</th><th>Value</th></tr><tr><td>a|b</td><td><p>1</p><p>2</p></td></tr></tbody></table>",
        );
        assert_eq!(
            md,
            "| Name | Value |\n| --- | --- |\n| a\\|b | 1<br>2 |"
        );
    }

    #[test]
    fn test_links_images_and_badges() {
        let md = html_to_markdown(
            "<p><a href=\"/wiki/pages/viewpage.action?pageId=7\" title=\"Wiki page 7\">Setup</a> <img src=\"./assets/a b.png\" alt=\"Chart\" /> <span class=\"badge badge-green\">DONE</span></p>",
        );
        assert_eq!(
            md,
            "[Setup](/wiki/pages/viewpage.action?pageId=7 \"Wiki page 7\") ![Chart](./assets/a%20b.png) `DONE`"
        );
    }

    #[test]
    fn test_unknown_tags_pass_through_and_comments_drop() {
        let md = html_to_markdown("<p>a <custom-tag>kept</custom-tag><!-- gone --> b</p><script>x()</script>");
        assert_eq!(md, "a kept b");
    }

    #[test]
    fn test_text_emphasis_characters_are_escaped() {
        assert_eq!(html_to_markdown("<p>snake_case * 2</p>"), "snake\\_case \\* 2");
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(
            html_to_markdown("<p><strong>A</strong><br/><strong>B</strong></p>"),
            "**A**\n**B**"
        );
    }
}
