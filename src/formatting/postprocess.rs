// src/formatting/postprocess.rs
//! Whitespace and escaping cleanup of converted Markdown.
//!
//! Fenced code blocks are left exactly as they are. Cleaning already clean
//! Markdown is a no-op.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static BOLD_ONLY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\*[^*]+\*\*$").expect("bold line regex is valid"));
static ESCAPED_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([\\*_])").expect("escape regex is valid"));

/// A line of the document, tagged with whether it sits inside a code fence.
struct Line {
    text: String,
    fenced: bool,
}

pub fn clean_markdown(markdown: &str) -> String {
    let lines = classify_lines(markdown);
    let lines = normalize_whitespace(lines);
    let lines = merge_bold_lines(lines);

    lines
        .into_iter()
        .map(|line| line.text)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn classify_lines(markdown: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut open_fence: Option<String> = None;

    for raw in markdown.lines() {
        let marker = fence_marker(raw);

        if let Some(open) = &open_fence {
            let closes = marker
                .as_ref()
                .is_some_and(|m| {
                    m.starts_with(open.as_str()) && unquoted(raw).trim_end().len() == m.len()
                });
            let text = if closes { raw.trim_end() } else { raw };
            lines.push(Line {
                text: text.to_string(),
                fenced: true,
            });
            if closes {
                open_fence = None;
            }
            continue;
        }

        match marker {
            Some(marker) => {
                open_fence = Some(marker);
                lines.push(Line {
                    text: raw.trim_end().to_string(),
                    fenced: true,
                });
            }
            None => lines.push(Line {
                text: unescape_emphasis(raw.trim_end()),
                fenced: false,
            }),
        }
    }
    lines
}

/// The line without indentation and blockquote markers.
fn unquoted(line: &str) -> &str {
    let mut rest = line.trim_start();
    while let Some(inner) = rest.strip_prefix('>') {
        rest = inner.trim_start();
    }
    rest
}

/// The run of backticks or tildes opening or closing a fence, also inside
/// a blockquote.
fn fence_marker(line: &str) -> Option<String> {
    let trimmed = unquoted(line);
    let fence_char = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run: String = trimmed.chars().take_while(|c| *c == fence_char).collect();
    (run.len() >= 3).then_some(run)
}

/// Whitespace-only lines become empty and runs of empty lines collapse to one.
fn normalize_whitespace(lines: Vec<Line>) -> Vec<Line> {
    let mut out: Vec<Line> = Vec::with_capacity(lines.len());
    for mut line in lines {
        if !line.fenced {
            if line.text.trim().is_empty() {
                line.text.clear();
            }
            let previous_blank = out.last().is_some_and(|l| !l.fenced && l.text.is_empty());
            if line.text.is_empty() && previous_blank {
                continue;
            }
        }
        out.push(line);
    }
    out
}

/// Consecutive lines that are entirely bold are joined with a space.
fn merge_bold_lines(lines: Vec<Line>) -> Vec<Line> {
    let mut out: Vec<Line> = Vec::with_capacity(lines.len());
    let mut previous_was_bold = false;

    for line in lines {
        let is_bold = !line.fenced && BOLD_ONLY_LINE.is_match(&line.text);
        if is_bold && previous_was_bold {
            if let Some(last) = out.last_mut() {
                last.text.push(' ');
                last.text.push_str(&line.text);
                continue;
            }
        }
        previous_was_bold = is_bold;
        out.push(line);
    }
    out
}

/// `\*` and `\_` lose their backslash; an escaped backslash stays as is.
fn unescape_emphasis(line: &str) -> String {
    ESCAPED_EMPHASIS
        .replace_all(line, |caps: &Captures| match &caps[1] {
            "\\" => "\\\\".to_string(),
            other => other.to_string(),
        })
        .into_owned()
}
