// src/output/assets.rs
//! Finds the images and attachments a page body references.
//!
//! This is a text scan of the stored markup, not a parse: it recognises
//! `<img src>`, attachment download links, and the storage-format
//! `ri:attachment` references inside images and links.

use crate::constants::{MAX_ATTACHMENTS_PER_PAGE, MAX_IMAGES_PER_PAGE};
use crate::formatting::markup::decode_entities;
use crate::output::paths::{asset_file_name, encode_path_segment};
use crate::types::PageId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static IMG_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("img regex is valid")
});
static STORAGE_IMAGE_ATTACHMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<ac:image\b[^>]*>\s*<ri:attachment\b[^>]*?ri:filename\s*=\s*"([^"]+)""#)
        .expect("storage image regex is valid")
});
static STORAGE_IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<ac:image\b[^>]*>\s*<ri:url\b[^>]*?ri:value\s*=\s*"([^"]+)""#)
        .expect("storage image url regex is valid")
});
static ATTACHMENT_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a\b[^>]*?\bhref\s*=\s*["']([^"']*/download/attachments/[^"']+)["']"#)
        .expect("attachment href regex is valid")
});
static STORAGE_LINK_ATTACHMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<ac:link\b[^>]*>\s*<ri:attachment\b[^>]*?ri:filename\s*=\s*"([^"]+)""#)
        .expect("storage link regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Attachment,
}

/// One file to download next to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub kind: AssetKind,
    /// As found in the markup, or the attachment download path built for a
    /// storage-format reference. Resolved against the tenant by the client.
    pub url: String,
    /// Name of the file under the page's assets directory.
    pub file_name: String,
}

/// Which asset kinds a page export downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetSelection {
    pub images: bool,
    pub attachments: bool,
}

impl AssetSelection {
    pub fn any(&self) -> bool {
        self.images || self.attachments
    }
}

/// Assets referenced by `body`, in document order.
///
/// References are deduplicated by local file name; images and attachments
/// are each capped at their per-page limit.
pub fn extract_assets(
    page_id: &PageId,
    body: &str,
    selection: AssetSelection,
) -> Vec<AssetReference> {
    let mut found = Vec::new();

    if selection.images {
        let mut images = Vec::new();
        images.extend(captured(&IMG_SRC, body).map(|(at, src)| (at, decode_entities(src))));
        images.extend(
            captured(&STORAGE_IMAGE_ATTACHMENT, body)
                .map(|(at, name)| (at, attachment_download_path(page_id, name))),
        );
        images.extend(captured(&STORAGE_IMAGE_URL, body).map(|(at, url)| (at, decode_entities(url))));
        found.extend(select(images, AssetKind::Image, MAX_IMAGES_PER_PAGE));
    }

    if selection.attachments {
        let mut attachments = Vec::new();
        attachments
            .extend(captured(&ATTACHMENT_HREF, body).map(|(at, href)| (at, decode_entities(href))));
        attachments.extend(
            captured(&STORAGE_LINK_ATTACHMENT, body)
                .map(|(at, name)| (at, attachment_download_path(page_id, name))),
        );
        found.extend(select(
            attachments,
            AssetKind::Attachment,
            MAX_ATTACHMENTS_PER_PAGE,
        ));
    }

    // An attachment that is also shown inline is only fetched once
    let mut seen = HashSet::new();
    found.retain(|asset| seen.insert(asset.file_name.clone()));
    found
}

/// Download path of a named attachment on a page.
pub fn attachment_download_path(page_id: &PageId, file_name: &str) -> String {
    let file_name = decode_entities(file_name);
    format!(
        "/download/attachments/{}/{}",
        page_id,
        encode_path_segment(&file_name)
    )
}

fn captured<'a>(pattern: &'a Regex, body: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    pattern
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).map(|m| (m.start(), m.as_str())))
}

fn select(
    mut candidates: Vec<(usize, String)>,
    kind: AssetKind,
    limit: usize,
) -> Vec<AssetReference> {
    candidates.sort_by_key(|(at, _)| *at);

    let mut seen = HashSet::new();
    let assets: Vec<AssetReference> = candidates
        .into_iter()
        .map(|(_, url)| url.trim().to_string())
        .filter(|url| !url.is_empty() && !url.starts_with("data:"))
        .filter(|url| seen.insert(url.clone()))
        .map(|url| AssetReference {
            kind,
            file_name: asset_file_name(&url),
            url,
        })
        .collect();

    if assets.len() > limit {
        log::debug!(
            "Page references {} {:?} assets, keeping the first {}",
            assets.len(),
            kind,
            limit
        );
    }
    assets.into_iter().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BOTH: AssetSelection = AssetSelection {
        images: true,
        attachments: true,
    };

    fn page_id() -> PageId {
        PageId::from_api("77")
    }

    #[test]
    fn test_images_in_document_order() {
        let body = concat!(
            "<p><img src=\"/wiki/download/attachments/77/b.png?version=1&amp;api=v2\" /></p>",
            "<ac:image><ri:attachment ri:filename=\"my diagram.png\" /></ac:image>",
            "<ac:image ac:width=\"200\"><ri:url ri:value=\"https://cdn.example.com/logo.svg\" /></ac:image>",
        );
        let assets = extract_assets(&page_id(), body, BOTH);
        let found: Vec<(&str, &str)> = assets
            .iter()
            .map(|a| (a.url.as_str(), a.file_name.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("/wiki/download/attachments/77/b.png?version=1&api=v2", "b.png"),
                ("/download/attachments/77/my%20diagram.png", "my diagram.png"),
                ("https://cdn.example.com/logo.svg", "logo.svg"),
            ]
        );
    }

    #[test]
    fn test_image_cap() {
        let body: String = (0..15)
            .map(|i| format!("<img src=\"/img/{}.png\">", i))
            .collect();
        let assets = extract_assets(&page_id(), &body, BOTH);
        assert_eq!(assets.len(), MAX_IMAGES_PER_PAGE);
        assert_eq!(assets[0].file_name, "0.png");
        assert_eq!(assets[9].file_name, "9.png");
    }

    #[test]
    fn test_attachments_only_when_selected() {
        let body = concat!(
            "<a href=\"/wiki/download/attachments/77/spec.pdf\">spec</a>",
            "<ac:link><ri:attachment ri:filename=\"notes.txt\" /></ac:link>",
            "<a href=\"/wiki/spaces/ENG/pages/9\">not an attachment</a>",
            "<img src=\"/a.png\">",
        );

        let images_only = AssetSelection {
            images: true,
            attachments: false,
        };
        let assets = extract_assets(&page_id(), body, images_only);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].kind, AssetKind::Image);

        let attachments_only = AssetSelection {
            images: false,
            attachments: true,
        };
        let names: Vec<String> = extract_assets(&page_id(), body, attachments_only)
            .into_iter()
            .map(|a| a.file_name)
            .collect();
        assert_eq!(names, vec!["spec.pdf", "notes.txt"]);
    }

    #[test]
    fn test_duplicates_and_data_uris_skipped() {
        let body = concat!(
            "<img src=\"/x/pic.png\"><img src=\"/x/pic.png\">",
            "<img src=\"data:image/png;base64,AAAA\">",
            "<a href=\"/download/attachments/77/pic.png\">same file</a>",
        );
        let assets = extract_assets(&page_id(), body, BOTH);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].kind, AssetKind::Image);
    }

    #[test]
    fn test_nothing_selected() {
        let selection = AssetSelection {
            images: false,
            attachments: false,
        };
        assert!(!selection.any());
        assert!(extract_assets(&page_id(), "<img src=\"/a.png\">", selection).is_empty());
    }
}
