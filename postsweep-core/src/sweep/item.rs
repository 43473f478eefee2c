use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

pub const MAX_PREVIEW_CHARS: usize = 80;

/// Resolves relative hrefs; the host is irrelevant to the identity key.
const HREF_BASE: &str = "https://placeholder.invalid/";

/// Fields scraped from one rendered item, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub permalink: Option<String>,
    pub datetime: Option<String>,
    pub text: Option<String>,
    pub author_href: Option<String>,
    pub social_context: Option<String>,
    pub social_context_href: Option<String>,
    /// Text of the "replying to" line, when the item shows one.
    pub reply_context: Option<String>,
    /// First profile link inside that line.
    pub reply_to_href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    pub identity_key: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub text_preview: String,
    pub is_repost_marker: bool,
    pub author_handle: Option<String>,
    pub reposted_by: Option<String>,
    pub is_reply: bool,
    pub in_reply_to: Option<String>,
}

impl ContentItem {
    /// Returns `None` when no identity can be derived; such items cannot be
    /// deduplicated and are never acted on.
    pub fn from_raw(raw: &RawItem) -> Option<Self> {
        let identity_key = identity_key_from_permalink(raw.permalink.as_deref()?)?;
        let reposted_by = raw
            .social_context_href
            .as_deref()
            .and_then(handle_from_href);
        Some(Self {
            identity_key,
            timestamp: raw.datetime.as_deref().and_then(parse_timestamp),
            text_preview: preview(raw.text.as_deref().unwrap_or_default()),
            // Pinned and similar banners carry no profile link.
            is_repost_marker: reposted_by.is_some(),
            author_handle: raw.author_href.as_deref().and_then(handle_from_href),
            reposted_by,
            is_reply: raw
                .reply_context
                .as_deref()
                .map_or(false, |text| !text.trim().is_empty())
                || raw.reply_to_href.is_some(),
            in_reply_to: raw.reply_to_href.as_deref().and_then(handle_from_href),
        })
    }
}

/// `/{user}/status/{id}` in lowercase, with any trailing segments such as
/// `/photo/1` or `/analytics` dropped.
pub fn identity_key_from_permalink(href: &str) -> Option<String> {
    let url = resolve_href(href)?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    if let Some(pos) = segments.iter().position(|s| *s == "status") {
        let user = segments.get(pos.checked_sub(1)?)?;
        let id = segments.get(pos + 1)?;
        return Some(format!("/{}/status/{}", user.to_lowercase(), id));
    }
    if segments.is_empty() {
        None
    } else {
        Some(format!("/{}", segments.join("/").to_lowercase()))
    }
}

/// First path segment of a profile link, lowercased and without `@`.
pub fn handle_from_href(href: &str) -> Option<String> {
    let url = resolve_href(href)?;
    let first = url.path_segments()?.find(|s| !s.is_empty())?;
    Some(normalize_handle(first))
}

pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

fn resolve_href(href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url),
        Err(_) => Url::parse(HREF_BASE).ok()?.join(href).ok(),
    }
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

pub fn preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_PREVIEW_CHARS {
        collapsed
    } else {
        let mut cut: String = collapsed.chars().take(MAX_PREVIEW_CHARS - 1).collect();
        cut.push('…');
        cut
    }
}

/// Identity keys already evaluated during the current sweep.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    keys: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a key is offered.
    pub fn insert(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            false
        } else {
            self.keys.insert(key.to_string())
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
