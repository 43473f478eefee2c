use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ContentKind;

use super::item::ContentItem;

/// Profile views a run walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Posts,
    Replies,
}

impl Tab {
    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Posts => "posts",
            Tab::Replies => "replies",
        }
    }

    pub fn url(self, base_url: &str, handle: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            Tab::Posts => format!("{base}/{handle}"),
            Tab::Replies => format!("{base}/{handle}/with_replies"),
        }
    }

    /// Tabs needed to cover a content selection, in visiting order. Reposts
    /// surface on the posts tab.
    pub fn for_content(content: &[ContentKind]) -> Vec<Tab> {
        let mut tabs = Vec::new();
        if content
            .iter()
            .any(|kind| matches!(kind, ContentKind::Posts | ContentKind::Reposts))
        {
            tabs.push(Tab::Posts);
        }
        if content.contains(&ContentKind::Replies) {
            tabs.push(Tab::Replies);
        }
        tabs
    }

    /// Whether the selection wants this item when it shows up on this tab.
    pub fn admits(self, item: &ContentItem, content: &[ContentKind]) -> bool {
        if item.is_repost_marker {
            return content.contains(&ContentKind::Reposts);
        }
        match self {
            Tab::Posts => content.contains(&ContentKind::Posts),
            // The replies view also lists top-level posts; those belong to
            // the posts selection.
            Tab::Replies => item.is_reply && content.contains(&ContentKind::Replies),
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
