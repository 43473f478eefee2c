use serde::Serialize;
use tracing::trace;

use crate::browser::PageDriver;

use super::actions::ActionExecutor;
use super::item::{normalize_handle, ContentItem};

/// What established that an item belongs to the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    Author,
    OwnRepost,
    MenuProbe,
}

#[derive(Debug, Clone)]
pub struct OwnershipResolver {
    handle: String,
    handle_reposts: bool,
}

impl OwnershipResolver {
    pub fn new(handle: &str, handle_reposts: bool) -> Self {
        Self {
            handle: normalize_handle(handle),
            handle_reposts,
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Evidence readable from the snapshot alone.
    pub fn static_evidence(&self, item: &ContentItem) -> Option<Evidence> {
        if item.author_handle.as_deref() == Some(self.handle.as_str()) {
            return Some(Evidence::Author);
        }
        if self.handle_reposts
            && item.is_repost_marker
            && item.reposted_by.as_deref() == Some(self.handle.as_str())
        {
            return Some(Evidence::OwnRepost);
        }
        None
    }

    /// Cheapest evidence first; falls back to opening the item menu. Never
    /// fails: an inconclusive or broken probe means "not ours".
    pub async fn resolve(
        &self,
        driver: &mut dyn PageDriver,
        executor: &ActionExecutor,
        item: &ContentItem,
    ) -> Option<Evidence> {
        if let Some(evidence) = self.static_evidence(item) {
            return Some(evidence);
        }
        let capable = executor.probe_delete_capability(driver, item).await;
        trace!(item = %item.identity_key, capable, "ownership menu probe");
        capable.then_some(Evidence::MenuProbe)
    }

    pub async fn is_actionable(
        &self,
        driver: &mut dyn PageDriver,
        executor: &ActionExecutor,
        item: &ContentItem,
    ) -> bool {
        self.resolve(driver, executor, item).await.is_some()
    }
}
