use std::fmt;

use async_trait::async_trait;

use crate::sweep::RawItem;

use super::error::BrowserResult;

/// Where a selector is evaluated: the whole document, or inside the rendered
/// item whose permalink resolves to the given identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Page,
    Item(String),
}

impl Scope {
    pub fn item(identity_key: &str) -> Self {
        Scope::Item(identity_key.to_string())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Page => f.write_str("page"),
            Scope::Item(key) => write!(f, "item {key}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    PageDown,
}

impl Key {
    pub fn name(self) -> &'static str {
        match self {
            Key::Escape => "Escape",
            Key::PageDown => "PageDown",
        }
    }

    pub fn virtual_key_code(self) -> i64 {
        match self {
            Key::Escape => 27,
            Key::PageDown => 34,
        }
    }
}

/// Capability surface the sweep engine needs from a live page. Calls are
/// issued strictly one at a time; implementations do not need to be `Send`.
#[async_trait(?Send)]
pub trait PageDriver {
    async fn goto(&mut self, url: &str) -> BrowserResult<()>;
    async fn reload(&mut self) -> BrowserResult<()>;
    /// Items currently rendered, in document order.
    async fn snapshot_items(&mut self) -> BrowserResult<Vec<RawItem>>;
    async fn count(&mut self, scope: &Scope, selector: &str) -> BrowserResult<usize>;
    async fn texts(&mut self, scope: &Scope, selector: &str) -> BrowserResult<Vec<String>>;
    async fn click(&mut self, scope: &Scope, selector: &str, index: usize) -> BrowserResult<()>;
    async fn press_key(&mut self, key: Key) -> BrowserResult<()>;
    async fn scroll_by(&mut self, delta_y: f64) -> BrowserResult<()>;
    async fn wheel(&mut self, delta_y: f64) -> BrowserResult<()>;
    async fn scroll_to_top(&mut self) -> BrowserResult<()>;
    /// Furthest rendered point reached so far, in CSS pixels.
    async fn content_extent(&mut self) -> BrowserResult<u64>;
}
