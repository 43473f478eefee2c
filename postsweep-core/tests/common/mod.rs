#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use postsweep_core::browser::{
    BrowserError, BrowserResult, HumanBehaviorSimulator, Key, PageDriver, Scope,
};
use postsweep_core::config::{load_config, SelectorSection, SweepConfig};
use postsweep_core::sweep::{
    ActionExecutor, CancellationSignal, ContentItem, EventKind, Orchestrator, OrchestratorConfig,
    Progress, ProgressSink, RawItem, SweepEvent,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

pub const ITEM_PX: f64 = 500.0;
pub const VIEWPORT_PX: f64 = 900.0;
const LOAD_MARGIN_PX: f64 = 600.0;
/// Far beyond any bound the sweep puts on a driver call.
pub const STALL: Duration = Duration::from_secs(3600);

pub fn fixture_config() -> SweepConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/postsweep.toml");
    let mut config = load_config(path).expect("fixture config");
    config.run.target = None;
    config.human_simulation.interject_probability = 0.0;
    config.human_simulation.idle_scroll_probability = 0.0;
    config
}

pub fn seeded_human(config: &SweepConfig, seed: u64) -> HumanBehaviorSimulator {
    HumanBehaviorSimulator::with_rng(
        config.human_simulation.clone(),
        config.delay_range_ms(),
        Box::new(ChaCha20Rng::seed_from_u64(seed)),
    )
}

pub fn executor(config: &SweepConfig, handle_reposts: bool) -> ActionExecutor {
    ActionExecutor::from_config(config, handle_reposts).expect("executor")
}

pub fn orchestrator(
    config: &SweepConfig,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationSignal,
) -> Orchestrator {
    let settings = OrchestratorConfig::from_config(config).expect("orchestrator config");
    let executor = executor(config, settings.handles_reposts());
    Orchestrator::new(settings, executor, seeded_human(config, 7), sink, cancel)
        .with_rng(Box::new(ChaCha20Rng::seed_from_u64(99)))
}

#[derive(Debug, Clone)]
pub struct MockPost {
    pub user: String,
    pub id: u64,
    pub author: Option<String>,
    pub datetime: Option<String>,
    pub reposted_by: Option<String>,
    pub has_menu: bool,
    pub menu: Vec<String>,
    pub active_repost: bool,
    pub undo_menu: Vec<String>,
    pub replying_to: Option<String>,
}

impl MockPost {
    /// A post written by `user`, with the usual own-post menu.
    pub fn own(user: &str, id: u64, datetime: &str) -> Self {
        Self {
            user: user.to_string(),
            id,
            author: Some(user.to_string()),
            datetime: Some(datetime.to_string()),
            reposted_by: None,
            has_menu: true,
            menu: entries(&["Pin to your profile", "Delete", "Embed post"]),
            active_repost: false,
            undo_menu: Vec::new(),
            replying_to: None,
        }
    }

    /// Someone else's post, showing the menu a visitor gets. Its labels
    /// carry the author's handle, as the live site renders them.
    pub fn foreign(user: &str, id: u64, datetime: &str) -> Self {
        Self {
            author: Some(user.to_string()),
            menu: vec![
                format!("Follow @{user}"),
                format!("Mute @{user}"),
                format!("Block @{user}"),
                "Report post".to_string(),
            ],
            ..Self::own(user, id, datetime)
        }
    }

    /// `original` boosted by `reposter`, with an active repost control.
    pub fn repost(original: &str, id: u64, datetime: &str, reposter: &str) -> Self {
        Self {
            reposted_by: Some(reposter.to_string()),
            active_repost: true,
            undo_menu: entries(&["Undo repost", "Quote"]),
            ..Self::foreign(original, id, datetime)
        }
    }

    pub fn without_author(mut self) -> Self {
        self.author = None;
        self
    }

    pub fn with_menu(mut self, menu: &[&str]) -> Self {
        self.menu = entries(menu);
        self
    }

    pub fn without_menu(mut self) -> Self {
        self.has_menu = false;
        self
    }

    pub fn replying_to(mut self, user: &str) -> Self {
        self.replying_to = Some(user.to_string());
        self
    }

    pub fn undated(mut self) -> Self {
        self.datetime = None;
        self
    }

    pub fn permalink(&self) -> String {
        format!("/{}/status/{}", self.user, self.id)
    }

    pub fn key(&self) -> String {
        format!("/{}/status/{}", self.user.to_lowercase(), self.id)
    }

    pub fn item(&self) -> ContentItem {
        ContentItem::from_raw(&self.raw()).expect("mock posts always carry a permalink")
    }

    pub fn raw(&self) -> RawItem {
        RawItem {
            permalink: Some(self.permalink()),
            datetime: self.datetime.clone(),
            text: Some(format!("post number {}", self.id)),
            author_href: self.author.as_ref().map(|author| format!("/{author}")),
            social_context: self
                .reposted_by
                .as_ref()
                .map(|handle| format!("{handle} reposted")),
            social_context_href: self.reposted_by.as_ref().map(|handle| format!("/{handle}")),
            reply_context: self
                .replying_to
                .as_ref()
                .map(|handle| format!("Replying to @{handle}")),
            reply_to_href: self.replying_to.as_ref().map(|handle| format!("/{handle}")),
        }
    }
}

fn entries(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|label| label.to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuKind {
    Caret,
    Undo,
}

#[derive(Debug, Clone)]
struct OpenMenu {
    key: String,
    kind: MenuKind,
    entries: Vec<String>,
}

/// Scripted timeline. Posts render in pages as the viewport nears the
/// bottom; removed posts disappear from the DOM and shrink the page.
#[derive(Debug)]
pub struct MockPage {
    selectors: SelectorSection,
    posts: Vec<MockPost>,
    initial_render: usize,
    load_batch: usize,
    rendered: usize,
    scroll_y: f64,
    open: Option<OpenMenu>,
    confirm_pending: Option<String>,
    pub fail_navigations: u32,
    /// The confirmation button renders but never takes a click.
    pub fail_confirm: bool,
    /// Plain `scroll_by` calls hang; wheel and keys still work.
    pub stall_scrolls: bool,
    pub navigations: Vec<String>,
    pub reloads: u32,
    pub deleted: Vec<String>,
    pub unreposted: Vec<String>,
    pub escapes: u32,
    pub confirm_clicks: u32,
    pub clicks_with_menu_open: u32,
    pub trigger_clicks: HashMap<String, u32>,
}

impl MockPage {
    pub fn new(config: &SweepConfig, posts: Vec<MockPost>) -> Self {
        Self {
            selectors: config.selectors.clone(),
            rendered: posts.len().min(4),
            posts,
            initial_render: 4,
            load_batch: 4,
            scroll_y: 0.0,
            open: None,
            confirm_pending: None,
            fail_navigations: 0,
            fail_confirm: false,
            stall_scrolls: false,
            navigations: Vec::new(),
            reloads: 0,
            deleted: Vec::new(),
            unreposted: Vec::new(),
            escapes: 0,
            confirm_clicks: 0,
            clicks_with_menu_open: 0,
            trigger_clicks: HashMap::new(),
        }
    }

    pub fn with_paging(mut self, initial_render: usize, load_batch: usize) -> Self {
        self.initial_render = initial_render;
        self.load_batch = load_batch.max(1);
        self.rendered = initial_render.min(self.posts.len());
        self
    }

    pub fn remaining(&self) -> usize {
        self.posts.len()
    }

    pub fn menu_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn confirm_open(&self) -> bool {
        self.confirm_pending.is_some()
    }

    pub fn trigger_clicks_for(&self, key: &str) -> u32 {
        self.trigger_clicks.get(key).copied().unwrap_or(0)
    }

    fn page_height(&self) -> f64 {
        self.rendered as f64 * ITEM_PX
    }

    fn rendered_post(&self, scope: &Scope) -> Option<&MockPost> {
        let Scope::Item(key) = scope else {
            return None;
        };
        self.posts[..self.rendered].iter().find(|post| &post.key() == key)
    }

    fn scroll(&mut self, delta: f64) {
        let max_scroll = (self.page_height() - VIEWPORT_PX).max(0.0);
        self.scroll_y = (self.scroll_y + delta).clamp(0.0, max_scroll);
        if self.scroll_y + VIEWPORT_PX >= self.page_height() - LOAD_MARGIN_PX
            && self.rendered < self.posts.len()
        {
            self.rendered = (self.rendered + self.load_batch).min(self.posts.len());
        }
    }

    fn remove(&mut self, key: &str) {
        let before = self.posts.len();
        let rendered_hits = self.posts[..self.rendered]
            .iter()
            .filter(|post| post.key() == key)
            .count();
        self.posts.retain(|post| post.key() != key);
        self.rendered = self.rendered.saturating_sub(rendered_hits);
        assert!(self.posts.len() < before, "removed unknown post {key}");
    }

    fn reset_view(&mut self) {
        self.scroll_y = 0.0;
        self.rendered = self.initial_render.min(self.posts.len());
        self.open = None;
        self.confirm_pending = None;
    }

    fn not_found(selector: &str) -> BrowserError {
        BrowserError::ElementNotFound(selector.to_string())
    }
}

#[async_trait(?Send)]
impl PageDriver for MockPage {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        self.navigations.push(url.to_string());
        if self.fail_navigations > 0 {
            self.fail_navigations -= 1;
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".into(),
            });
        }
        self.reset_view();
        Ok(())
    }

    async fn reload(&mut self) -> BrowserResult<()> {
        self.reloads += 1;
        self.reset_view();
        Ok(())
    }

    async fn snapshot_items(&mut self) -> BrowserResult<Vec<RawItem>> {
        Ok(self.posts[..self.rendered].iter().map(MockPost::raw).collect())
    }

    async fn count(&mut self, scope: &Scope, selector: &str) -> BrowserResult<usize> {
        let s = &self.selectors;
        let count = if selector == s.menu_trigger {
            self.rendered_post(scope).map_or(0, |post| post.has_menu as usize)
        } else if selector == s.unrepost_button {
            self.rendered_post(scope)
                .map_or(0, |post| post.active_repost as usize)
        } else if selector == s.menu_item {
            self.open.as_ref().map_or(0, |menu| menu.entries.len())
        } else if selector == s.confirm_button {
            self.confirm_pending.is_some() as usize
        } else if selector == s.item {
            self.rendered
        } else {
            0
        };
        Ok(count)
    }

    async fn texts(&mut self, _scope: &Scope, selector: &str) -> BrowserResult<Vec<String>> {
        if selector == self.selectors.menu_item {
            Ok(self
                .open
                .as_ref()
                .map(|menu| menu.entries.clone())
                .unwrap_or_default())
        } else {
            Ok(Vec::new())
        }
    }

    async fn click(&mut self, scope: &Scope, selector: &str, index: usize) -> BrowserResult<()> {
        let selectors = self.selectors.clone();
        if selector == selectors.menu_trigger || selector == selectors.unrepost_button {
            if self.open.is_some() {
                self.clicks_with_menu_open += 1;
            }
            let caret = selector == selectors.menu_trigger;
            let post = self
                .rendered_post(scope)
                .filter(|post| if caret { post.has_menu } else { post.active_repost })
                .cloned()
                .ok_or_else(|| Self::not_found(selector))?;
            if caret {
                *self.trigger_clicks.entry(post.key()).or_default() += 1;
            }
            self.open = Some(OpenMenu {
                key: post.key(),
                kind: if caret { MenuKind::Caret } else { MenuKind::Undo },
                entries: if caret { post.menu } else { post.undo_menu },
            });
            return Ok(());
        }
        if selector == selectors.menu_item {
            let menu = self.open.take().ok_or_else(|| Self::not_found(selector))?;
            let entry = menu
                .entries
                .get(index)
                .ok_or_else(|| Self::not_found(selector))?
                .to_lowercase();
            match menu.kind {
                MenuKind::Caret if entry.contains("delete") || entry.contains("eliminar") => {
                    self.confirm_pending = Some(menu.key);
                }
                MenuKind::Undo if entry.contains("undo") => {
                    self.remove(&menu.key);
                    self.unreposted.push(menu.key);
                }
                _ => {}
            }
            return Ok(());
        }
        if selector == selectors.confirm_button {
            if self.fail_confirm && self.confirm_pending.is_some() {
                return Err(Self::not_found(selector));
            }
            let key = self
                .confirm_pending
                .take()
                .ok_or_else(|| Self::not_found(selector))?;
            self.confirm_clicks += 1;
            self.remove(&key);
            self.deleted.push(key);
            return Ok(());
        }
        Err(Self::not_found(selector))
    }

    async fn press_key(&mut self, key: Key) -> BrowserResult<()> {
        match key {
            Key::Escape => {
                self.escapes += 1;
                self.open = None;
                self.confirm_pending = None;
            }
            Key::PageDown => self.scroll(VIEWPORT_PX * 0.9),
        }
        Ok(())
    }

    async fn scroll_by(&mut self, delta_y: f64) -> BrowserResult<()> {
        if self.stall_scrolls {
            tokio::time::sleep(STALL).await;
        }
        self.scroll(delta_y);
        Ok(())
    }

    async fn wheel(&mut self, delta_y: f64) -> BrowserResult<()> {
        self.scroll(delta_y);
        Ok(())
    }

    async fn scroll_to_top(&mut self) -> BrowserResult<()> {
        self.scroll_y = 0.0;
        Ok(())
    }

    async fn content_extent(&mut self) -> BrowserResult<u64> {
        Ok((self.scroll_y + VIEWPORT_PX).min(self.page_height().max(VIEWPORT_PX)) as u64)
    }
}

/// Captures everything the run reports, optionally cancelling once enough
/// removals have been seen.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<SweepEvent>>,
    pub progress: Mutex<Vec<Progress>>,
    cancel_after: Option<(u64, CancellationSignal)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after(removals: u64, signal: CancellationSignal) -> Self {
        Self {
            cancel_after: Some((removals, signal)),
            ..Self::default()
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }

    pub fn keys(&self, kind: EventKind) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.kind == kind)
            .filter_map(|event| event.identity_key.clone())
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: &SweepEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn progress(&self, progress: Progress) {
        if let Some((limit, signal)) = &self.cancel_after {
            if progress.current >= *limit {
                signal.cancel();
            }
        }
        self.progress.lock().unwrap().push(progress);
    }
}
