use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::debug;

use crate::browser::{bounded, bounded_ok, Key, PageDriver, Scope};
use crate::config::{SelectorSection, SweepConfig, TimeoutSection};
use crate::error::ConfigError;

use super::item::ContentItem;
use super::keywords::{KeywordMatcher, LocaleKeywords, MenuAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    NoMenu,
    MenuEmpty,
    NoDeleteItem,
    NoUndoItem,
    NotARepost,
    RepostDisabled,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::NoMenu => "no-menu",
            FailureReason::MenuEmpty => "menu-empty",
            FailureReason::NoDeleteItem => "no-delete-item",
            FailureReason::NoUndoItem => "no-undo-item",
            FailureReason::NotARepost => "not-a-repost",
            FailureReason::RepostDisabled => "repost-disabled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ActionOutcome {
    Deleted,
    Unreposted,
    Failed(FailureReason),
}

impl ActionOutcome {
    /// The item is gone from the timeline either way.
    pub fn is_removal(self) -> bool {
        matches!(self, ActionOutcome::Deleted | ActionOutcome::Unreposted)
    }
}

/// Result of the delete → undo-repost chain. `delete_failure` keeps the
/// first leg's reason when the fallback ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub outcome: ActionOutcome,
    pub delete_failure: Option<FailureReason>,
}

#[derive(Debug, Clone, Copy)]
pub struct ActionTimings {
    pub probe: Duration,
    pub menu_settle: Duration,
}

impl From<&TimeoutSection> for ActionTimings {
    fn from(section: &TimeoutSection) -> Self {
        Self {
            probe: Duration::from_millis(section.probe_ms),
            menu_settle: Duration::from_millis(section.menu_settle_ms),
        }
    }
}

/// Drives the item menus. Every driver call is bounded and every failure
/// folds into an `ActionOutcome`; nothing here returns an error.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    selectors: SelectorSection,
    timings: ActionTimings,
    delete: KeywordMatcher,
    undo: KeywordMatcher,
    handle_reposts: bool,
}

impl ActionExecutor {
    pub fn new(
        selectors: SelectorSection,
        timings: ActionTimings,
        keywords: &LocaleKeywords,
        handle_reposts: bool,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            selectors,
            timings,
            delete: keywords.matcher(MenuAction::Delete)?,
            undo: keywords.matcher(MenuAction::UndoRepost)?,
            handle_reposts,
        })
    }

    pub fn from_config(config: &SweepConfig, handle_reposts: bool) -> Result<Self, ConfigError> {
        let keywords = LocaleKeywords::builtin().with_overrides(&config.keywords);
        Self::new(
            config.selectors.clone(),
            ActionTimings::from(&config.timeouts),
            &keywords,
            handle_reposts,
        )
        .map_err(|err| ConfigError::Invalid(format!("invalid menu keyword: {err}")))
    }

    pub fn handles_reposts(&self) -> bool {
        self.handle_reposts
    }

    /// Delete first; fall back to undo-repost when enabled.
    pub async fn act(&self, driver: &mut dyn PageDriver, item: &ContentItem) -> ActionReport {
        let reason = match self.attempt_delete(driver, item).await {
            ActionOutcome::Failed(reason) => reason,
            outcome => {
                return ActionReport {
                    outcome,
                    delete_failure: None,
                }
            }
        };
        if !self.handle_reposts {
            return ActionReport {
                outcome: ActionOutcome::Failed(reason),
                delete_failure: Some(reason),
            };
        }
        let outcome = match self.attempt_undo_repost(driver, item).await {
            ActionOutcome::Failed(undo_reason) if item.is_repost_marker => {
                ActionOutcome::Failed(undo_reason)
            }
            ActionOutcome::Failed(_) => ActionOutcome::Failed(reason),
            outcome => outcome,
        };
        ActionReport {
            outcome,
            delete_failure: Some(reason),
        }
    }

    pub async fn attempt_delete(
        &self,
        driver: &mut dyn PageDriver,
        item: &ContentItem,
    ) -> ActionOutcome {
        let scope = Scope::item(&item.identity_key);
        if !self
            .open_menu(driver, &scope, &self.selectors.menu_trigger)
            .await
        {
            return ActionOutcome::Failed(FailureReason::NoMenu);
        }
        let entries = self.read_entries(driver).await;
        if entries.is_empty() {
            self.close_menu(driver).await;
            return ActionOutcome::Failed(FailureReason::MenuEmpty);
        }
        let Some(index) = self.delete.position(&entries) else {
            debug!(item = %item.identity_key, entries = ?entries, "no delete entry in menu");
            self.close_menu(driver).await;
            return ActionOutcome::Failed(FailureReason::NoDeleteItem);
        };
        if !self.click_entry(driver, index).await {
            self.close_menu(driver).await;
            return ActionOutcome::Failed(FailureReason::NoDeleteItem);
        }
        sleep(self.timings.menu_settle).await;
        if !self.confirm_if_present(driver).await {
            // An unconfirmed dialog would swallow the next click.
            self.close_menu(driver).await;
            return ActionOutcome::Failed(FailureReason::NoDeleteItem);
        }
        ActionOutcome::Deleted
    }

    pub async fn attempt_undo_repost(
        &self,
        driver: &mut dyn PageDriver,
        item: &ContentItem,
    ) -> ActionOutcome {
        if !self.handle_reposts {
            return ActionOutcome::Failed(FailureReason::RepostDisabled);
        }
        let scope = Scope::item(&item.identity_key);
        // Only the active-repost control carries the unrepost selector; a
        // plain repost button never matches it.
        if !self
            .open_menu(driver, &scope, &self.selectors.unrepost_button)
            .await
        {
            return ActionOutcome::Failed(FailureReason::NotARepost);
        }
        let entries = self.read_entries(driver).await;
        let Some(index) = self.undo.position(&entries) else {
            self.close_menu(driver).await;
            return ActionOutcome::Failed(FailureReason::NoUndoItem);
        };
        if !self.click_entry(driver, index).await {
            self.close_menu(driver).await;
            return ActionOutcome::Failed(FailureReason::NoUndoItem);
        }
        sleep(self.timings.menu_settle).await;
        ActionOutcome::Unreposted
    }

    /// Read-only check: does the item's menu offer a delete entry? The menu
    /// is closed on every path once it was opened, so callers must not wrap
    /// this in an outer timeout that could drop it half-way.
    pub async fn probe_delete_capability(
        &self,
        driver: &mut dyn PageDriver,
        item: &ContentItem,
    ) -> bool {
        let scope = Scope::item(&item.identity_key);
        if !self
            .open_menu(driver, &scope, &self.selectors.menu_trigger)
            .await
        {
            return false;
        }
        let entries = self.read_entries(driver).await;
        let capable = self.delete.position(&entries).is_some();
        self.close_menu(driver).await;
        capable
    }

    async fn open_menu(&self, driver: &mut dyn PageDriver, scope: &Scope, trigger: &str) -> bool {
        let probe = self.timings.probe;
        let present = bounded(probe, "menu trigger", driver.count(scope, trigger), 0).await;
        if present == 0 {
            return false;
        }
        if !bounded_ok(probe, "open menu", driver.click(scope, trigger, 0)).await {
            // A half-open menu would swallow the next click.
            self.close_menu(driver).await;
            return false;
        }
        sleep(self.timings.menu_settle).await;
        true
    }

    async fn read_entries(&self, driver: &mut dyn PageDriver) -> Vec<String> {
        bounded(
            self.timings.probe,
            "menu entries",
            driver.texts(&Scope::Page, &self.selectors.menu_item),
            Vec::new(),
        )
        .await
    }

    async fn click_entry(&self, driver: &mut dyn PageDriver, index: usize) -> bool {
        bounded_ok(
            self.timings.probe,
            "menu entry",
            driver.click(&Scope::Page, &self.selectors.menu_item, index),
        )
        .await
    }

    /// False only when a confirmation showed up and could not be clicked.
    async fn confirm_if_present(&self, driver: &mut dyn PageDriver) -> bool {
        let probe = self.timings.probe;
        let confirm = &self.selectors.confirm_button;
        let present = bounded(probe, "confirm", driver.count(&Scope::Page, confirm), 0).await;
        if present == 0 {
            return true;
        }
        if !bounded_ok(probe, "confirm click", driver.click(&Scope::Page, confirm, 0)).await {
            return false;
        }
        sleep(self.timings.menu_settle).await;
        true
    }

    async fn close_menu(&self, driver: &mut dyn PageDriver) {
        bounded_ok(self.timings.probe, "close menu", driver.press_key(Key::Escape)).await;
    }
}
