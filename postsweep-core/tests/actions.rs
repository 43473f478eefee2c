mod common;

use std::time::Duration;

use async_trait::async_trait;
use postsweep_core::browser::{BrowserResult, Key, PageDriver, Scope};
use postsweep_core::sweep::{ActionOutcome, FailureReason, RawItem};

use common::{executor, fixture_config, MockPage, MockPost};

const HANDLE: &str = "example_user";
const OLD: &str = "2014-05-01T12:00:00.000Z";

#[tokio::test(start_paused = true)]
async fn own_post_is_deleted_through_confirmation() {
    let config = fixture_config();
    let post = MockPost::own(HANDLE, 1, OLD);
    let mut page = MockPage::new(&config, vec![post.clone()]);

    let report = executor(&config, true).act(&mut page, &post.item()).await;

    assert_eq!(report.outcome, ActionOutcome::Deleted);
    assert_eq!(report.delete_failure, None);
    assert_eq!(page.confirm_clicks, 1);
    assert_eq!(page.deleted, vec![post.key()]);
    assert!(!page.menu_open());
}

#[tokio::test(start_paused = true)]
async fn missing_delete_entry_falls_back_to_undo_repost() {
    let config = fixture_config();
    let post = MockPost::repost("someone", 2, OLD, HANDLE);
    let mut page = MockPage::new(&config, vec![post.clone()]);

    let report = executor(&config, true).act(&mut page, &post.item()).await;

    assert_eq!(report.outcome, ActionOutcome::Unreposted);
    assert_eq!(report.delete_failure, Some(FailureReason::NoDeleteItem));
    assert_eq!(page.unreposted, vec![post.key()]);
    assert!(page.escapes >= 1, "the delete menu must be closed before the fallback");
    assert_eq!(page.clicks_with_menu_open, 0);
}

#[tokio::test(start_paused = true)]
async fn plain_item_keeps_delete_reason_when_fallback_finds_nothing() {
    let config = fixture_config();
    let post = MockPost::own(HANDLE, 3, OLD).without_menu();
    let mut page = MockPage::new(&config, vec![post.clone()]);

    let report = executor(&config, true).act(&mut page, &post.item()).await;

    assert_eq!(report.outcome, ActionOutcome::Failed(FailureReason::NoMenu));
    assert_eq!(report.delete_failure, Some(FailureReason::NoMenu));
    assert_eq!(page.remaining(), 1);
}

#[tokio::test(start_paused = true)]
async fn repost_marker_reports_undo_reason() {
    let config = fixture_config();
    let mut post = MockPost::repost("someone", 4, OLD, HANDLE);
    post.active_repost = false;
    let mut page = MockPage::new(&config, vec![post.clone()]);

    let report = executor(&config, true).act(&mut page, &post.item()).await;

    assert_eq!(report.outcome, ActionOutcome::Failed(FailureReason::NotARepost));
    assert_eq!(report.delete_failure, Some(FailureReason::NoDeleteItem));
}

#[tokio::test(start_paused = true)]
async fn disabled_reposts_skip_the_fallback() {
    let config = fixture_config();
    let post = MockPost::repost("someone", 5, OLD, HANDLE);
    let mut page = MockPage::new(&config, vec![post.clone()]);
    let executor = executor(&config, false);

    assert_eq!(
        executor.attempt_undo_repost(&mut page, &post.item()).await,
        ActionOutcome::Failed(FailureReason::RepostDisabled)
    );
    let report = executor.act(&mut page, &post.item()).await;
    assert_eq!(report.outcome, ActionOutcome::Failed(FailureReason::NoDeleteItem));
    assert!(page.unreposted.is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_menu_is_closed_and_reported() {
    let config = fixture_config();
    let post = MockPost::own(HANDLE, 6, OLD).with_menu(&[]);
    let mut page = MockPage::new(&config, vec![post.clone()]);

    let outcome = executor(&config, false)
        .attempt_delete(&mut page, &post.item())
        .await;

    assert_eq!(outcome, ActionOutcome::Failed(FailureReason::MenuEmpty));
    assert_eq!(page.escapes, 1);
    assert!(!page.menu_open());
}

#[tokio::test(start_paused = true)]
async fn localized_menu_is_matched() {
    let config = fixture_config();
    let post = MockPost::own(HANDLE, 7, OLD).with_menu(&[
        "Fijar en tu perfil",
        "Eliminar",
        "Insertar post",
    ]);
    let mut page = MockPage::new(&config, vec![post.clone()]);

    let outcome = executor(&config, false)
        .attempt_delete(&mut page, &post.item())
        .await;

    assert_eq!(outcome, ActionOutcome::Deleted);
    assert_eq!(page.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn unclickable_confirmation_is_dismissed_and_not_counted() {
    let config = fixture_config();
    let post = MockPost::own(HANDLE, 12, OLD);
    let mut page = MockPage::new(&config, vec![post.clone()]);
    page.fail_confirm = true;

    let outcome = executor(&config, false)
        .attempt_delete(&mut page, &post.item())
        .await;

    assert_eq!(outcome, ActionOutcome::Failed(FailureReason::NoDeleteItem));
    assert!(!page.confirm_open(), "the confirmation sheet must be closed");
    assert_eq!(page.escapes, 1);
    assert_eq!(page.confirm_clicks, 0);
    assert_eq!(page.remaining(), 1);
}

#[tokio::test(start_paused = true)]
async fn handle_labels_on_a_visitor_menu_are_not_actions() {
    let config = fixture_config();
    let post = MockPost::foreign("silvia", 13, OLD).with_menu(&[
        "Follow @silvia",
        "Mute @silvia",
        "Block @deleteme",
        "Report post",
    ]);
    let mut page = MockPage::new(&config, vec![post.clone()]);

    let outcome = executor(&config, false)
        .attempt_delete(&mut page, &post.item())
        .await;

    assert_eq!(outcome, ActionOutcome::Failed(FailureReason::NoDeleteItem));
    assert!(!page.confirm_open());
    assert!(!page.menu_open());
    assert_eq!(page.remaining(), 1);
}

#[tokio::test(start_paused = true)]
async fn capability_check_always_closes_the_menu() {
    let config = fixture_config();
    let own = MockPost::own(HANDLE, 8, OLD);
    let foreign = MockPost::foreign("someone", 9, OLD);
    let bare = MockPost::own(HANDLE, 10, OLD).without_menu();
    let mut page = MockPage::new(&config, vec![own.clone(), foreign.clone(), bare.clone()]);
    let executor = executor(&config, true);

    assert!(executor.probe_delete_capability(&mut page, &own.item()).await);
    assert!(!page.menu_open());
    assert!(!executor.probe_delete_capability(&mut page, &foreign.item()).await);
    assert!(!page.menu_open());
    assert!(!executor.probe_delete_capability(&mut page, &bare.item()).await);

    assert_eq!(page.escapes, 2);
    assert_eq!(page.remaining(), 3, "a capability check must never delete");
    assert_eq!(page.clicks_with_menu_open, 0);
}

/// Every call hangs far past the per-call bound.
struct StalledPage;

const STALL: Duration = Duration::from_secs(3600);

#[async_trait(?Send)]
impl PageDriver for StalledPage {
    async fn goto(&mut self, _url: &str) -> BrowserResult<()> {
        tokio::time::sleep(STALL).await;
        Ok(())
    }

    async fn reload(&mut self) -> BrowserResult<()> {
        tokio::time::sleep(STALL).await;
        Ok(())
    }

    async fn snapshot_items(&mut self) -> BrowserResult<Vec<RawItem>> {
        tokio::time::sleep(STALL).await;
        Ok(Vec::new())
    }

    async fn count(&mut self, _scope: &Scope, _selector: &str) -> BrowserResult<usize> {
        tokio::time::sleep(STALL).await;
        Ok(1)
    }

    async fn texts(&mut self, _scope: &Scope, _selector: &str) -> BrowserResult<Vec<String>> {
        tokio::time::sleep(STALL).await;
        Ok(vec!["Delete".into()])
    }

    async fn click(&mut self, _scope: &Scope, _selector: &str, _index: usize) -> BrowserResult<()> {
        tokio::time::sleep(STALL).await;
        Ok(())
    }

    async fn press_key(&mut self, _key: Key) -> BrowserResult<()> {
        tokio::time::sleep(STALL).await;
        Ok(())
    }

    async fn scroll_by(&mut self, _delta_y: f64) -> BrowserResult<()> {
        Ok(())
    }

    async fn wheel(&mut self, _delta_y: f64) -> BrowserResult<()> {
        Ok(())
    }

    async fn scroll_to_top(&mut self) -> BrowserResult<()> {
        Ok(())
    }

    async fn content_extent(&mut self) -> BrowserResult<u64> {
        Ok(0)
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_page_resolves_to_safe_defaults() {
    let config = fixture_config();
    let item = MockPost::own(HANDLE, 11, OLD).item();
    let executor = executor(&config, true);
    let started = tokio::time::Instant::now();

    let report = executor.act(&mut StalledPage, &item).await;

    assert_eq!(report.outcome, ActionOutcome::Failed(FailureReason::NoMenu));
    assert!(!executor.probe_delete_capability(&mut StalledPage, &item).await);
    assert!(started.elapsed() < Duration::from_secs(60));
}
