mod common;

use std::time::Duration;

use async_trait::async_trait;
use postsweep_core::browser::{BrowserResult, Key, PageDriver, Scope};
use postsweep_core::sweep::{RawItem, ScrollEngine, SweepPhase};

use common::{fixture_config, seeded_human, MockPage, MockPost};

/// Extent grows with every scroll gesture until `growth_limit` of them,
/// then never again.
struct GrowthLimitedPage {
    growth_limit: u32,
    moves: u32,
}

impl GrowthLimitedPage {
    fn new(growth_limit: u32) -> Self {
        Self {
            growth_limit,
            moves: 0,
        }
    }

    fn bump(&mut self) {
        self.moves += 1;
    }
}

#[async_trait(?Send)]
impl PageDriver for GrowthLimitedPage {
    async fn goto(&mut self, _url: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn reload(&mut self) -> BrowserResult<()> {
        Ok(())
    }

    async fn snapshot_items(&mut self) -> BrowserResult<Vec<RawItem>> {
        Ok(Vec::new())
    }

    async fn count(&mut self, _scope: &Scope, _selector: &str) -> BrowserResult<usize> {
        Ok(0)
    }

    async fn texts(&mut self, _scope: &Scope, _selector: &str) -> BrowserResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn click(&mut self, _scope: &Scope, _selector: &str, _index: usize) -> BrowserResult<()> {
        Ok(())
    }

    async fn press_key(&mut self, key: Key) -> BrowserResult<()> {
        if key == Key::PageDown {
            self.bump();
        }
        Ok(())
    }

    async fn scroll_by(&mut self, _delta_y: f64) -> BrowserResult<()> {
        self.bump();
        Ok(())
    }

    async fn wheel(&mut self, _delta_y: f64) -> BrowserResult<()> {
        self.bump();
        Ok(())
    }

    async fn scroll_to_top(&mut self) -> BrowserResult<()> {
        Ok(())
    }

    async fn content_extent(&mut self) -> BrowserResult<u64> {
        Ok(1_000 + u64::from(self.moves.min(self.growth_limit)) * 400)
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_page_is_exhausted_within_threshold() {
    let config = fixture_config();
    let threshold = config.scroll.no_growth_threshold;
    let growth_limit = 5;
    let mut page = GrowthLimitedPage::new(growth_limit);
    let mut human = seeded_human(&config, 3);
    let mut engine = ScrollEngine::new(config.scroll.clone(), Duration::from_millis(500));
    engine.sweep_from_top(&mut page).await;

    let mut total_steps = 0;
    for _ in 0..20 {
        let progress = engine.load_more(&mut page, &mut human, 1).await;
        total_steps += progress.steps;
        if progress.exhausted {
            break;
        }
    }

    assert_eq!(engine.phase(), SweepPhase::Exhausted);
    assert!(total_steps >= threshold, "exhausted after only {total_steps} steps");
    assert!(
        total_steps <= growth_limit + threshold,
        "took {total_steps} steps for {growth_limit} growth steps"
    );

    let again = engine.load_more(&mut page, &mut human, 1).await;
    assert!(again.exhausted);
    assert_eq!(again.steps, 0);
}

#[tokio::test(start_paused = true)]
async fn restart_clears_exhaustion() {
    let config = fixture_config();
    let mut page = GrowthLimitedPage::new(0);
    let mut human = seeded_human(&config, 4);
    let mut engine = ScrollEngine::new(config.scroll.clone(), Duration::from_millis(500));

    engine.sweep_from_top(&mut page).await;
    while !engine.load_more(&mut page, &mut human, 1).await.exhausted {}
    assert!(engine.is_exhausted());

    engine.sweep_from_top(&mut page).await;
    assert_eq!(engine.phase(), SweepPhase::Restarted);
    assert_eq!(engine.sweeps(), 2);
}

#[tokio::test(start_paused = true)]
async fn load_more_stops_once_enough_items_render() {
    let config = fixture_config();
    let posts = (1..=20)
        .map(|id| MockPost::own("example_user", id, "2014-05-01T12:00:00.000Z"))
        .collect();
    let mut page = MockPage::new(&config, posts).with_paging(4, 4);
    let mut human = seeded_human(&config, 5);
    let mut engine = ScrollEngine::new(config.scroll.clone(), Duration::from_millis(500));
    engine.sweep_from_top(&mut page).await;

    let progress = engine.load_more(&mut page, &mut human, 3).await;

    assert!(progress.new_items >= 3, "only {} new items", progress.new_items);
    assert!(!progress.exhausted);
    assert!(progress.steps <= config.scroll.max_steps_per_load);
}
