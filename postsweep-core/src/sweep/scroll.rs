use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::browser::{
    bounded, bounded_ok, HumanBehaviorSimulator, Key, PageDriver, ScrollMethod, ScrollProfile,
};
use crate::config::ScrollSection;

use super::item::identity_key_from_permalink;

/// One wheel notch in CSS pixels.
const WHEEL_NOTCH_PX: f64 = 120.0;
/// Roughly one viewport per PageDown.
const KEYBOARD_PAGE_PX: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepPhase {
    Scrolling,
    Converging,
    Exhausted,
    Restarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadProgress {
    pub steps: u32,
    pub new_items: usize,
    pub exhausted: bool,
}

/// What to do once a sweep has run dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDecision {
    Restart,
    Reload,
    Done,
}

#[derive(Debug, Clone)]
pub struct ScrollEngine {
    settings: ScrollSection,
    probe: Duration,
    phase: SweepPhase,
    last_extent: Option<u64>,
    stalled_steps: u32,
    sweeps: u32,
    empty_sweeps: u32,
    reload_spent: bool,
}

impl ScrollEngine {
    pub fn new(settings: ScrollSection, probe: Duration) -> Self {
        Self {
            settings,
            probe,
            phase: SweepPhase::Scrolling,
            last_extent: None,
            stalled_steps: 0,
            sweeps: 0,
            empty_sweeps: 0,
            reload_spent: false,
        }
    }

    pub fn phase(&self) -> SweepPhase {
        self.phase
    }

    pub fn sweeps(&self) -> u32 {
        self.sweeps
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == SweepPhase::Exhausted
    }

    /// Fresh per-tab bookkeeping; sweep counters included.
    pub fn reset(&mut self) {
        self.phase = SweepPhase::Scrolling;
        self.last_extent = None;
        self.stalled_steps = 0;
        self.sweeps = 0;
        self.empty_sweeps = 0;
        self.reload_spent = false;
    }

    /// Jumps back to the top and starts a new sweep.
    pub async fn sweep_from_top(&mut self, driver: &mut dyn PageDriver) {
        bounded_ok(self.probe, "scroll to top", driver.scroll_to_top()).await;
        self.sweeps = self.sweeps.saturating_add(1);
        self.phase = if self.sweeps > 1 {
            SweepPhase::Restarted
        } else {
            SweepPhase::Scrolling
        };
        self.last_extent = None;
        self.stalled_steps = 0;
        debug!(sweep = self.sweeps, "sweep started");
    }

    /// Scrolls until at least `min_new_items` unseen items render, the page
    /// stops growing for `no_growth_threshold` steps, or the per-call step
    /// cap is hit.
    pub async fn load_more(
        &mut self,
        driver: &mut dyn PageDriver,
        human: &mut HumanBehaviorSimulator,
        min_new_items: usize,
    ) -> LoadProgress {
        let mut progress = LoadProgress::default();
        if self.is_exhausted() {
            progress.exhausted = true;
            return progress;
        }
        if self.last_extent.is_none() {
            self.last_extent = Some(self.read_extent(driver, 0).await);
        }
        let before = self.rendered_keys(driver).await;
        let wanted = min_new_items.max(1);

        while progress.steps < self.settings.max_steps_per_load.max(1) {
            let profile = human.choose_scroll_profile();
            self.perform(driver, human, &profile).await;
            sleep(human.scroll_settle(&profile)).await;
            progress.steps += 1;

            let previous = self.last_extent.unwrap_or(0);
            let extent = self.read_extent(driver, previous).await;
            self.last_extent = Some(extent);
            if extent > previous {
                self.stalled_steps = 0;
                self.phase = SweepPhase::Scrolling;
            } else {
                self.stalled_steps += 1;
                self.phase = SweepPhase::Converging;
            }
            trace!(
                step = progress.steps,
                extent,
                stalled = self.stalled_steps,
                method = ?profile.method,
                "scroll step"
            );

            progress.new_items = self
                .rendered_keys(driver)
                .await
                .difference(&before)
                .count();
            if self.stalled_steps >= self.settings.no_growth_threshold {
                self.phase = SweepPhase::Exhausted;
                progress.exhausted = true;
                debug!(sweep = self.sweeps, "timeline exhausted");
                break;
            }
            if progress.new_items >= wanted {
                break;
            }
        }
        progress
    }

    /// Books the end of a sweep and decides whether another one is worth it.
    pub fn finish_sweep(&mut self, actions: u64) -> SweepDecision {
        if actions > 0 {
            self.empty_sweeps = 0;
            self.reload_spent = false;
        } else {
            self.empty_sweeps = self.empty_sweeps.saturating_add(1);
        }
        if self.sweeps >= self.settings.max_sweeps {
            debug!(sweeps = self.sweeps, "sweep cap reached");
            return SweepDecision::Done;
        }
        if actions == 0 && self.empty_sweeps >= self.settings.empty_sweeps_before_reload.max(1) {
            if self.reload_spent {
                return SweepDecision::Done;
            }
            self.reload_spent = true;
            self.empty_sweeps = 0;
            return SweepDecision::Reload;
        }
        SweepDecision::Restart
    }

    async fn perform(
        &self,
        driver: &mut dyn PageDriver,
        human: &mut HumanBehaviorSimulator,
        profile: &ScrollProfile,
    ) {
        match profile.method {
            ScrollMethod::Programmatic => {
                bounded_ok(self.probe, "scroll", driver.scroll_by(profile.distance)).await;
            }
            ScrollMethod::Wheel => {
                let mut remaining = profile.distance;
                while remaining > 0.0 {
                    let notch = remaining.min(WHEEL_NOTCH_PX);
                    if !bounded_ok(self.probe, "wheel", driver.wheel(notch)).await {
                        break;
                    }
                    remaining -= notch;
                    sleep(human.wheel_gap()).await;
                }
            }
            ScrollMethod::Keyboard => {
                let presses = (profile.distance / KEYBOARD_PAGE_PX).ceil().max(1.0) as u32;
                for _ in 0..presses {
                    if !bounded_ok(self.probe, "page down", driver.press_key(Key::PageDown)).await
                    {
                        break;
                    }
                    sleep(human.wheel_gap() * 3).await;
                }
            }
        }
    }

    async fn read_extent(&self, driver: &mut dyn PageDriver, fallback: u64) -> u64 {
        bounded(self.probe, "content extent", driver.content_extent(), fallback).await
    }

    async fn rendered_keys(&self, driver: &mut dyn PageDriver) -> HashSet<String> {
        bounded(self.probe, "snapshot", driver.snapshot_items(), Vec::new())
            .await
            .iter()
            .filter_map(|raw| raw.permalink.as_deref())
            .filter_map(identity_key_from_permalink)
            .collect()
    }
}
