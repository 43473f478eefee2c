use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::config::HumanSimulationSection;
use crate::sweep::ContentItem;

use super::driver::PageDriver;
use super::probe::bounded_ok;
use super::weighted::weighted_choice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Focused,
    Normal,
    Distracted,
    Impatient,
}

impl Mood {
    pub fn delay_multiplier(self) -> f64 {
        match self {
            Mood::Focused => 0.7,
            Mood::Impatient => 0.85,
            Mood::Normal => 1.0,
            Mood::Distracted => 1.6,
        }
    }
}

/// Upper bound for the simulator's own driver calls until the orchestrator
/// hands over the configured probe timeout.
const DEFAULT_CALL_BOUND: Duration = Duration::from_secs(5);

const MOODS: &[(Mood, u32)] = &[
    (Mood::Focused, 25),
    (Mood::Normal, 45),
    (Mood::Distracted, 15),
    (Mood::Impatient, 15),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayBand {
    Quick,
    Normal,
    Slow,
    VerySlow,
}

impl DelayBand {
    /// Factor applied to the speed preset's base delay.
    fn factor_range(self) -> (f64, f64) {
        match self {
            DelayBand::Quick => (0.4, 0.8),
            DelayBand::Normal => (0.8, 1.2),
            DelayBand::Slow => (1.2, 2.0),
            DelayBand::VerySlow => (2.0, 3.5),
        }
    }
}

const DELAY_BANDS: &[(DelayBand, u32)] = &[
    (DelayBand::Quick, 30),
    (DelayBand::Normal, 45),
    (DelayBand::Slow, 18),
    (DelayBand::VerySlow, 7),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollSize {
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
}

impl ScrollSize {
    fn distance_px(self) -> (f64, f64) {
        match self {
            ScrollSize::Tiny => (80.0, 200.0),
            ScrollSize::Small => (200.0, 450.0),
            ScrollSize::Medium => (450.0, 800.0),
            ScrollSize::Large => (800.0, 1400.0),
            ScrollSize::Huge => (1400.0, 2400.0),
        }
    }

    fn settle_factor(self) -> f64 {
        match self {
            ScrollSize::Tiny => 0.5,
            ScrollSize::Small => 0.8,
            ScrollSize::Medium => 1.0,
            ScrollSize::Large => 1.3,
            ScrollSize::Huge => 1.7,
        }
    }
}

const SCROLL_SIZES: &[(ScrollSize, u32)] = &[
    (ScrollSize::Tiny, 10),
    (ScrollSize::Small, 25),
    (ScrollSize::Medium, 35),
    (ScrollSize::Large, 20),
    (ScrollSize::Huge, 10),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollMethod {
    Programmatic,
    Wheel,
    Keyboard,
}

const SCROLL_METHODS: &[(ScrollMethod, u32)] = &[
    (ScrollMethod::Programmatic, 45),
    (ScrollMethod::Wheel, 40),
    (ScrollMethod::Keyboard, 15),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollProfile {
    pub size: ScrollSize,
    pub method: ScrollMethod,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interjection {
    Hesitate,
    Jiggle,
    Reread,
}

const INTERJECTIONS: &[(Interjection, u32)] = &[
    (Interjection::Hesitate, 50),
    (Interjection::Jiggle, 35),
    (Interjection::Reread, 15),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HumanState {
    pub mood: Mood,
    pub actions_since_break: u32,
    pub deletion_streak: u32,
}

impl Default for HumanState {
    fn default() -> Self {
        Self {
            mood: Mood::Normal,
            actions_since_break: 0,
            deletion_streak: 0,
        }
    }
}

/// Pacing for one run. Owns `HumanState`; nothing else mutates it.
pub struct HumanBehaviorSimulator {
    config: HumanSimulationSection,
    delay_range_ms: [u64; 2],
    state: HumanState,
    rng: Box<dyn RngCore + Send>,
    call_bound: Duration,
    actions_until_reroll: u32,
    streak_limit: u32,
    break_budget: u32,
}

impl std::fmt::Debug for HumanBehaviorSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HumanBehaviorSimulator")
            .field("state", &self.state)
            .field("delay_range_ms", &self.delay_range_ms)
            .field("call_bound", &self.call_bound)
            .field("actions_until_reroll", &self.actions_until_reroll)
            .field("streak_limit", &self.streak_limit)
            .field("break_budget", &self.break_budget)
            .finish()
    }
}

impl HumanBehaviorSimulator {
    pub fn new(config: HumanSimulationSection, delay_range_ms: [u64; 2]) -> Self {
        Self::with_rng(config, delay_range_ms, Box::new(StdRng::from_entropy()))
    }

    pub fn with_rng(
        config: HumanSimulationSection,
        delay_range_ms: [u64; 2],
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let mut simulator = Self {
            config,
            delay_range_ms,
            state: HumanState::default(),
            rng,
            call_bound: DEFAULT_CALL_BOUND,
            actions_until_reroll: 0,
            streak_limit: 0,
            break_budget: 0,
        };
        simulator.reset();
        simulator
    }

    /// Bound applied to every scroll the simulator issues itself.
    pub fn with_call_bound(mut self, bound: Duration) -> Self {
        self.set_call_bound(bound);
        self
    }

    pub fn set_call_bound(&mut self, bound: Duration) {
        self.call_bound = bound;
    }

    pub fn call_bound(&self) -> Duration {
        self.call_bound
    }

    /// Fresh state for a new run.
    pub fn reset(&mut self) {
        self.state = HumanState::default();
        self.reroll_mood();
        self.streak_limit = self.draw_u32(self.config.streak_limit).max(1);
        self.break_budget = self.draw_u32(self.config.break_every_actions).max(1);
    }

    pub fn state(&self) -> &HumanState {
        &self.state
    }

    pub fn mood(&self) -> Mood {
        self.state.mood
    }

    /// Books one finished action. Anything other than a removal breaks the
    /// deletion streak.
    pub fn record_action(&mut self, removed: bool) {
        self.state.actions_since_break = self.state.actions_since_break.saturating_add(1);
        if removed {
            self.state.deletion_streak = self.state.deletion_streak.saturating_add(1);
        } else {
            self.state.deletion_streak = 0;
        }
        self.actions_until_reroll = self.actions_until_reroll.saturating_sub(1);
        if self.actions_until_reroll == 0 {
            self.reroll_mood();
        }
    }

    pub fn delay_for_next_action(&mut self) -> Duration {
        let multiplier = self.state.mood.delay_multiplier();
        if self.state.deletion_streak >= self.streak_limit {
            self.state.deletion_streak = 0;
            self.streak_limit = self.draw_u32(self.config.streak_limit).max(1);
            let pause = self.draw_ms(self.config.streak_pause_ms);
            trace!(pause_ms = pause.as_millis() as u64, "streak pause");
            return pause.mul_f64(multiplier);
        }
        let band = weighted_choice(DELAY_BANDS, &mut self.rng).unwrap_or(DelayBand::Normal);
        let (low, high) = band.factor_range();
        let factor = self.rng.gen_range(low..high);
        self.draw_ms(self.delay_range_ms)
            .mul_f64(factor * multiplier)
    }

    pub fn choose_scroll_profile(&mut self) -> ScrollProfile {
        let size = weighted_choice(SCROLL_SIZES, &mut self.rng).unwrap_or(ScrollSize::Medium);
        let method =
            weighted_choice(SCROLL_METHODS, &mut self.rng).unwrap_or(ScrollMethod::Programmatic);
        let (low, high) = size.distance_px();
        ScrollProfile {
            size,
            method,
            distance: self.rng.gen_range(low..high),
        }
    }

    pub fn scroll_settle(&mut self, profile: &ScrollProfile) -> Duration {
        self.draw_ms(self.config.scroll_settle_ms)
            .mul_f64(profile.size.settle_factor() * self.state.mood.delay_multiplier())
    }

    /// Gap between wheel notches within one scroll gesture.
    pub fn wheel_gap(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(25..=90))
    }

    pub async fn maybe_interject(
        &mut self,
        driver: &mut dyn PageDriver,
        item: &ContentItem,
    ) -> Option<Interjection> {
        if !self.rng.gen_bool(self.config.interject_probability.clamp(0.0, 1.0)) {
            return None;
        }
        let interjection = weighted_choice(INTERJECTIONS, &mut self.rng)?;
        debug!(item = %item.identity_key, ?interjection, "interjecting");
        match interjection {
            Interjection::Hesitate => {
                let pause = self.draw_ms(self.config.hesitation_ms);
                sleep(pause).await;
            }
            Interjection::Jiggle => {
                let delta = self.rng.gen_range(60.0..220.0);
                if bounded_ok(self.call_bound, "jiggle", driver.scroll_by(-delta)).await {
                    sleep(self.wheel_gap() * 4).await;
                    bounded_ok(self.call_bound, "jiggle", driver.scroll_by(delta)).await;
                }
            }
            Interjection::Reread => {
                let per_char = Duration::from_millis(self.rng.gen_range(25..=60));
                let chars = item.text_preview.chars().count().max(10) as u32;
                sleep(per_char * chars).await;
            }
        }
        Some(interjection)
    }

    /// Takes a break once the action budget is spent. Returns the pause taken.
    pub async fn maybe_take_break(&mut self, driver: &mut dyn PageDriver) -> Option<Duration> {
        if self.state.actions_since_break < self.break_budget {
            return None;
        }
        let pause = self.draw_ms(self.config.break_duration_ms);
        let idle_scrolls = if self
            .rng
            .gen_bool(self.config.idle_scroll_probability.clamp(0.0, 1.0))
        {
            self.rng.gen_range(1..=3)
        } else {
            0
        };
        debug!(
            pause_ms = pause.as_millis() as u64,
            idle_scrolls,
            actions = self.state.actions_since_break,
            "taking a break"
        );
        for _ in 0..idle_scrolls {
            let delta = self.rng.gen_range(-400.0..400.0);
            if !bounded_ok(self.call_bound, "idle scroll", driver.scroll_by(delta)).await {
                break;
            }
            sleep(self.wheel_gap() * 6).await;
        }
        sleep(pause).await;
        self.state.actions_since_break = 0;
        self.break_budget = self.draw_u32(self.config.break_every_actions).max(1);
        self.reroll_mood();
        Some(pause)
    }

    /// Uniform draw from an inclusive `[min, max]` range, in milliseconds.
    pub fn draw_ms(&mut self, bounds: [u64; 2]) -> Duration {
        let lower = bounds[0].min(bounds[1]);
        let upper = bounds[0].max(bounds[1]);
        Duration::from_millis(self.rng.gen_range(lower..=upper))
    }

    fn draw_u32(&mut self, bounds: [u32; 2]) -> u32 {
        let lower = bounds[0].min(bounds[1]);
        let upper = bounds[0].max(bounds[1]);
        self.rng.gen_range(lower..=upper)
    }

    fn reroll_mood(&mut self) {
        let mood = weighted_choice(MOODS, &mut self.rng).unwrap_or(Mood::Normal);
        if mood != self.state.mood {
            trace!(from = ?self.state.mood, to = ?mood, "mood changed");
        }
        self.state.mood = mood;
        self.actions_until_reroll = self.draw_u32(self.config.mood_reroll_actions).max(1);
    }
}
