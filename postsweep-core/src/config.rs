use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::sweep::{DeletionRange, PolicyWindow};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SweepConfig {
    pub chromium: ChromiumSection,
    pub flags: FlagsSection,
    pub site: SiteSection,
    pub policy: PolicySection,
    pub run: RunSection,
    pub speed: SpeedSection,
    pub human_simulation: HumanSimulationSection,
    pub scroll: ScrollSection,
    pub batch: BatchSection,
    pub timeouts: TimeoutSection,
    pub selectors: SelectorSection,
    #[serde(default)]
    pub keywords: KeywordSection,
    pub journal: JournalSection,
}

impl SweepConfig {
    /// Rejects ranges that would make the random draws panic and bounds that
    /// would let a tab loop forever.
    pub fn validate(&self) -> Result<()> {
        check_range("speed.fast", self.speed.fast)?;
        check_range("speed.normal", self.speed.normal)?;
        check_range("speed.slow", self.speed.slow)?;
        let human = &self.human_simulation;
        check_range("human_simulation.mood_reroll_actions", human.mood_reroll_actions)?;
        check_range("human_simulation.streak_limit", human.streak_limit)?;
        check_range("human_simulation.streak_pause_ms", human.streak_pause_ms)?;
        check_range("human_simulation.break_every_actions", human.break_every_actions)?;
        check_range("human_simulation.break_duration_ms", human.break_duration_ms)?;
        check_range("human_simulation.scroll_settle_ms", human.scroll_settle_ms)?;
        check_range("human_simulation.hesitation_ms", human.hesitation_ms)?;
        check_probability("human_simulation.idle_scroll_probability", human.idle_scroll_probability)?;
        check_probability("human_simulation.interject_probability", human.interject_probability)?;
        check_range("batch.size", self.batch.size)?;
        check_range("batch.cooldown_every", self.batch.cooldown_every)?;
        check_range("batch.cooldown_ms", self.batch.cooldown_ms)?;
        if self.batch.size[0] == 0 {
            return Err(ConfigError::Invalid("batch.size must be at least 1".into()));
        }
        if self.scroll.no_growth_threshold == 0 {
            return Err(ConfigError::Invalid(
                "scroll.no_growth_threshold must be at least 1".into(),
            ));
        }
        if self.scroll.max_sweeps == 0 {
            return Err(ConfigError::Invalid("scroll.max_sweeps must be at least 1".into()));
        }
        if self.timeouts.probe_ms == 0 || self.timeouts.navigation_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.probe_ms and timeouts.navigation_ms must be positive".into(),
            ));
        }
        if self.run.content.is_empty() {
            return Err(ConfigError::Invalid("run.content must name at least one kind".into()));
        }
        self.policy
            .window()
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn delay_range_ms(&self) -> [u64; 2] {
        self.speed.range_for(self.run.speed)
    }
}

fn check_range<T: PartialOrd + fmt::Debug>(name: &str, range: [T; 2]) -> Result<()> {
    if range[0] > range[1] {
        return Err(ConfigError::Invalid(format!(
            "{name}: lower bound {:?} exceeds upper bound {:?}",
            range[0], range[1]
        )));
    }
    Ok(())
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChromiumSection {
    pub executable_path: String,
    pub user_data_dir: String,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub window_size: [u32; 2],
    pub tab_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlagsSection {
    pub no_first_run: bool,
    pub disable_automation_controlled: bool,
    pub disable_blink_features: Vec<String>,
    pub mute_audio: bool,
    pub autoplay_policy: String,
    pub lang: Option<String>,
    pub accept_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteSection {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicySection {
    pub protect_after: NaiveDate,
    pub range: RangeSection,
}

impl PolicySection {
    pub fn window(&self) -> PolicyWindow {
        let range = match self.range {
            RangeSection::Before { cutoff } => DeletionRange::Before {
                cutoff: start_of_day(cutoff),
            },
            RangeSection::Between { from, to } => DeletionRange::Between {
                from: start_of_day(from),
                to: start_of_day(to),
            },
        };
        PolicyWindow::new(range, start_of_day(self.protect_after))
    }
}

/// Deletion range mode. The mode is always spelled out in the config so the
/// two interpretations never get mixed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RangeSection {
    Before { cutoff: NaiveDate },
    Between { from: NaiveDate, to: NaiveDate },
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    pub handle: Option<String>,
    pub target: Option<u64>,
    pub content: Vec<ContentKind>,
    pub speed: SpeedPreset,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Posts,
    Replies,
    Reposts,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContentKind::Posts => "posts",
            ContentKind::Replies => "replies",
            ContentKind::Reposts => "reposts",
        };
        f.write_str(label)
    }
}

impl FromStr for ContentKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "posts" | "post" => Ok(ContentKind::Posts),
            "replies" | "reply" => Ok(ContentKind::Replies),
            "reposts" | "repost" | "retweets" => Ok(ContentKind::Reposts),
            other => Err(ConfigError::Invalid(format!("invalid content kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedPreset {
    Fast,
    Normal,
    Slow,
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SpeedPreset::Fast => "fast",
            SpeedPreset::Normal => "normal",
            SpeedPreset::Slow => "slow",
        };
        f.write_str(label)
    }
}

impl FromStr for SpeedPreset {
    type Err = ConfigError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "fast" => Ok(SpeedPreset::Fast),
            "normal" => Ok(SpeedPreset::Normal),
            "slow" => Ok(SpeedPreset::Slow),
            other => Err(ConfigError::Invalid(format!("invalid speed preset: {other}"))),
        }
    }
}

/// Base inter-action delay per preset, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeedSection {
    pub fast: [u64; 2],
    pub normal: [u64; 2],
    pub slow: [u64; 2],
}

impl SpeedSection {
    pub fn range_for(&self, preset: SpeedPreset) -> [u64; 2] {
        match preset {
            SpeedPreset::Fast => self.fast,
            SpeedPreset::Normal => self.normal,
            SpeedPreset::Slow => self.slow,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HumanSimulationSection {
    pub mood_reroll_actions: [u32; 2],
    pub streak_limit: [u32; 2],
    pub streak_pause_ms: [u64; 2],
    pub break_every_actions: [u32; 2],
    pub break_duration_ms: [u64; 2],
    pub idle_scroll_probability: f64,
    pub interject_probability: f64,
    pub hesitation_ms: [u64; 2],
    pub scroll_settle_ms: [u64; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrollSection {
    pub no_growth_threshold: u32,
    pub max_steps_per_load: u32,
    pub max_sweeps: u32,
    pub empty_sweeps_before_reload: u32,
    pub max_empty_batches: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchSection {
    pub size: [usize; 2],
    pub cooldown_every: [u64; 2],
    pub cooldown_ms: [u64; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutSection {
    pub probe_ms: u64,
    pub menu_settle_ms: u64,
    pub navigation_settle_ms: u64,
    pub navigation_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSection {
    pub item: String,
    pub permalink: String,
    pub timestamp: String,
    pub text: String,
    pub author_link: String,
    pub social_context: String,
    pub reply_context: String,
    pub menu_trigger: String,
    pub menu_item: String,
    pub confirm_button: String,
    pub unrepost_button: String,
}

/// Extra menu keywords per language tag, merged over the built-in tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordSection {
    #[serde(default)]
    pub delete: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub undo_repost: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalSection {
    pub enabled: bool,
    pub path: String,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SweepConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
