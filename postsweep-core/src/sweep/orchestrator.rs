use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::browser::{bounded, BrowserError, HumanBehaviorSimulator, PageDriver};
use crate::config::{BatchSection, ContentKind, ScrollSection, SweepConfig};
use crate::error::ConfigError;

use super::actions::{ActionExecutor, ActionOutcome};
use super::cancel::CancellationSignal;
use super::classifier::{classify, Classification, PolicyWindow};
use super::error::{SweepError, SweepResult};
use super::events::{EventKind, Progress, ProgressSink, SweepEvent};
use super::item::{normalize_handle, ContentItem, SeenSet};
use super::ownership::OwnershipResolver;
use super::report::{RunOutcome, RunReport, TabExit, TabReport};
use super::scroll::{ScrollEngine, SweepDecision};
use super::stats::RunStats;
use super::tab::Tab;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub handle: String,
    pub base_url: String,
    pub window: PolicyWindow,
    pub content: Vec<ContentKind>,
    pub tabs: Vec<Tab>,
    pub target: Option<u64>,
    pub dry_run: bool,
    pub batch: BatchSection,
    pub scroll: ScrollSection,
    pub probe: Duration,
    pub navigation: Duration,
}

impl OrchestratorConfig {
    pub fn from_config(config: &SweepConfig) -> Result<Self, ConfigError> {
        let handle = config
            .run
            .handle
            .as_deref()
            .map(normalize_handle)
            .filter(|handle| !handle.is_empty())
            .ok_or_else(|| ConfigError::Invalid("run.handle is required".into()))?;
        Ok(Self {
            handle,
            base_url: config.site.base_url.clone(),
            window: config.policy.window(),
            content: config.run.content.clone(),
            tabs: Tab::for_content(&config.run.content),
            target: config.run.target.filter(|target| *target > 0),
            dry_run: config.run.dry_run,
            batch: config.batch.clone(),
            scroll: config.scroll.clone(),
            probe: Duration::from_millis(config.timeouts.probe_ms),
            navigation: Duration::from_millis(config.timeouts.navigation_ms),
        })
    }

    pub fn handles_reposts(&self) -> bool {
        self.content.contains(&ContentKind::Reposts)
    }
}

/// Per-tab control flow, for trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TabPhase {
    Idle,
    Sweeping,
    BatchCollect,
    BatchAct,
    Draining,
    Done,
}

/// Extended pause every so many removals, independent of breaks.
#[derive(Debug, Clone)]
struct CooldownGate {
    every: [u64; 2],
    pause_ms: [u64; 2],
    next_at: u64,
}

impl CooldownGate {
    fn new(batch: &BatchSection) -> Self {
        Self {
            every: batch.cooldown_every,
            pause_ms: batch.cooldown_ms,
            next_at: 0,
        }
    }

    fn arm(&mut self, rng: &mut dyn RngCore, removed: u64) {
        self.next_at = removed.saturating_add(draw(rng, self.every).max(1));
    }

    fn due(&mut self, rng: &mut dyn RngCore, removed: u64) -> Option<Duration> {
        if removed < self.next_at {
            return None;
        }
        self.arm(rng, removed);
        Some(Duration::from_millis(draw(rng, self.pause_ms)))
    }
}

fn draw(rng: &mut dyn RngCore, bounds: [u64; 2]) -> u64 {
    rng.gen_range(bounds[0].min(bounds[1])..=bounds[0].max(bounds[1]))
}

/// Drives one run across the selected tabs on a single page. Owns the run
/// counters; the simulator owns the pacing state.
pub struct Orchestrator {
    config: OrchestratorConfig,
    executor: ActionExecutor,
    ownership: OwnershipResolver,
    human: HumanBehaviorSimulator,
    scroll: ScrollEngine,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationSignal,
    rng: Box<dyn RngCore + Send>,
    run_id: Uuid,
    stats: RunStats,
    seen: SeenSet,
    tallied: HashSet<String>,
    /// Keys that already produced an outcome this run; never acted on twice.
    acted: HashSet<String>,
    cooldown: CooldownGate,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        executor: ActionExecutor,
        human: HumanBehaviorSimulator,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationSignal,
    ) -> Self {
        let human = human.with_call_bound(config.probe);
        let ownership = OwnershipResolver::new(&config.handle, executor.handles_reposts());
        let scroll = ScrollEngine::new(config.scroll.clone(), config.probe);
        let cooldown = CooldownGate::new(&config.batch);
        Self {
            config,
            executor,
            ownership,
            human,
            scroll,
            sink,
            cancel,
            rng: Box::new(StdRng::from_entropy()),
            run_id: Uuid::new_v4(),
            stats: RunStats::default(),
            seen: SeenSet::new(),
            tallied: HashSet::new(),
            acted: HashSet::new(),
            cooldown,
        }
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs every selected tab to a terminal state. Never fails: navigation
    /// errors end the run with a `Failed` report carrying the error.
    pub async fn run(&mut self, driver: &mut dyn PageDriver) -> RunReport {
        let started_at = Utc::now();
        let started = Instant::now();
        self.stats = RunStats::default();
        self.tallied.clear();
        self.acted.clear();
        self.human.reset();
        self.cooldown.arm(self.rng.as_mut(), 0);

        info!(
            run_id = %self.run_id,
            handle = %self.config.handle,
            tabs = ?self.config.tabs,
            target = ?self.config.target,
            dry_run = self.config.dry_run,
            "sweep run started"
        );
        self.emit(SweepEvent::new(
            EventKind::RunStarted,
            format!("run {} started for @{}", self.run_id, self.config.handle),
        ));

        let mut tabs = Vec::new();
        let (outcome, error) = match self.run_tabs(driver, &mut tabs).await {
            Ok(outcome) => (outcome, None),
            Err(err) => {
                warn!(run_id = %self.run_id, error = %err, "sweep run failed");
                (RunOutcome::Failed, Some(err.to_string()))
            }
        };

        let elapsed = started.elapsed();
        info!(
            run_id = %self.run_id,
            outcome = outcome.as_str(),
            deleted = self.stats.deleted,
            protected = self.stats.protected,
            skipped = self.stats.skipped,
            scanned = self.stats.scanned,
            elapsed_ms = elapsed.as_millis() as u64,
            "sweep run finished"
        );
        self.emit(SweepEvent::new(
            EventKind::RunFinished,
            format!("run {} {}", self.run_id, outcome.as_str()),
        ));

        RunReport {
            run_id: self.run_id,
            handle: self.config.handle.clone(),
            outcome,
            dry_run: self.config.dry_run,
            stats: self.stats,
            started_at,
            elapsed,
            tabs,
            error,
        }
    }

    async fn run_tabs(
        &mut self,
        driver: &mut dyn PageDriver,
        reports: &mut Vec<TabReport>,
    ) -> SweepResult<RunOutcome> {
        let tabs = self.config.tabs.clone();
        for tab in tabs {
            if let Some(outcome) = self.terminal() {
                return Ok(outcome);
            }
            let mut report = TabReport {
                tab,
                sweeps: 0,
                removals: 0,
                exit: TabExit::Exhausted,
            };
            let result = self.run_tab(driver, &mut report).await;
            report.sweeps = self.scroll.sweeps();
            if result.is_err() {
                report.exit = TabExit::Failed;
            }
            reports.push(report);
            result?;
        }
        Ok(self.terminal().unwrap_or(RunOutcome::Completed))
    }

    async fn run_tab(
        &mut self,
        driver: &mut dyn PageDriver,
        report: &mut TabReport,
    ) -> SweepResult<()> {
        let tab = report.tab;
        let mut phase = TabPhase::Idle;
        trace!(%tab, ?phase, "tab phase");
        let url = tab.url(&self.config.base_url, &self.config.handle);
        self.emit(SweepEvent::new(EventKind::TabStarted, format!("sweeping {tab} at {url}")));
        self.navigate(driver, &url, false).await?;
        self.scroll.reset();

        loop {
            phase = TabPhase::Sweeping;
            trace!(%tab, ?phase, "tab phase");
            self.scroll.sweep_from_top(driver).await;
            self.seen.clear();
            self.emit(SweepEvent::new(
                EventKind::SweepStarted,
                format!("{tab} sweep {}", self.scroll.sweeps()),
            ));

            let removals = self.run_sweep(driver, tab).await;
            report.removals = report.removals.saturating_add(removals);

            phase = TabPhase::Draining;
            trace!(%tab, ?phase, removals, "tab phase");
            if let Some(outcome) = self.terminal() {
                report.exit = match outcome {
                    RunOutcome::TargetReached => TabExit::TargetReached,
                    _ => TabExit::Cancelled,
                };
                break;
            }
            match self.scroll.finish_sweep(removals) {
                SweepDecision::Restart => continue,
                SweepDecision::Reload => {
                    self.emit(SweepEvent::new(
                        EventKind::Reload,
                        format!("{tab}: reloading after empty sweeps"),
                    ));
                    self.navigate(driver, &url, true).await?;
                }
                SweepDecision::Done => {
                    report.exit = TabExit::Exhausted;
                    break;
                }
            }
        }

        phase = TabPhase::Done;
        trace!(%tab, ?phase, "tab phase");
        self.emit(SweepEvent::new(
            EventKind::TabFinished,
            format!(
                "{tab} finished after {} sweep(s), {} removed",
                self.scroll.sweeps(),
                report.removals
            ),
        ));
        Ok(())
    }

    /// One pass from the top. Returns the removals it produced.
    async fn run_sweep(&mut self, driver: &mut dyn PageDriver, tab: Tab) -> u64 {
        let mut removals = 0u64;
        let mut empty_batches = 0u32;
        loop {
            if self.terminal().is_some() {
                break;
            }
            let batch_size = self.batch_size();
            trace!(%tab, phase = ?TabPhase::BatchCollect, batch_size, "tab phase");
            let worklist = self.collect_batch(driver, tab, batch_size).await;

            if worklist.is_empty() {
                if self.scroll.is_exhausted() || self.cancel.is_cancelled() {
                    break;
                }
                let progress = self
                    .scroll
                    .load_more(driver, &mut self.human, batch_size)
                    .await;
                if progress.new_items == 0 {
                    empty_batches += 1;
                } else {
                    empty_batches = 0;
                }
                if empty_batches >= self.config.scroll.max_empty_batches.max(1) {
                    debug!(%tab, empty_batches, "no new items; ending sweep");
                    break;
                }
                continue;
            }

            empty_batches = 0;
            trace!(%tab, phase = ?TabPhase::BatchAct, items = worklist.len(), "tab phase");
            removals = removals.saturating_add(self.act_on_batch(driver, tab, worklist).await);
            self.report_progress(tab);
        }
        removals
    }

    /// Builds the next worklist from what is rendered. Every key is
    /// evaluated at most once per sweep.
    async fn collect_batch(
        &mut self,
        driver: &mut dyn PageDriver,
        tab: Tab,
        limit: usize,
    ) -> Vec<ContentItem> {
        let snapshot = bounded(self.config.probe, "snapshot", driver.snapshot_items(), Vec::new())
            .await;
        let mut worklist = Vec::new();
        for raw in &snapshot {
            if worklist.len() >= limit || self.cancel.is_cancelled() {
                break;
            }
            let Some(item) = ContentItem::from_raw(raw) else {
                continue;
            };
            if !self.seen.insert(&item.identity_key) {
                continue;
            }
            // Counters describe distinct items, not re-evaluations on later sweeps.
            let first_look = self.tallied.insert(item.identity_key.clone());
            if first_look {
                self.stats.record_scanned();
            }

            let classification = classify(item.timestamp, &self.config.window);
            if classification != Classification::Delete {
                if first_look {
                    self.stats.record_classification(classification);
                    if classification == Classification::Protect {
                        self.emit(SweepEvent::for_item(
                            EventKind::Protected,
                            &item.identity_key,
                            "inside protection window",
                        ));
                    }
                }
                continue;
            }
            if self.acted.contains(&item.identity_key) {
                continue;
            }
            if !tab.admits(&item, &self.config.content) {
                if first_look {
                    self.stats.record_skipped();
                }
                continue;
            }
            if !self
                .ownership
                .is_actionable(driver, &self.executor, &item)
                .await
            {
                if first_look {
                    self.stats.record_skipped();
                }
                continue;
            }
            worklist.push(item);
        }
        worklist
    }

    async fn act_on_batch(
        &mut self,
        driver: &mut dyn PageDriver,
        tab: Tab,
        worklist: Vec<ContentItem>,
    ) -> u64 {
        let mut removals = 0u64;
        for item in worklist {
            if self.terminal().is_some() {
                break;
            }
            self.human.maybe_interject(driver, &item).await;

            let removed = if self.config.dry_run {
                self.preview(&item)
            } else {
                self.act(driver, &item).await
            };
            if removed {
                removals += 1;
            }
            self.report_progress(tab);
            if self.terminal().is_some() {
                break;
            }

            let total = self.stats.removals(self.config.dry_run);
            if removed {
                if let Some(pause) = self.cooldown.due(self.rng.as_mut(), total) {
                    info!(pause_ms = pause.as_millis() as u64, removed = total, "rate-limit cooldown");
                    self.emit(SweepEvent::new(
                        EventKind::Cooldown,
                        format!("cooling down for {}s", pause.as_secs()),
                    ));
                    sleep(pause).await;
                }
            }
            sleep(self.human.delay_for_next_action()).await;
            if let Some(pause) = self.human.maybe_take_break(driver).await {
                self.emit(SweepEvent::new(
                    EventKind::Break,
                    format!("took a {}s break", pause.as_secs()),
                ));
            }
        }
        removals
    }

    async fn act(&mut self, driver: &mut dyn PageDriver, item: &ContentItem) -> bool {
        if !self.acted.insert(item.identity_key.clone()) {
            return false;
        }
        let report = self.executor.act(driver, item).await;
        self.stats.record_outcome(report.outcome);
        self.human.record_action(report.outcome.is_removal());
        let event = match report.outcome {
            ActionOutcome::Deleted => {
                SweepEvent::for_item(EventKind::Deleted, &item.identity_key, "deleted")
            }
            ActionOutcome::Unreposted => {
                let event =
                    SweepEvent::for_item(EventKind::Unreposted, &item.identity_key, "repost undone");
                match report.delete_failure {
                    Some(reason) => event.with_reason(reason),
                    None => event,
                }
            }
            ActionOutcome::Failed(reason) => SweepEvent::for_item(
                EventKind::Failed,
                &item.identity_key,
                format!("could not remove: {reason}"),
            )
            .with_reason(reason),
        };
        self.emit(event);
        report.outcome.is_removal()
    }

    /// Dry-run stand-in for `act`: counts each actionable key once per run.
    fn preview(&mut self, item: &ContentItem) -> bool {
        if !self.acted.insert(item.identity_key.clone()) {
            return false;
        }
        self.stats.record_would_delete();
        self.human.record_action(true);
        self.emit(SweepEvent::for_item(
            EventKind::WouldDelete,
            &item.identity_key,
            format!("would delete: {}", item.text_preview),
        ));
        true
    }

    /// Navigation with a single immediate re-attempt.
    async fn navigate(
        &mut self,
        driver: &mut dyn PageDriver,
        url: &str,
        reload: bool,
    ) -> SweepResult<()> {
        let mut last = None;
        for attempt in 1..=2 {
            let step = async {
                if reload {
                    driver.reload().await
                } else {
                    driver.goto(url).await
                }
            };
            let result = match timeout(self.config.navigation, step).await {
                Ok(result) => result,
                Err(_) => Err(BrowserError::Timeout(format!("navigation to {url}"))),
            };
            match result {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(url, attempt, error = %err, "navigation failed");
                    last = Some(err);
                }
            }
        }
        Err(SweepError::Navigation {
            url: url.to_string(),
            source: last.unwrap_or_else(|| BrowserError::Unexpected("navigation failed".into())),
        })
    }

    fn batch_size(&mut self) -> usize {
        let [low, high] = self.config.batch.size;
        self.rng.gen_range(low.min(high)..=low.max(high)).max(1)
    }

    fn terminal(&self) -> Option<RunOutcome> {
        if let Some(target) = self.config.target {
            if self.stats.removals(self.config.dry_run) >= target {
                return Some(RunOutcome::TargetReached);
            }
        }
        if self.cancel.is_cancelled() {
            return Some(RunOutcome::StoppedByUser);
        }
        None
    }

    fn report_progress(&self, tab: Tab) {
        self.sink.progress(Progress {
            current: self.stats.removals(self.config.dry_run),
            total: self.config.target.unwrap_or(0),
            tab,
        });
    }

    fn emit(&self, event: SweepEvent) {
        self.sink.event(&event);
    }
}
