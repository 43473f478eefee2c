pub mod browser;
pub mod config;
pub mod error;
pub mod sqlite;
pub mod sweep;

pub use browser::{
    BrowserAutomation, BrowserError, BrowserLauncher, BrowserResult, ChromiumPage,
    HumanBehaviorSimulator, LaunchOverrides, PageDriver,
};
pub use config::{load_config, ContentKind, SpeedPreset, SweepConfig};
pub use error::{ConfigError, Result};
pub use sweep::{
    classify, ActionExecutor, ActionOutcome, CancellationSignal, Classification, DeletionRange,
    FailureReason, JournalSink, Orchestrator, OrchestratorConfig, PolicyWindow, ProgressSink,
    RunJournal, RunOutcome, RunReport, RunStats, SweepError, TracingSink,
};
