pub mod actions;
pub mod cancel;
pub mod classifier;
pub mod error;
pub mod events;
pub mod item;
pub mod journal;
pub mod keywords;
pub mod orchestrator;
pub mod ownership;
pub mod report;
pub mod scroll;
pub mod stats;
pub mod tab;

pub use actions::{ActionExecutor, ActionOutcome, ActionReport, ActionTimings, FailureReason};
pub use cancel::CancellationSignal;
pub use classifier::{classify, Classification, DeletionRange, PolicyError, PolicyWindow};
pub use error::{JournalError, JournalResult, SweepError, SweepResult};
pub use events::{EventKind, FanoutSink, Progress, ProgressSink, SweepEvent, TracingSink};
pub use item::{ContentItem, RawItem, SeenSet};
pub use journal::{ActionRecord, JournalSink, RunJournal, RunJournalBuilder, RunRecord};
pub use keywords::{KeywordMatcher, LocaleKeywords, MenuAction, Placement};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use ownership::{Evidence, OwnershipResolver};
pub use report::{RunOutcome, RunReport, TabExit, TabReport};
pub use scroll::{LoadProgress, ScrollEngine, SweepDecision, SweepPhase};
pub use stats::RunStats;
pub use tab::Tab;
