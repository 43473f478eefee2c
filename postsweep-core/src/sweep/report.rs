use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::stats::RunStats;
use super::tab::Tab;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    TargetReached,
    StoppedByUser,
    Failed,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::TargetReached => "target_reached",
            RunOutcome::StoppedByUser => "stopped_by_user",
            RunOutcome::Failed => "failed",
        }
    }
}

/// Why a tab stopped being swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TabExit {
    Exhausted,
    TargetReached,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabReport {
    pub tab: Tab,
    pub sweeps: u32,
    pub removals: u64,
    pub exit: TabExit,
}

/// Final account of a run. Always produced, whatever the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub handle: String,
    pub outcome: RunOutcome,
    pub dry_run: bool,
    pub stats: RunStats,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub tabs: Vec<TabReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "run {} for @{}: {}", self.run_id, self.handle, self.outcome.as_str());
        if self.dry_run {
            let _ = writeln!(out, "  dry run: {} would be deleted", self.stats.would_delete);
        }
        let _ = writeln!(
            out,
            "  deleted {} (unreposted {}), failed {}",
            self.stats.deleted, self.stats.unreposted, self.stats.failed
        );
        let _ = writeln!(
            out,
            "  scanned {}, protected {}, skipped {}",
            self.stats.scanned, self.stats.protected, self.stats.skipped
        );
        for tab in &self.tabs {
            let _ = writeln!(
                out,
                "  tab {}: {} removed over {} sweep(s), {:?}",
                tab.tab, tab.removals, tab.sweeps, tab.exit
            );
        }
        let _ = writeln!(out, "  elapsed {:.1}s", self.elapsed.as_secs_f64());
        if let Some(error) = &self.error {
            let _ = writeln!(out, "  error: {error}");
        }
        out
    }
}

fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}
