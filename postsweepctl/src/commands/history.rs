use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use postsweep_core::sweep::{ActionRecord, RunRecord};
use postsweep_core::{RunJournal, SweepConfig};

use crate::{AppError, DisplayFallback, Result};

#[derive(Debug, Serialize)]
pub struct HistoryList {
    pub runs: Vec<RunRecord>,
}

#[derive(Debug, Serialize)]
pub struct RunDetail {
    pub run: RunRecord,
    pub actions: Vec<ActionRecord>,
}

pub fn open_journal(config: &SweepConfig) -> Result<RunJournal> {
    let path = Path::new(&config.journal.path);
    if !path.exists() {
        return Err(AppError::MissingResource(format!(
            "journal {} not found; no runs recorded yet",
            path.display()
        )));
    }
    Ok(RunJournal::builder().path(path).read_only(true).build()?)
}

pub fn recent(journal: &RunJournal, limit: usize) -> Result<HistoryList> {
    Ok(HistoryList {
        runs: journal.recent_runs(limit)?,
    })
}

pub fn run_detail(journal: &RunJournal, run_id: &str) -> Result<RunDetail> {
    Ok(RunDetail {
        run: journal.fetch_run(run_id)?,
        actions: journal.actions_for(run_id)?,
    })
}

fn summary_line(run: &RunRecord) -> String {
    let outcome = run.outcome.as_deref().unwrap_or("unfinished");
    let mode = if run.dry_run { " (dry run)" } else { "" };
    format!(
        "{id}  {started}  @{handle}  {outcome}{mode}  deleted={deleted} unreposted={unreposted} failed={failed} scanned={scanned}",
        id = run.run_id,
        started = run.started_at.format("%Y-%m-%d %H:%M:%S"),
        handle = run.handle,
        deleted = run.stats.deleted,
        unreposted = run.stats.unreposted,
        failed = run.stats.failed,
        scanned = run.stats.scanned,
    )
}

impl DisplayFallback for HistoryList {
    fn display(&self) -> String {
        if self.runs.is_empty() {
            return "no runs recorded".to_string();
        }
        self.runs
            .iter()
            .map(summary_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for RunDetail {
    fn display(&self) -> String {
        let mut out = summary_line(&self.run);
        if let Some(error) = &self.run.error {
            let _ = write!(out, "\n  error: {error}");
        }
        for action in &self.actions {
            let _ = write!(
                out,
                "\n  {at}  {outcome:<12} {key}",
                at = action.recorded_at.format("%H:%M:%S"),
                outcome = action.outcome,
                key = action.identity_key,
            );
            if let Some(reason) = &action.reason {
                let _ = write!(out, " ({reason})");
            }
        }
        out
    }
}
