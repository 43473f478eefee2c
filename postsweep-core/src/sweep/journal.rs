use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::sqlite::configure_connection;

use super::error::{JournalError, JournalResult};
use super::events::{EventKind, Progress, ProgressSink, SweepEvent};
use super::report::RunReport;
use super::stats::RunStats;

const JOURNAL_SCHEMA: &str = include_str!("../../../sql/journal.sql");

#[derive(Debug, Clone)]
pub struct RunJournalBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for RunJournalBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl RunJournalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> JournalResult<RunJournal> {
        let path = self.path.ok_or(JournalError::MissingPath)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Ok(RunJournal { path, flags })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub handle: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
    pub stats: RunStats,
    pub elapsed_ms: Option<u64>,
    pub error: Option<String>,
}

impl RunRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get("run_id")?,
            handle: row.get("handle")?,
            dry_run: row.get::<_, i64>("dry_run")? != 0,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
            outcome: row.get("outcome")?,
            stats: RunStats {
                deleted: row.get::<_, i64>("deleted")?.max(0) as u64,
                unreposted: row.get::<_, i64>("unreposted")?.max(0) as u64,
                protected: row.get::<_, i64>("protected")?.max(0) as u64,
                skipped: row.get::<_, i64>("skipped")?.max(0) as u64,
                scanned: row.get::<_, i64>("scanned")?.max(0) as u64,
                failed: row.get::<_, i64>("failed")?.max(0) as u64,
                would_delete: row.get::<_, i64>("would_delete")?.max(0) as u64,
            },
            elapsed_ms: row
                .get::<_, Option<i64>>("elapsed_ms")?
                .map(|value| value.max(0) as u64),
            error: row.get("error")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub identity_key: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Sqlite record of past runs and every action they took.
#[derive(Debug, Clone)]
pub struct RunJournal {
    path: PathBuf,
    flags: OpenFlags,
}

impl RunJournal {
    pub fn builder() -> RunJournalBuilder {
        RunJournalBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> JournalResult<Self> {
        RunJournalBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> JournalResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            JournalError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        let read_only = self.flags.contains(OpenFlags::SQLITE_OPEN_READ_ONLY);
        configure_connection(&conn, read_only).map_err(|source| JournalError::OpenDatabase {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> JournalResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = self.open()?;
        conn.execute_batch(JOURNAL_SCHEMA)?;
        Ok(())
    }

    pub fn begin_run(
        &self,
        run_id: Uuid,
        handle: &str,
        dry_run: bool,
        started_at: DateTime<Utc>,
    ) -> JournalResult<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO runs (run_id, handle, dry_run, started_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(run_id) DO NOTHING",
            params![run_id.to_string(), handle, dry_run as i64, started_at],
        )?;
        Ok(())
    }

    pub fn record_action(
        &self,
        run_id: Uuid,
        identity_key: &str,
        outcome: &str,
        reason: Option<&str>,
    ) -> JournalResult<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO actions (run_id, identity_key, outcome, reason, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id.to_string(), identity_key, outcome, reason, Utc::now()],
        )?;
        Ok(())
    }

    /// Writes the final counters. Creates the run row when `begin_run` was
    /// never called.
    pub fn finish_run(&self, report: &RunReport) -> JournalResult<()> {
        let conn = self.open()?;
        let stats = &report.stats;
        conn.execute(
            "INSERT INTO runs (
                run_id, handle, dry_run, started_at, finished_at, outcome,
                deleted, unreposted, protected, skipped, scanned, failed, would_delete,
                elapsed_ms, error
            ) VALUES (
                :run_id, :handle, :dry_run, :started_at, :finished_at, :outcome,
                :deleted, :unreposted, :protected, :skipped, :scanned, :failed, :would_delete,
                :elapsed_ms, :error
            )
            ON CONFLICT(run_id) DO UPDATE SET
                finished_at = excluded.finished_at,
                outcome = excluded.outcome,
                deleted = excluded.deleted,
                unreposted = excluded.unreposted,
                protected = excluded.protected,
                skipped = excluded.skipped,
                scanned = excluded.scanned,
                failed = excluded.failed,
                would_delete = excluded.would_delete,
                elapsed_ms = excluded.elapsed_ms,
                error = excluded.error",
            rusqlite::named_params! {
                ":run_id": report.run_id.to_string(),
                ":handle": &report.handle,
                ":dry_run": report.dry_run as i64,
                ":started_at": report.started_at,
                ":finished_at": Utc::now(),
                ":outcome": report.outcome.as_str(),
                ":deleted": stats.deleted as i64,
                ":unreposted": stats.unreposted as i64,
                ":protected": stats.protected as i64,
                ":skipped": stats.skipped as i64,
                ":scanned": stats.scanned as i64,
                ":failed": stats.failed as i64,
                ":would_delete": stats.would_delete as i64,
                ":elapsed_ms": report.elapsed.as_millis() as i64,
                ":error": &report.error,
            },
        )?;
        Ok(())
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> JournalResult<Vec<RunRecord>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], RunRecord::from_row)?;
        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?);
        }
        Ok(runs)
    }

    pub fn fetch_run(&self, run_id: &str) -> JournalResult<RunRecord> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT * FROM runs WHERE run_id = ?1",
            [run_id],
            RunRecord::from_row,
        )
        .optional()?
        .ok_or_else(|| JournalError::NotFound {
            run_id: run_id.to_string(),
        })
    }

    pub fn actions_for(&self, run_id: &str) -> JournalResult<Vec<ActionRecord>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT identity_key, outcome, reason, recorded_at
             FROM actions WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([run_id], |row| {
            Ok(ActionRecord {
                identity_key: row.get(0)?,
                outcome: row.get(1)?,
                reason: row.get(2)?,
                recorded_at: row.get(3)?,
            })
        })?;
        let mut actions = Vec::new();
        for row in rows {
            actions.push(row?);
        }
        Ok(actions)
    }
}

/// Records per-item outcomes as they happen. Journal failures are logged
/// and never interrupt the run.
#[derive(Debug, Clone)]
pub struct JournalSink {
    journal: RunJournal,
    run_id: Uuid,
}

impl JournalSink {
    pub fn new(journal: RunJournal, run_id: Uuid) -> Self {
        Self { journal, run_id }
    }
}

impl ProgressSink for JournalSink {
    fn event(&self, event: &SweepEvent) {
        let outcome = match event.kind {
            EventKind::Deleted => "deleted",
            EventKind::Unreposted => "unreposted",
            EventKind::WouldDelete => "would_delete",
            EventKind::Failed => "failed",
            _ => return,
        };
        let Some(key) = event.identity_key.as_deref() else {
            return;
        };
        let reason = event.reason.map(|reason| reason.as_str());
        if let Err(err) = self.journal.record_action(self.run_id, key, outcome, reason) {
            warn!(error = %err, item = key, "failed to journal action");
        }
    }

    fn progress(&self, _progress: Progress) {}
}
