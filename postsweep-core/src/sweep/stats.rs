use serde::{Deserialize, Serialize};

use super::actions::ActionOutcome;
use super::classifier::Classification;

/// Run counters. Only ever incremented; `unreposted` is a subset of
/// `deleted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub deleted: u64,
    pub unreposted: u64,
    pub protected: u64,
    pub skipped: u64,
    pub scanned: u64,
    pub failed: u64,
    pub would_delete: u64,
}

impl RunStats {
    pub fn record_scanned(&mut self) {
        self.scanned = self.scanned.saturating_add(1);
    }

    pub fn record_classification(&mut self, classification: Classification) {
        match classification {
            Classification::Delete => {}
            Classification::Protect => self.protected = self.protected.saturating_add(1),
            Classification::SkipOutOfRange | Classification::SkipUnknownDate => {
                self.record_skipped()
            }
        }
    }

    /// In range but filtered out by content selection or ownership.
    pub fn record_skipped(&mut self) {
        self.skipped = self.skipped.saturating_add(1);
    }

    pub fn record_outcome(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Deleted => self.deleted = self.deleted.saturating_add(1),
            ActionOutcome::Unreposted => {
                self.deleted = self.deleted.saturating_add(1);
                self.unreposted = self.unreposted.saturating_add(1);
            }
            ActionOutcome::Failed(_) => self.failed = self.failed.saturating_add(1),
        }
    }

    pub fn record_would_delete(&mut self) {
        self.would_delete = self.would_delete.saturating_add(1);
    }

    /// Items taken off the timeline, or that would have been in a dry run.
    pub fn removals(&self, dry_run: bool) -> u64 {
        if dry_run {
            self.would_delete
        } else {
            self.deleted
        }
    }

    pub fn success_rate(&self) -> f64 {
        let attempts = self.deleted.saturating_add(self.failed);
        if attempts == 0 {
            0.0
        } else {
            (self.deleted as f64 / attempts as f64) * 100.0
        }
    }
}
