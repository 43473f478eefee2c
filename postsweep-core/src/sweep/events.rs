use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::actions::FailureReason;
use super::tab::Tab;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    TabStarted,
    SweepStarted,
    Deleted,
    Unreposted,
    WouldDelete,
    Protected,
    Failed,
    Break,
    Cooldown,
    Reload,
    TabFinished,
    RunFinished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepEvent {
    pub kind: EventKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl SweepEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            identity_key: None,
            reason: None,
        }
    }

    pub fn for_item(kind: EventKind, identity_key: &str, message: impl Into<String>) -> Self {
        Self {
            identity_key: Some(identity_key.to_string()),
            ..Self::new(kind, message)
        }
    }

    pub fn with_reason(mut self, reason: FailureReason) -> Self {
        self.reason = Some(reason);
        self
    }
}

/// `total` is the removal target, or 0 when the run is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub tab: Tab,
}

/// Observer of a run. Called inline from the sweep loop, so implementations
/// must return quickly.
pub trait ProgressSink: Send + Sync {
    fn event(&self, event: &SweepEvent);
    fn progress(&self, progress: Progress);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: &SweepEvent) {
        let key = event.identity_key.as_deref().unwrap_or("-");
        match event.kind {
            EventKind::Failed => warn!(
                kind = ?event.kind,
                item = key,
                reason = event.reason.map(FailureReason::as_str).unwrap_or("-"),
                "{}",
                event.message
            ),
            EventKind::Deleted
            | EventKind::Unreposted
            | EventKind::WouldDelete
            | EventKind::Protected => debug!(kind = ?event.kind, item = key, "{}", event.message),
            _ => info!(kind = ?event.kind, "{}", event.message),
        }
    }

    fn progress(&self, progress: Progress) {
        debug!(
            current = progress.current,
            total = progress.total,
            tab = %progress.tab,
            "progress"
        );
    }
}

/// Forwards to several sinks in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ProgressSink for FanoutSink {
    fn event(&self, event: &SweepEvent) {
        for sink in &self.sinks {
            sink.event(event);
        }
    }

    fn progress(&self, progress: Progress) {
        for sink in &self.sinks {
            sink.progress(progress);
        }
    }
}
