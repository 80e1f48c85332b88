//! The `PipelineEvent` stream (C8) and its ordering/throttling contract.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Plan {
        folder: String,
        incremental: bool,
        limit: Option<u64>,
        tasks: Vec<String>,
        total_estimated_rows: u64,
    },
    TaskPlanned {
        task_label: String,
        estimated_total: Option<u64>,
    },
    Progress {
        task_label: String,
        processed: u64,
        estimated_total: Option<u64>,
        elapsed: Duration,
    },
    TaskCompleted {
        task_label: String,
        imported: u64,
        deleted: u64,
        errors: u64,
        duration: Duration,
        cancelled: bool,
    },
    Completed {
        total_imported: u64,
        total_deleted: u64,
        total_errors: u64,
        duration: Duration,
        cancelled: bool,
    },
}

/// A single-threaded consumer of the event stream. The engine is the sole
/// producer; ordering is `Plan < TaskPlanned(i) < Progress(i)* <
/// TaskCompleted(i) < ... < Completed`.
pub trait EventSink {
    fn handle(&mut self, event: PipelineEvent);
}

/// Drops every event; used by `rebuild_cache` dry runs and tests that don't
/// care about progress reporting.
pub struct NullSink;

impl EventSink for NullSink {
    fn handle(&mut self, _event: PipelineEvent) {}
}

/// Collects every event in order; used by tests asserting on the ordering
/// guarantee.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<PipelineEvent>,
}

impl EventSink for RecordingSink {
    fn handle(&mut self, event: PipelineEvent) {
        self.events.push(event);
    }
}

/// Coalesces `Progress` events for a given task to at most one per 250ms;
/// every other event passes through untouched. Wraps an inner sink the way
/// the teacher's renderer wraps its event source.
pub struct ThrottlingSink<S: EventSink> {
    inner: S,
    last_progress: Option<Instant>,
    interval: Duration,
}

impl<S: EventSink> ThrottlingSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last_progress: None,
            interval: Duration::from_millis(250),
        }
    }
}

impl<S: EventSink> EventSink for ThrottlingSink<S> {
    fn handle(&mut self, event: PipelineEvent) {
        if let PipelineEvent::Progress { .. } = &event {
            let now = Instant::now();
            if let Some(last) = self.last_progress {
                if now.duration_since(last) < self.interval {
                    return;
                }
            }
            self.last_progress = Some(now);
        } else if matches!(event, PipelineEvent::TaskCompleted { .. }) {
            self.last_progress = None;
        }
        self.inner.handle(event);
    }
}
