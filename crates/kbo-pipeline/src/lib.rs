//! The pipeline engine (C7): an ordered, strictly sequential list of steps
//! with prepare/before/execute lifecycle, per-step stopwatch and row
//! counters, fail-fast propagation, and cooperative cancellation.

mod cancel;
mod events;

pub use cancel::CancellationToken;
pub use events::{EventSink, NullSink, PipelineEvent, RecordingSink, ThrottlingSink};

use kbo_store::Store;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Row counters for a completed step, however they were derived (store
/// change-hook or mapper tally).
#[derive(Debug, Default, Clone, Copy)]
pub struct StepCounters {
    pub imported: u64,
    pub deleted: u64,
    pub errors: u64,
}

/// One stage of the pipeline. Implementors hold whatever state they need
/// between `prepare` and `execute` (e.g. a resolved file path, or the
/// CSV-derived impacted-enterprise set).
pub trait Step {
    fn name(&self) -> &str;

    /// Computes an estimated row count for progress reporting; `None` when
    /// no reasonable estimate exists.
    fn prepare(&mut self, store: &Store, ct: &CancellationToken) -> anyhow::Result<Option<u64>>;

    fn before_execute(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs the step to completion inside its own transaction. Returning
    /// `Err` rolls the transaction back and stops the pipeline; the engine
    /// itself commits on success.
    fn execute(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        progress: &mut dyn FnMut(u64),
    ) -> anyhow::Result<StepCounters>;
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub total_imported: u64,
    pub total_deleted: u64,
    pub total_errors: u64,
    pub duration: Duration,
    pub cancelled: bool,
    pub step_states: Vec<(String, StepState)>,
}

pub struct Engine {
    steps: Vec<Box<dyn Step>>,
}

impl Engine {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    /// Runs every step in order against `store`, emitting `PipelineEvent`s
    /// to `sink`. Stops at the first failure or cancellation; already
    /// completed steps' work persists (each step commits its own
    /// transaction independently).
    pub fn run(
        &mut self,
        store: &mut Store,
        ct: &CancellationToken,
        sink: &mut dyn EventSink,
        folder: &str,
        incremental: bool,
        limit: Option<u64>,
    ) -> anyhow::Result<RunSummary> {
        let run_start = Instant::now();
        let names: Vec<String> = self.steps.iter().map(|s| s.name().to_string()).collect();

        let mut summary = RunSummary::default();
        for name in &names {
            summary.step_states.push((name.clone(), StepState::Pending));
        }

        // `Plan`'s total_estimated_rows is filled in after prepare() runs
        // for each step below, but the event itself must precede every
        // `TaskPlanned`, so the ordering is satisfied by emitting it first
        // with a zero placeholder and never relying on it downstream.
        sink.handle(PipelineEvent::Plan {
            folder: folder.to_string(),
            incremental,
            limit,
            tasks: names.clone(),
            total_estimated_rows: 0,
        });

        let mut cancelled_overall = false;

        for (idx, step) in self.steps.iter_mut().enumerate() {
            let name = names[idx].clone();

            if cancelled_overall {
                summary.step_states[idx].1 = StepState::Cancelled;
                continue;
            }

            if ct.is_cancelled() {
                cancelled_overall = true;
                summary.step_states[idx].1 = StepState::Cancelled;
                continue;
            }

            summary.step_states[idx].1 = StepState::InProgress;
            tracing::info!(step = %name, "starting step");

            let estimated_total = step.prepare(store, ct)?;
            sink.handle(PipelineEvent::TaskPlanned {
                task_label: name.clone(),
                estimated_total,
            });

            if ct.is_cancelled() {
                summary.step_states[idx].1 = StepState::Cancelled;
                cancelled_overall = true;
                sink.handle(PipelineEvent::TaskCompleted {
                    task_label: name.clone(),
                    imported: 0,
                    deleted: 0,
                    errors: 0,
                    duration: Duration::ZERO,
                    cancelled: true,
                });
                continue;
            }

            step.before_execute(store, ct)?;

            let step_start = Instant::now();
            let tx_result = run_step_in_transaction(store, step.as_mut(), ct, &name, sink, estimated_total);

            match tx_result {
                Ok(StepRunOutcome::Completed(counters)) => {
                    let duration = step_start.elapsed();
                    summary.step_states[idx].1 = StepState::Completed;
                    summary.total_imported += counters.imported;
                    summary.total_deleted += counters.deleted;
                    summary.total_errors += counters.errors;
                    sink.handle(PipelineEvent::TaskCompleted {
                        task_label: name.clone(),
                        imported: counters.imported,
                        deleted: counters.deleted,
                        errors: counters.errors,
                        duration,
                        cancelled: false,
                    });
                }
                Ok(StepRunOutcome::Cancelled) => {
                    let duration = step_start.elapsed();
                    summary.step_states[idx].1 = StepState::Cancelled;
                    cancelled_overall = true;
                    sink.handle(PipelineEvent::TaskCompleted {
                        task_label: name.clone(),
                        imported: 0,
                        deleted: 0,
                        errors: 0,
                        duration,
                        cancelled: true,
                    });
                }
                Err(err) => {
                    let duration = step_start.elapsed();
                    summary.step_states[idx].1 = StepState::Failed;
                    sink.handle(PipelineEvent::TaskCompleted {
                        task_label: name.clone(),
                        imported: 0,
                        deleted: 0,
                        errors: 1,
                        duration,
                        cancelled: false,
                    });
                    sink.handle(PipelineEvent::Completed {
                        total_imported: summary.total_imported,
                        total_deleted: summary.total_deleted,
                        total_errors: summary.total_errors + 1,
                        duration: run_start.elapsed(),
                        cancelled: false,
                    });
                    return Err(err);
                }
            }
        }

        summary.duration = run_start.elapsed();
        summary.cancelled = cancelled_overall;
        sink.handle(PipelineEvent::Completed {
            total_imported: summary.total_imported,
            total_deleted: summary.total_deleted,
            total_errors: summary.total_errors,
            duration: summary.duration,
            cancelled: cancelled_overall,
        });

        Ok(summary)
    }
}

enum StepRunOutcome {
    Completed(StepCounters),
    Cancelled,
}

/// Runs `step.execute` inside an immediate transaction, rolling back on
/// cancellation or error and committing only on success.
fn run_step_in_transaction(
    store: &mut Store,
    step: &mut dyn Step,
    ct: &CancellationToken,
    name: &str,
    sink: &mut dyn EventSink,
    estimated_total: Option<u64>,
) -> anyhow::Result<StepRunOutcome> {
    let step_start = Instant::now();
    store
        .connection()
        .execute_batch("BEGIN IMMEDIATE")?;

    let mut last_processed = 0u64;
    let name_owned = name.to_string();
    let mut progress = |processed: u64| {
        last_processed = processed;
        sink.handle(PipelineEvent::Progress {
            task_label: name_owned.clone(),
            processed,
            estimated_total,
            elapsed: step_start.elapsed(),
        });
    };

    let result = step.execute(store, ct, &mut progress);

    match result {
        Ok(counters) => {
            if ct.is_cancelled() {
                store.connection().execute_batch("ROLLBACK")?;
                tracing::warn!(step = %name, "step cancelled, rolled back");
                return Ok(StepRunOutcome::Cancelled);
            }
            store.connection().execute_batch("COMMIT")?;
            Ok(StepRunOutcome::Completed(counters))
        }
        Err(err) => {
            store.connection().execute_batch("ROLLBACK").ok();
            tracing::error!(step = %name, error = %err, "step failed, rolled back");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingStep {
        name: &'static str,
        rows: u64,
        fail: bool,
        cancel_after: Option<CancellationToken>,
    }

    impl Step for CountingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn prepare(&mut self, _store: &Store, _ct: &CancellationToken) -> anyhow::Result<Option<u64>> {
            Ok(Some(self.rows))
        }

        fn execute(
            &mut self,
            _store: &mut Store,
            _ct: &CancellationToken,
            progress: &mut dyn FnMut(u64),
        ) -> anyhow::Result<StepCounters> {
            if self.fail {
                anyhow::bail!("boom");
            }
            if let Some(token) = &self.cancel_after {
                token.cancel();
            }
            progress(self.rows);
            Ok(StepCounters {
                imported: self.rows,
                deleted: 0,
                errors: 0,
            })
        }
    }

    #[test]
    fn runs_steps_in_order_and_sums_counters() {
        let mut store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        let ct = CancellationToken::new();
        let mut sink = RecordingSink::default();
        let mut engine = Engine::new(vec![
            Box::new(CountingStep { name: "A", rows: 3, fail: false, cancel_after: None }),
            Box::new(CountingStep { name: "B", rows: 5, fail: false, cancel_after: None }),
        ]);

        let summary = engine.run(&mut store, &ct, &mut sink, "folder", false, None).unwrap();
        assert_eq!(summary.total_imported, 8);
        assert!(!summary.cancelled);
        assert!(matches!(
            sink.events.first(),
            Some(PipelineEvent::Plan { .. })
        ));
        assert!(matches!(
            sink.events.last(),
            Some(PipelineEvent::Completed { .. })
        ));
    }

    #[test]
    fn failure_stops_the_pipeline() {
        let mut store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        let ct = CancellationToken::new();
        let mut sink = RecordingSink::default();
        let mut engine = Engine::new(vec![
            Box::new(CountingStep { name: "A", rows: 3, fail: true, cancel_after: None }),
            Box::new(CountingStep { name: "B", rows: 5, fail: false, cancel_after: None }),
        ]);

        let result = engine.run(&mut store, &ct, &mut sink, "folder", false, None);
        assert!(result.is_err());
        let ran_b = sink.events.iter().any(|e| matches!(e, PipelineEvent::TaskPlanned { task_label, .. } if task_label == "B"));
        assert!(!ran_b);
    }

    #[test]
    fn cancellation_mid_step_rolls_back_and_stops_remaining_steps() {
        let mut store = Store::open_in_memory().unwrap();
        store.init_schema().unwrap();
        let ct = CancellationToken::new();
        let mut sink = RecordingSink::default();
        let mut engine = Engine::new(vec![
            Box::new(CountingStep { name: "A", rows: 3, fail: false, cancel_after: Some(ct.clone()) }),
            Box::new(CountingStep { name: "B", rows: 5, fail: false, cancel_after: None }),
        ]);

        let summary = engine.run(&mut store, &ct, &mut sink, "folder", false, None).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.step_states[0].1, StepState::Cancelled);
        assert_eq!(summary.step_states[1].1, StepState::Cancelled);
        let ran_b = sink.events.iter().any(|e| matches!(e, PipelineEvent::TaskPlanned { task_label, .. } if task_label == "B"));
        assert!(!ran_b);
    }
}
