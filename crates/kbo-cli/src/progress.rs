//! An `indicatif` terminal renderer for the `PipelineEvent` stream, wrapped
//! in the engine's own `ThrottlingSink` the way a CLI progress bar wraps
//! whatever event source it's fed.

use indicatif::{ProgressBar, ProgressStyle};
use kbo_pipeline::{EventSink, PipelineEvent};

pub struct ProgressRenderer {
    bar: ProgressBar,
}

impl ProgressRenderer {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{prefix:.bold} {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl Default for ProgressRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ProgressRenderer {
    fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Plan { folder, incremental, tasks, .. } => {
                self.bar.println(format!(
                    "importing {folder} ({}) in {} steps",
                    if incremental { "incremental" } else { "full" },
                    tasks.len()
                ));
            }
            PipelineEvent::TaskPlanned { task_label, estimated_total } => {
                self.bar.set_prefix(task_label);
                self.bar.set_length(estimated_total.unwrap_or(0));
                self.bar.set_position(0);
            }
            PipelineEvent::Progress { processed, estimated_total, .. } => {
                if let Some(total) = estimated_total {
                    self.bar.set_length(total);
                }
                self.bar.set_position(processed);
            }
            PipelineEvent::TaskCompleted {
                task_label,
                imported,
                deleted,
                errors,
                duration,
                cancelled,
            } => {
                let verb = if cancelled { "cancelled" } else { "done" };
                self.bar.println(format!(
                    "{task_label}: {verb} ({imported} imported, {deleted} deleted, {errors} errors, {:.1?})",
                    duration
                ));
            }
            PipelineEvent::Completed {
                total_imported,
                total_deleted,
                total_errors,
                duration,
                cancelled,
            } => {
                self.bar.finish_and_clear();
                let verb = if cancelled { "cancelled" } else { "finished" };
                println!(
                    "{verb}: {total_imported} imported, {total_deleted} deleted, {total_errors} errors, {:.1?}",
                    duration
                );
            }
        }
    }
}
