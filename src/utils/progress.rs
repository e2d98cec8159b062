use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;

use crate::batch::{BatchUpdate, ItemStatus};
use crate::core::types::Stage;

/// Steps shown per bar: every pipeline stage.
fn stage_count() -> u64 {
    Stage::iter().count() as u64
}

fn stage_position(stage: Stage) -> u64 {
    Stage::iter().position(|s| s == stage).unwrap_or(0) as u64
}

/// One progress bar per batch input, driven by [`BatchUpdate`]s.
#[derive(Clone)]
pub struct ProgressTracker {
    pub(crate) multi_progress: Arc<MultiProgress>,
    bars: Vec<ProgressBar>,
}

impl ProgressTracker {
    pub fn new(queries: &[String]) -> Self {
        let multi_progress = Arc::new(MultiProgress::new());
        let bars = queries
            .iter()
            .map(|query| {
                let pb = multi_progress.add(ProgressBar::new(stage_count()));
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:20.cyan/blue}] {prefix:>24} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb.set_prefix(query.clone());
                pb.set_message(ItemStatus::Pending.label());
                pb
            })
            .collect();
        Self {
            multi_progress,
            bars,
        }
    }

    pub fn apply(&self, update: &BatchUpdate) {
        let Some(pb) = self.bars.get(update.index) else {
            return;
        };
        match update.status {
            ItemStatus::Pending => pb.set_message(update.status.label()),
            ItemStatus::Processing(stage) => {
                pb.enable_steady_tick(Duration::from_millis(100));
                pb.set_position(stage_position(stage));
                pb.set_message(update.status.label());
            }
            ItemStatus::Complete => {
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:20.green/blue}] {prefix:>24} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb.finish_with_message(update.status.label());
            }
            ItemStatus::Error(_) | ItemStatus::Cancelled => {
                pb.abandon_with_message(update.status.label());
            }
        }
    }

    /// Print above the bars without tearing them.
    pub fn println(&self, message: &str) {
        if self.multi_progress.println(message).is_err() {
            println!("{}", message);
        }
    }

    pub fn finish(&self) {
        for pb in self.bars.iter().filter(|pb| !pb.is_finished()) {
            pb.abandon();
        }
    }
}
