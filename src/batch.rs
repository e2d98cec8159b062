//! Runs the single-company pipeline over many inputs.
//!
//! Inputs are processed in fixed-size groups. Every item in a group runs
//! concurrently on the current task; the next group starts only once the whole
//! group has settled, after a short pause for upstream rate limits.
//! Cancellation is checked before each group and never interrupts an item
//! that has already started.

use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::error::{ErrorKind, StageError};
use crate::core::types::{CompanyResult, Stage};
use crate::pipeline::Analyzer;

pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_GROUP_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Processing(Stage),
    Complete,
    Error(ErrorKind),
    Cancelled,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemStatus::Complete | ItemStatus::Error(_) | ItemStatus::Cancelled
        )
    }

    /// Short text for progress displays.
    pub fn label(&self) -> String {
        match self {
            ItemStatus::Pending => "pending".to_string(),
            ItemStatus::Processing(stage) => stage.to_string(),
            ItemStatus::Complete => "complete".to_string(),
            ItemStatus::Error(kind) => format!("error: {}", kind),
            ItemStatus::Cancelled => "cancelled".to_string(),
        }
    }
}

/// A status change for one input, sent while the batch runs.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchUpdate {
    pub index: usize,
    pub query: String,
    pub status: ItemStatus,
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub index: usize,
    /// The input exactly as given; never replaced by the resolved name.
    pub query: String,
    pub status: ItemStatus,
    pub result: Option<CompanyResult>,
}

/// State of one batch. Owned by the caller once `run_batch` returns.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub items: Vec<BatchItem>,
    pub cancelled: bool,
}

impl BatchRun {
    pub fn new(queries: Vec<String>) -> Self {
        let items = queries
            .into_iter()
            .enumerate()
            .map(|(index, query)| BatchItem {
                index,
                query,
                status: ItemStatus::Pending,
                result: None,
            })
            .collect();
        Self {
            items,
            cancelled: false,
        }
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Items that ran to completion or error.
    pub fn completed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::Complete | ItemStatus::Error(_)))
            .count()
    }

    pub fn progress(&self) -> f64 {
        if self.items.is_empty() {
            return 1.0;
        }
        self.completed_count() as f64 / self.total() as f64
    }

    /// Settled results keyed by input index.
    pub fn results(&self) -> BTreeMap<usize, &CompanyResult> {
        self.items
            .iter()
            .filter_map(|i| i.result.as_ref().map(|r| (i.index, r)))
            .collect()
    }
}

/// Shared flag a caller flips to stop a batch at the next group boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BatchOrchestrator {
    analyzer: Arc<Analyzer>,
    batch_size: usize,
    group_pause: Duration,
}

impl BatchOrchestrator {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        Self {
            analyzer,
            batch_size: DEFAULT_BATCH_SIZE,
            group_pause: DEFAULT_GROUP_PAUSE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_group_pause(mut self, group_pause: Duration) -> Self {
        self.group_pause = group_pause;
        self
    }

    pub async fn run_batch(
        &self,
        queries: Vec<String>,
        cancel: &CancelHandle,
        updates: Option<UnboundedSender<BatchUpdate>>,
    ) -> BatchRun {
        let mut run = BatchRun::new(queries);
        let notify = |index: usize, query: &str, status: ItemStatus| {
            if let Some(tx) = &updates {
                let _ = tx.send(BatchUpdate {
                    index,
                    query: query.to_string(),
                    status,
                });
            }
        };

        let indices: Vec<usize> = (0..run.total()).collect();
        let groups: Vec<&[usize]> = indices.chunks(self.batch_size).collect();
        log::info!(
            "Processing {} companies in {} groups of up to {}",
            run.total(),
            groups.len(),
            self.batch_size
        );

        for (group_no, group) in groups.iter().enumerate() {
            if group_no > 0 && !self.group_pause.is_zero() {
                tokio::time::sleep(self.group_pause).await;
            }

            if cancel.is_cancelled() {
                log::info!("Batch cancelled before group {}", group_no + 1);
                for item in run.items.iter_mut().filter(|i| i.status == ItemStatus::Pending) {
                    item.status = ItemStatus::Cancelled;
                    notify(item.index, &item.query, ItemStatus::Cancelled);
                }
                run.cancelled = true;
                break;
            }

            let jobs: Vec<(usize, String)> = group
                .iter()
                .map(|&idx| (idx, run.items[idx].query.clone()))
                .collect();
            for (idx, query) in &jobs {
                run.items[*idx].status = ItemStatus::Processing(Stage::Resolving);
                notify(*idx, query, ItemStatus::Processing(Stage::Resolving));
            }

            let settled = join_all(
                jobs.iter()
                    .map(|(idx, query)| self.run_item(*idx, query, updates.as_ref())),
            )
            .await;

            for (idx, result) in jobs.iter().map(|(idx, _)| *idx).zip(settled) {
                let status = match result.error_kind() {
                    Some(kind) => ItemStatus::Error(kind),
                    None => ItemStatus::Complete,
                };
                let item = &mut run.items[idx];
                item.status = status;
                item.result = Some(result);
                notify(idx, &item.query, status);
            }

            log::info!(
                "Group {} of {} done ({}/{} complete)",
                group_no + 1,
                groups.len(),
                run.completed_count(),
                run.total()
            );
        }

        run
    }

    /// Run one item, turning a panic into an `Unexpected` result so siblings
    /// in the group are unaffected.
    async fn run_item(
        &self,
        index: usize,
        query: &str,
        updates: Option<&UnboundedSender<BatchUpdate>>,
    ) -> CompanyResult {
        let last_stage = Mutex::new(Stage::Resolving);
        let observer = |stage: Stage| {
            if let Ok(mut last) = last_stage.lock() {
                *last = stage;
            }
            if let Some(tx) = updates {
                let _ = tx.send(BatchUpdate {
                    index,
                    query: query.to_string(),
                    status: ItemStatus::Processing(stage),
                });
            }
        };

        let outcome = AssertUnwindSafe(self.analyzer.run_observed(query, &observer))
            .catch_unwind()
            .await;

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let stage = last_stage.lock().map(|s| *s).unwrap_or(Stage::Resolving);
                let message = panic_message(panic.as_ref());
                log::error!("Processing '{}' panicked at {}: {}", query, stage, message);
                CompanyResult::new(query).fail(stage, StageError::new(ErrorKind::Unexpected, message))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
