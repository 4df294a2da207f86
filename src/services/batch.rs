//! Sequential batch orchestration and single-item retry.
//!
//! Item state lives behind one mutex. The lock is taken only to read or write
//! state, never across an edit call, so a retry on one item can proceed while
//! the batch loop is waiting on another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::BatchError;
use crate::model::batch::Batch;
use crate::model::image::SourceImage;
use crate::model::item::{ItemSnapshot, ItemState};
use crate::services::editor::{EditRequest, ImageEditor};
use crate::services::report::{ItemOutcome, RunReport};

pub type SharedBatch = Arc<Mutex<Batch>>;

/// Receives every state transition. Called without the batch lock held.
pub trait BatchObserver: Send + Sync {
    fn item_updated(&self, _item: &ItemSnapshot) {}

    /// `index` is zero-based and always names the item about to be processed.
    fn progress(&self, _index: usize, _total: usize, _item_id: &str) {}

    fn batch_finished(&self, _report: &RunReport) {}
}

pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

pub fn lock(batch: &Mutex<Batch>) -> MutexGuard<'_, Batch> {
    batch.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Checks done before any network call.
pub fn validate_submission(batch: &Batch, instruction: &str) -> Result<(), BatchError> {
    if batch.is_empty() {
        return Err(BatchError::NoImages);
    }
    if instruction.trim().is_empty() {
        return Err(BatchError::EmptyInstruction);
    }
    Ok(())
}

/// Validates the submission and puts every item back to `Pending`.
/// Returns the identifiers in processing order.
pub fn prepare_run(
    batch: &Mutex<Batch>,
    instruction: &str,
    observer: &dyn BatchObserver,
) -> Result<Vec<String>, BatchError> {
    let (ids, reset) = {
        let mut guard = lock(batch);
        validate_submission(&guard, instruction)?;

        if let Some(busy) = guard
            .items()
            .iter()
            .find(|i| i.state == ItemState::Processing)
        {
            return Err(BatchError::ItemBusy(busy.id.clone()));
        }

        let ids = guard.ids();
        let mut reset = Vec::new();
        for id in &ids {
            if let Some(item) = guard.get_mut(id) {
                if item.state != ItemState::Pending {
                    item.state = ItemState::Pending;
                    reset.push(item.snapshot());
                }
            }
        }
        (ids, reset)
    };

    for snapshot in &reset {
        observer.item_updated(snapshot);
    }
    Ok(ids)
}

/// Processes `ids` strictly in order, one call at a time. A failing item is
/// recorded and the loop moves on.
pub fn drive(
    batch: &Mutex<Batch>,
    editor: &dyn ImageEditor,
    instruction: &str,
    ids: &[String],
    observer: &dyn BatchObserver,
) -> RunReport {
    let total = ids.len();
    info!(total, "batch started");

    let mut report = RunReport::default();

    for (index, id) in ids.iter().enumerate() {
        observer.progress(index, total, id);

        let source = match mark_processing(batch, id, observer) {
            Some(source) => source,
            None => {
                warn!(item = %id, "item vanished from batch; skipping");
                continue;
            }
        };

        report.record(process_item(batch, editor, id, source, instruction, observer));
    }

    if report.failed > 0 {
        warn!(
            succeeded = report.succeeded,
            failed = report.failed,
            "batch finished with failures"
        );
    } else {
        info!(succeeded = report.succeeded, "batch finished");
    }

    observer.batch_finished(&report);
    report
}

/// Runs the whole batch on the calling thread.
pub fn run_batch(
    batch: &Mutex<Batch>,
    editor: &dyn ImageEditor,
    instruction: &str,
    observer: &dyn BatchObserver,
) -> Result<RunReport, BatchError> {
    let ids = prepare_run(batch, instruction, observer)?;
    Ok(drive(batch, editor, instruction, &ids, observer))
}

/// Validates a retry and marks the item `Processing`.
pub fn begin_retry(
    batch: &Mutex<Batch>,
    id: &str,
    instruction: &str,
    observer: &dyn BatchObserver,
) -> Result<Arc<SourceImage>, BatchError> {
    if instruction.trim().is_empty() {
        return Err(BatchError::EmptyInstruction);
    }

    let (source, snapshot) = {
        let mut guard = lock(batch);
        let item = guard
            .get_mut(id)
            .ok_or_else(|| BatchError::UnknownItem(id.to_string()))?;

        match item.state {
            ItemState::Processing => return Err(BatchError::ItemBusy(id.to_string())),
            ItemState::Pending => return Err(BatchError::NotSettled(id.to_string())),
            ItemState::Completed { .. } | ItemState::Error { .. } => {}
        }

        item.state = ItemState::Processing;
        (item.source.clone(), item.snapshot())
    };

    observer.item_updated(&snapshot);
    Ok(source)
}

/// Re-runs one settled item with a new instruction. Siblings are untouched.
pub fn retry_item(
    batch: &Mutex<Batch>,
    editor: &dyn ImageEditor,
    id: &str,
    instruction: &str,
    observer: &dyn BatchObserver,
) -> Result<ItemOutcome, BatchError> {
    let source = begin_retry(batch, id, instruction, observer)?;
    info!(item = %id, "retrying item");
    Ok(process_item(batch, editor, id, source, instruction, observer))
}

fn mark_processing(
    batch: &Mutex<Batch>,
    id: &str,
    observer: &dyn BatchObserver,
) -> Option<Arc<SourceImage>> {
    let (source, snapshot) = {
        let mut guard = lock(batch);
        let item = guard.get_mut(id)?;
        item.state = ItemState::Processing;
        (item.source.clone(), item.snapshot())
    };
    observer.item_updated(&snapshot);
    Some(source)
}

/// Calls the editor for an item already marked `Processing` and stores the
/// outcome.
pub fn process_item(
    batch: &Mutex<Batch>,
    editor: &dyn ImageEditor,
    id: &str,
    source: Arc<SourceImage>,
    instruction: &str,
    observer: &dyn BatchObserver,
) -> ItemOutcome {
    debug!(item = %id, "editing item");

    let request = EditRequest::new(source, instruction);
    let (state, outcome) = match editor.edit(&request) {
        Ok(result) => (
            ItemState::Completed { result },
            ItemOutcome {
                item_id: id.to_string(),
                ok: true,
                error: None,
            },
        ),
        Err(e) => {
            let message = e.to_string();
            warn!(item = %id, error = %message, "item failed");
            (
                ItemState::Error {
                    message: message.clone(),
                },
                ItemOutcome {
                    item_id: id.to_string(),
                    ok: false,
                    error: Some(message),
                },
            )
        }
    };

    let snapshot = {
        let mut guard = lock(batch);
        guard.get_mut(id).map(|item| {
            item.state = state;
            item.snapshot()
        })
    };

    if let Some(snapshot) = snapshot {
        observer.item_updated(&snapshot);
    }

    outcome
}
