use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{debug, error};

use crate::error::BatchError;
use crate::model::batch::Batch;
use crate::model::item::{ItemSnapshot, ItemState};
use crate::services::batch::{self, BatchObserver, SharedBatch};
use crate::services::editor::ImageEditor;
use crate::services::report::RunReport;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Progress {
    running: bool,
    current_index: Option<usize>,
    total: usize,
}

/// Point-in-time view of the batch for the front end.
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatus {
    pub running: bool,
    pub current_index: Option<usize>,
    pub total: usize,
    pub items: Vec<ItemSnapshot>,
}

/// Forwards to the caller's observer and keeps the progress counters.
struct Tracking {
    inner: Arc<dyn BatchObserver>,
    progress: Arc<Mutex<Progress>>,
}

impl BatchObserver for Tracking {
    fn item_updated(&self, item: &ItemSnapshot) {
        self.inner.item_updated(item);
    }

    fn progress(&self, index: usize, total: usize, item_id: &str) {
        {
            let mut p = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
            p.current_index = Some(index);
            p.total = total;
        }
        self.inner.progress(index, total, item_id);
    }

    fn batch_finished(&self, report: &RunReport) {
        {
            let mut p = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
            p.running = false;
            p.current_index = None;
        }
        self.inner.batch_finished(report);
    }
}

/// Owns one batch and runs it off the caller's thread: a single driver
/// thread for the batch loop plus one short-lived thread per retry.
pub struct BatchRunner {
    batch: SharedBatch,
    editor: Arc<dyn ImageEditor>,
    observer: Arc<Tracking>,
    progress: Arc<Mutex<Progress>>,
    driver: Option<JoinHandle<RunReport>>,
    retries: Vec<JoinHandle<()>>,
    last_report: Option<RunReport>,
}

impl BatchRunner {
    pub fn new(batch: Batch, editor: Arc<dyn ImageEditor>, observer: Arc<dyn BatchObserver>) -> Self {
        let progress = Arc::new(Mutex::new(Progress {
            total: batch.len(),
            ..Progress::default()
        }));

        Self {
            batch: Arc::new(Mutex::new(batch)),
            editor,
            observer: Arc::new(Tracking {
                inner: observer,
                progress: progress.clone(),
            }),
            progress,
            driver: None,
            retries: Vec::new(),
            last_report: None,
        }
    }

    pub fn batch(&self) -> &SharedBatch {
        &self.batch
    }

    pub fn is_running(&self) -> bool {
        self.driver.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// True while the batch loop or any retry still has work in flight.
    pub fn is_busy(&self) -> bool {
        self.is_running()
            || self.retries.iter().any(|h| !h.is_finished())
            || batch::lock(&self.batch)
                .items()
                .iter()
                .any(|i| i.state == ItemState::Processing)
    }

    /// Validates the submission, then processes every item on a background
    /// thread. Returns the number of items queued.
    pub fn start(&mut self, instruction: &str) -> Result<usize, BatchError> {
        if self.is_running() {
            return Err(BatchError::AlreadyRunning);
        }
        self.reap_driver();

        let ids = batch::prepare_run(&self.batch, instruction, self.observer.as_ref())?;
        let total = ids.len();

        {
            let mut p = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
            *p = Progress {
                running: true,
                current_index: None,
                total,
            };
        }

        let batch = self.batch.clone();
        let editor = self.editor.clone();
        let observer = self.observer.clone();
        let instruction = instruction.to_string();

        self.driver = Some(thread::spawn(move || {
            batch::drive(&batch, editor.as_ref(), &instruction, &ids, observer.as_ref())
        }));

        debug!(total, "batch driver spawned");
        Ok(total)
    }

    /// Marks the item `Processing` right away and runs the call on its own
    /// thread. Safe to call while the batch loop works on another item.
    pub fn retry(&mut self, item_id: &str, instruction: &str) -> Result<(), BatchError> {
        let source = batch::begin_retry(&self.batch, item_id, instruction, self.observer.as_ref())?;

        self.retries.retain(|h| !h.is_finished());

        let batch = self.batch.clone();
        let editor = self.editor.clone();
        let observer = self.observer.clone();
        let item_id = item_id.to_string();
        let instruction = instruction.to_string();

        self.retries.push(thread::spawn(move || {
            batch::process_item(
                &batch,
                editor.as_ref(),
                &item_id,
                source,
                &instruction,
                observer.as_ref(),
            );
        }));

        Ok(())
    }

    /// Blocks until the batch loop and all retries are done. Returns the
    /// report of the most recent batch run, if any.
    pub fn wait(&mut self) -> Option<RunReport> {
        self.reap_driver();

        for handle in self.retries.drain(..) {
            if handle.join().is_err() {
                error!("retry thread panicked");
            }
        }

        self.last_report.clone()
    }

    pub fn status(&self) -> BatchStatus {
        let progress = self
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        BatchStatus {
            running: progress.running && self.is_running(),
            current_index: progress.current_index,
            total: progress.total,
            items: batch::lock(&self.batch).snapshot(),
        }
    }

    fn reap_driver(&mut self) {
        if let Some(handle) = self.driver.take() {
            match handle.join() {
                Ok(report) => self.last_report = Some(report),
                Err(_) => {
                    error!("batch driver panicked");
                    let mut p = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
                    p.running = false;
                    p.current_index = None;
                }
            }
        }
    }
}

impl Drop for BatchRunner {
    fn drop(&mut self) {
        self.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditError;
    use crate::model::image::{ImageFormat, SourceImage};
    use crate::model::item::EditResult;
    use crate::services::batch::NoopObserver;
    use crate::services::editor::EditRequest;
    use std::sync::mpsc;
    use std::time::Duration;

    /// Blocks on "gate.png" until the test releases it; answers everything
    /// else at once.
    struct GatedEditor {
        gate: Mutex<mpsc::Receiver<()>>,
        entered: Mutex<mpsc::Sender<()>>,
    }

    impl ImageEditor for GatedEditor {
        fn edit(&self, request: &EditRequest) -> Result<EditResult, EditError> {
            if request.image.file_name == "gate.png" {
                let _ = self.entered.lock().unwrap().send(());
                let _ = self.gate.lock().unwrap().recv_timeout(Duration::from_secs(10));
            }
            if request.instruction == "fail" {
                return Err(EditError::Transport("refused".into()));
            }
            Ok(EditResult::new(None, Some(format!("{} done", request.image.file_name))).unwrap())
        }
    }

    fn batch_of(names: &[&str]) -> Batch {
        Batch::new(
            names
                .iter()
                .map(|n| SourceImage::new(*n, ImageFormat::Png, n.as_bytes().to_vec()))
                .collect(),
        )
    }

    #[test]
    fn runs_in_background_and_reports() {
        let (release, gate) = mpsc::channel();
        let (entered_tx, entered) = mpsc::channel();
        let editor = Arc::new(GatedEditor {
            gate: Mutex::new(gate),
            entered: Mutex::new(entered_tx),
        });

        let mut runner = BatchRunner::new(
            batch_of(&["a.png", "gate.png"]),
            editor,
            Arc::new(NoopObserver),
        );
        assert_eq!(runner.start("warmer light").unwrap(), 2);

        entered.recv_timeout(Duration::from_secs(10)).unwrap();
        let status = runner.status();
        assert!(status.running);
        assert_eq!(status.current_index, Some(1));
        assert_eq!(runner.start("again").unwrap_err(), BatchError::AlreadyRunning);

        release.send(()).unwrap();
        let report = runner.wait().unwrap();
        assert_eq!(report.succeeded, 2);

        let status = runner.status();
        assert!(!status.running);
        assert!(status.items.iter().all(|i| i.state.as_str() == "completed"));
    }

    #[test]
    fn retry_runs_while_batch_is_in_flight() {
        let (release, gate) = mpsc::channel();
        let (entered_tx, entered) = mpsc::channel();
        let editor = Arc::new(GatedEditor {
            gate: Mutex::new(gate),
            entered: Mutex::new(entered_tx),
        });

        let mut runner = BatchRunner::new(
            batch_of(&["first.png", "gate.png"]),
            editor,
            Arc::new(NoopObserver),
        );
        runner.start("fail").unwrap();
        entered.recv_timeout(Duration::from_secs(10)).unwrap();

        let first = batch::lock(runner.batch()).ids()[0].clone();
        let gated = batch::lock(runner.batch()).ids()[1].clone();
        assert_eq!(
            batch::lock(runner.batch()).get(&first).unwrap().state.as_str(),
            "error"
        );

        runner.retry(&first, "softer").unwrap();
        assert_eq!(
            runner.retry(&gated, "softer").unwrap_err(),
            BatchError::ItemBusy(gated.clone())
        );

        // Let the retry settle while the gated item is still in flight.
        for _ in 0..200 {
            if batch::lock(runner.batch()).get(&first).unwrap().state.is_settled() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(
            batch::lock(runner.batch()).get(&first).unwrap().state.as_str(),
            "completed"
        );
        assert_eq!(
            batch::lock(runner.batch()).get(&gated).unwrap().state,
            ItemState::Processing
        );

        release.send(()).unwrap();
        runner.wait();
        assert_eq!(
            batch::lock(runner.batch()).get(&gated).unwrap().state.as_str(),
            "error"
        );
        assert!(!runner.is_busy());
    }
}
