use serde_json::{json, Value};

use crate::model::item::ItemSnapshot;
use crate::services::batch::BatchObserver;
use crate::services::report::RunReport;

use super::{write_line, Output};

/// Turns batch transitions into event lines on the protocol output.
pub struct EventEmitter {
    out: Output,
}

impl EventEmitter {
    pub fn new(out: Output) -> Self {
        Self { out }
    }

    fn emit(&self, event: &str, payload: Value) {
        let line = json!({ "event": event, "payload": payload }).to_string();
        if let Err(e) = write_line(&self.out, &line) {
            tracing::warn!(event, error = %e, "failed to write event");
        }
    }
}

impl BatchObserver for EventEmitter {
    fn item_updated(&self, item: &ItemSnapshot) {
        self.emit("item.updated", serde_json::to_value(item).unwrap_or(Value::Null));
    }

    fn progress(&self, index: usize, total: usize, item_id: &str) {
        self.emit(
            "batch.progress",
            json!({ "index": index, "total": total, "item_id": item_id }),
        );
    }

    fn batch_finished(&self, report: &RunReport) {
        self.emit("batch.finished", serde_json::to_value(report).unwrap_or(Value::Null));
    }
}
