//! Line-delimited JSON protocol.
//!
//! Requests: `{ "id", "cmd", "payload" }`, one per line. Every request gets
//! exactly one response line; batch transitions additionally produce
//! `{ "event", "payload" }` lines, possibly interleaved with responses.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};

use crate::config::EditConfig;
use crate::error::{BatchError, EditError};
use crate::model::batch::Batch;
use crate::services::batch::{self, BatchObserver};
use crate::services::editor::ImageEditor;
use crate::services::gemini::GeminiClient;
use crate::services::runner::BatchRunner;
use crate::services::{export, input, presets};

mod command;
mod events;

use command::Command;
pub use events::EventEmitter;

/// Shared sink for response and event lines.
pub type Output = Arc<Mutex<dyn Write + Send>>;

pub fn write_line(out: &Output, line: &str) -> io::Result<()> {
    let mut w = out.lock().unwrap_or_else(PoisonError::into_inner);
    writeln!(w, "{line}")?;
    w.flush()
}

fn get_cmd(req: &Value) -> &str {
    req.get("cmd").and_then(|v| v.as_str()).unwrap_or("")
}

fn get_id(req: &Value) -> Value {
    req.get("id").cloned().unwrap_or(Value::Null)
}

fn get_payload(req: &Value) -> &Value {
    static EMPTY: Value = Value::Null;
    req.get("payload").unwrap_or(&EMPTY)
}

fn get_str<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn ok(id: Value, payload: Value) -> String {
    json!({
        "id": id,
        "status": "ok",
        "payload": payload
    })
    .to_string()
}

fn err(id: Value, message: impl Into<String>) -> String {
    json!({
        "id": id,
        "status": "error",
        "message": message.into()
    })
    .to_string()
}

/// Protocol state: the configuration, the editor and the current batch.
pub struct Session {
    config: EditConfig,
    editor: Arc<dyn ImageEditor>,
    observer: Arc<dyn BatchObserver>,
    runner: Option<BatchRunner>,
}

impl Session {
    pub fn new(config: EditConfig, editor: Arc<dyn ImageEditor>, out: Output) -> Self {
        Self {
            config,
            editor,
            observer: Arc::new(EventEmitter::new(out)),
            runner: None,
        }
    }

    /// Session backed by the Gemini client.
    pub fn with_gemini(config: EditConfig, out: Output) -> Result<Self, EditError> {
        let client = GeminiClient::new(config.clone())?;
        Ok(Self::new(config, Arc::new(client), out))
    }

    pub fn handle(&mut self, input: &str) -> String {
        let req: Value = match serde_json::from_str(input) {
            Ok(v) => v,
            Err(_) => {
                return json!({
                    "status": "error",
                    "message": "invalid json"
                })
                .to_string();
            }
        };

        let id = get_id(&req);
        let cmd_str = get_cmd(&req);
        let payload = get_payload(&req);

        tracing::debug!(cmd = cmd_str, "request");

        match Command::from(cmd_str) {
            Command::Ping => ok(id, json!({ "message": "retouch-core alive" })),

            Command::Presets => ok(id, json!({ "presets": presets::PRESETS })),

            Command::BatchLoad => self.load(id, payload),

            Command::BatchStart => self.start(id, payload),

            Command::BatchStatus => match &self.runner {
                Some(runner) => ok(id, serde_json::to_value(runner.status()).unwrap_or(json!({}))),
                None => ok(
                    id,
                    json!({ "running": false, "current_index": null, "total": 0, "items": [] }),
                ),
            },

            Command::BatchWait => match &mut self.runner {
                Some(runner) => {
                    let report = runner.wait();
                    let items = batch::lock(runner.batch()).snapshot();
                    ok(id, json!({ "report": report, "items": items }))
                }
                None => err(id, BatchError::NoImages.to_string()),
            },

            Command::ItemRetry => {
                let item_id = get_str(payload, "item_id");
                let instruction = get_str(payload, "instruction");
                if item_id.is_empty() {
                    return err(id, "payload.item_id is required");
                }

                let Some(runner) = self.runner.as_mut() else {
                    return err(id, BatchError::UnknownItem(item_id.to_string()).to_string());
                };

                match runner.retry(item_id, instruction) {
                    Ok(()) => ok(id, json!({ "item_id": item_id, "status": "processing" })),
                    Err(e) => err(id, e.to_string()),
                }
            }

            Command::ItemExport => {
                let item_id = get_str(payload, "item_id");
                let dir = get_str(payload, "dir");
                if item_id.is_empty() {
                    return err(id, "payload.item_id is required");
                }
                if dir.is_empty() {
                    return err(id, "payload.dir is required");
                }

                let found = self.runner.as_ref().and_then(|r| {
                    let guard = batch::lock(r.batch());
                    let item = guard.get(item_id).cloned()?;
                    Some((item, guard.shared_name_position(item_id)))
                });

                let Some((item, position)) = found else {
                    return err(id, BatchError::UnknownItem(item_id.to_string()).to_string());
                };

                match export::export_item(&item, &PathBuf::from(dir), position) {
                    Ok(path) => ok(id, json!({ "path": path.to_string_lossy() })),
                    Err(e) => err(id, e.to_string()),
                }
            }

            Command::Unknown => err(id, "unknown command"),
        }
    }

    /// Replaces the current batch with a fresh selection.
    fn load(&mut self, id: Value, payload: &Value) -> String {
        let raw: Vec<String> = match payload.get("paths").and_then(|v| v.as_array()) {
            Some(arr) => arr
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            None => return err(id, "payload.paths must be an array"),
        };

        let paths = input::to_paths(&raw);
        if paths.is_empty() {
            return err(id, "payload.paths must contain at least one image");
        }

        if self.runner.as_ref().is_some_and(BatchRunner::is_busy) {
            return err(id, BatchError::AlreadyRunning.to_string());
        }

        let sources = match input::load_images(&paths) {
            Ok(s) => s,
            Err(e) => return err(id, e.to_string()),
        };

        let runner = BatchRunner::new(Batch::new(sources), self.editor.clone(), self.observer.clone());
        let items = batch::lock(runner.batch()).snapshot();
        self.runner = Some(runner);

        tracing::info!(count = items.len(), "batch loaded");
        ok(id, json!({ "items": items }))
    }

    /// Precondition errors surface here, before any network call.
    fn start(&mut self, id: Value, payload: &Value) -> String {
        let instruction = get_str(payload, "instruction");

        let Some(runner) = self.runner.as_mut() else {
            return err(id, BatchError::NoImages.to_string());
        };

        if let Err(e) = batch::validate_submission(&batch::lock(runner.batch()), instruction) {
            return err(id, e.to_string());
        }

        if !self.config.has_credential() {
            return err(id, BatchError::MissingCredential.to_string());
        }

        match runner.start(instruction) {
            Ok(total) => ok(id, json!({ "total": total })),
            Err(e) => err(id, e.to_string()),
        }
    }
}
