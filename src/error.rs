//! Error types for the retouch core.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single edit call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// No API credential was configured.
    #[error("API key is not configured; set GEMINI_API_KEY or API_KEY")]
    Configuration,

    #[error("instruction must not be empty")]
    EmptyInstruction,

    #[error("image must not be empty")]
    EmptyImage,

    /// The service answered without an image or a text part.
    #[error("{}", empty_response_message(.block_reason))]
    EmptyResponse { block_reason: Option<String> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

fn empty_response_message(block_reason: &Option<String>) -> String {
    match block_reason {
        Some(reason) => format!(
            "the API returned neither an image nor text (blocked: {reason})"
        ),
        None => "the API returned neither an image nor text; the response may have been blocked"
            .to_string(),
    }
}

/// Precondition failures of batch and retry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("load at least one image and write an instruction")]
    NoImages,

    #[error("load at least one image and write an instruction")]
    EmptyInstruction,

    #[error("API key is not configured; set GEMINI_API_KEY or API_KEY")]
    MissingCredential,

    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("item {0} is already processing")]
    ItemBusy(String),

    #[error("item {0} has not been processed yet")]
    NotSettled(String),

    #[error("a batch is already running")]
    AlreadyRunning,
}

/// Failures while loading images from disk.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported image format: {0} (expected PNG, JPEG or WEBP)")]
    UnsupportedFormat(PathBuf),

    #[error("image is empty: {0}")]
    EmptyFile(PathBuf),
}

/// Failures while writing an edited image to disk.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("item {0} has no edited image")]
    NoImage(String),

    #[error("malformed data URL")]
    MalformedDataUrl,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
