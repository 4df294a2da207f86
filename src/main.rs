use std::io::{self, BufRead};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use retouch_core::config::EditConfig;
use retouch_core::protocol::{self, Output, Session};
use tracing_subscriber::EnvFilter;

fn main() {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config = EditConfig::from_env();
    if !config.has_credential() {
        tracing::warn!("no API key configured; batches will be refused until one is set");
    }

    let out: Output = Arc::new(Mutex::new(io::stdout()));

    let mut session = match Session::with_gemini(config, out.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialise edit client");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };

        if line.trim().is_empty() {
            continue;
        }

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| session.handle(&line)));

        let response = match result {
            Ok(resp) => resp,
            Err(_) => serde_json::json!({
                "status": "error",
                "message": "internal core error"
            })
            .to_string(),
        };

        if protocol::write_line(&out, &response).is_err() {
            break;
        }
    }

    tracing::debug!("stdin closed; waiting for in-flight work");
}
