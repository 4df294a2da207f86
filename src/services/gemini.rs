use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::EditConfig;
use crate::error::EditError;
use crate::model::item::EditResult;
use crate::services::editor::{EditRequest, ImageEditor};
use crate::services::gemini_types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Modality, Part,
};

const ERROR_SNIPPET_LEN: usize = 400;

/// Edit client for Gemini image models. One request per call, no retries.
pub struct GeminiClient {
    http: Client,
    config: EditConfig,
}

impl GeminiClient {
    pub fn new(config: EditConfig) -> Result<Self, EditError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EditError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }
}

impl ImageEditor for GeminiClient {
    fn edit(&self, request: &EditRequest) -> Result<EditResult, EditError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(EditError::Configuration)?;

        request.validate()?;

        let body = build_request(request);

        tracing::debug!(
            file = %request.image.file_name,
            mime = request.image.mime_type(),
            bytes = request.image.len(),
            model = %self.config.model,
            "sending edit request"
        );

        let resp = self
            .http
            .post(self.config.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .map_err(|e| EditError::Transport(e.to_string()))?;

        let status = resp.status();

        // Read as text first so a non-JSON error body is not lost.
        let text = resp
            .text()
            .map_err(|e| EditError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(EditError::Api {
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        let response: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| EditError::Decode(e.to_string()))?;

        decode_response(response)
    }
}

pub(crate) fn build_request(request: &EditRequest) -> GenerateContentRequest {
    let data = STANDARD.encode(&request.image.bytes);

    GenerateContentRequest {
        contents: vec![Content {
            role: None,
            parts: vec![
                Part::inline(request.image.mime_type(), data),
                Part::text(request.instruction.clone()),
            ],
        }],
        generation_config: GenerationConfig {
            response_modalities: vec![Modality::Image, Modality::Text],
        },
    }
}

/// Takes the first candidate's parts. A later text part replaces an earlier
/// one, and the same goes for images. Empty text counts as no text.
pub(crate) fn decode_response(response: GenerateContentResponse) -> Result<EditResult, EditError> {
    let block_reason = response
        .prompt_feedback
        .and_then(|f| f.block_reason);

    let mut image_url: Option<String> = None;
    let mut text: Option<String> = None;
    let mut finish_reason: Option<String> = None;

    if let Some(candidate) = response.candidates.into_iter().next() {
        finish_reason = candidate.finish_reason;
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text.filter(|t| !t.is_empty()) {
                text = Some(t);
            } else if let Some(inline) = part.inline_data {
                image_url = Some(format!("data:{};base64,{}", inline.mime_type, inline.data));
            }
        }
    }

    EditResult::new(image_url, text).ok_or_else(|| {
        let reason = block_reason.or(finish_reason.filter(|r| r != "STOP"));
        tracing::warn!(reason = ?reason, "edit response carried no image and no text");
        EditError::EmptyResponse {
            block_reason: reason,
        }
    })
}

/// Pulls `error.message` or `message` out of an error body, falling back to
/// a trimmed snippet of the raw text.
fn extract_error_message(body_text: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    let trimmed = body_text.trim();
    match trimmed.char_indices().nth(ERROR_SNIPPET_LEN) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
