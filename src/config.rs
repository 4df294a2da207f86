use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Settings for the edit client. The credential is passed in explicitly so
/// nothing below this struct reads the process environment.
#[derive(Debug, Clone)]
pub struct EditConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// `None` leaves the call to the service's own timing.
    pub timeout: Option<Duration>,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl EditConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Reads `GEMINI_API_KEY` (or `API_KEY`), `RETOUCH_MODEL`,
    /// `RETOUCH_BASE_URL` and `RETOUCH_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY"));
        let model = non_empty("RETOUCH_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = non_empty("RETOUCH_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout = match non_empty("RETOUCH_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    tracing::warn!(value = %raw, "ignoring invalid RETOUCH_TIMEOUT_SECS");
                    None
                }
            },
            None => None,
        };

        Self {
            api_key,
            model,
            base_url,
            timeout,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}
