use std::time::Duration;

/// Default completion endpoint (OpenRouter chat completions).
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Transport configuration for completion requests.
///
/// The credential is explicit construction-time state; this crate never
/// reads the process environment. An empty `api_key` is reported as a
/// configuration error when a request is submitted, not at build time.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Bearer token passed in `Authorization`.
    pub api_key: String,
    /// Full URL of the completion endpoint.
    pub endpoint: String,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: None,
        }
    }
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns true when a non-blank credential is configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
