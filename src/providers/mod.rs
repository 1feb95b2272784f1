use std::sync::Arc;

use completion_api::CompletionConfig;

use crate::runtime::CompletionBackend;

mod http;
mod mock;

pub use http::HttpCompletionBackend;
pub use mock::MockCompletionBackend;

pub const DEFAULT_BACKEND_ID: &str = "openrouter";
pub const BACKEND_ENV_VAR: &str = "CHAT_SHELL_BACKEND";
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

/// Resolves the completion backend from `CHAT_SHELL_BACKEND`, defaulting to
/// the OpenRouter transport. This is the only place the process environment
/// feeds backend construction.
pub fn backend_from_env() -> Result<Arc<dyn CompletionBackend>, String> {
    let backend_id = std::env::var(BACKEND_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    backend_for_id(backend_id.as_deref().unwrap_or(DEFAULT_BACKEND_ID))
}

pub fn backend_for_id(backend_id: &str) -> Result<Arc<dyn CompletionBackend>, String> {
    match backend_id {
        "mock" => Ok(Arc::new(MockCompletionBackend::default())),
        DEFAULT_BACKEND_ID => {
            // A missing key is not a startup failure: submission reports it
            // as a configuration error on the turn that needed it.
            let api_key = std::env::var(API_KEY_ENV_VAR).unwrap_or_default();
            let backend = HttpCompletionBackend::new(CompletionConfig::new(api_key))
                .map_err(|error| format!("Failed to initialize completion client: {error}"))?;
            Ok(Arc::new(backend))
        }
        unknown => Err(format!(
            "Unsupported backend '{unknown}'. Available backends: mock, {DEFAULT_BACKEND_ID}"
        )),
    }
}
