use completion_api::{CompletionClient, CompletionConfig, CompletionError, CompletionRequest};

use crate::runtime::CompletionBackend;

/// OpenRouter-backed completion backend.
///
/// Turn workers are plain threads, so each call bridges into the async HTTP
/// client with a throwaway current-thread runtime.
pub struct HttpCompletionBackend {
    client: CompletionClient,
}

impl HttpCompletionBackend {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        Ok(Self {
            client: CompletionClient::new(config)?,
        })
    }
}

impl CompletionBackend for HttpCompletionBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                CompletionError::Unknown(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(self.client.submit(request))
    }
}
