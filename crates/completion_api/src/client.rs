use reqwest::Client;

use crate::config::CompletionConfig;
use crate::error::{parse_error_message, CompletionError};
use crate::payload::{extract_reply, CompletionRequest};

/// HTTP client for one remote completion endpoint.
///
/// `submit` performs exactly one outbound call per invocation. There is no
/// retry, no caching, and no state retained between calls; retries, if
/// desired, belong to the caller.
#[derive(Debug)]
pub struct CompletionClient {
    http: Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(CompletionError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Submits one fully-formed request and resolves with the reply text or
    /// a classified failure.
    ///
    /// A missing credential is surfaced as [`CompletionError::MissingApiKey`]
    /// before any network activity. A non-success status is reported as
    /// [`CompletionError::Status`] regardless of body shape; only a success
    /// status with an unexpected body yields [`CompletionError::Malformed`].
    pub async fn submit(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.validate(request)?;

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(self.config.api_key.trim())
            .json(request)
            .send()
            .await
            .map_err(CompletionError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        let body = response.text().await.map_err(CompletionError::from)?;
        extract_reply(&body)
    }

    fn validate(&self, request: &CompletionRequest) -> Result<(), CompletionError> {
        if !self.config.has_api_key() {
            return Err(CompletionError::MissingApiKey);
        }
        if request.model.trim().is_empty() {
            return Err(CompletionError::EmptyModel);
        }
        if request.messages.is_empty() {
            return Err(CompletionError::EmptyMessages);
        }

        Ok(())
    }
}
