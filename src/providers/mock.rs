use std::thread;
use std::time::Duration;

use completion_api::{CompletionError, CompletionRequest};

use crate::runtime::CompletionBackend;

/// Deterministic offline backend for local runs and integration tests.
///
/// Replies echo the last user message after a short simulated round trip; no
/// network, no credentials.
#[derive(Debug, Default)]
pub struct MockCompletionBackend;

impl MockCompletionBackend {
    const REPLY_DELAY_MS: u64 = 200;
}

impl CompletionBackend for MockCompletionBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        thread::sleep(Duration::from_millis(Self::REPLY_DELAY_MS));

        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .map(|message| message.content.as_str())
            .unwrap_or_default();

        Ok(format!(
            "You said: **{prompt}**\n\nThis reply came from the offline mock backend."
        ))
    }
}
