use serde::{Deserialize, Serialize};

use crate::error::CompletionError;

/// Output-length cap carried by every turn request.
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Sampling temperature carried by every turn request.
pub const TEMPERATURE: f64 = 0.7;

/// One role/content pair in the outbound message sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Canonical request payload for the chat-completions endpoint.
///
/// Built fresh per turn; no state is shared between requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl CompletionRequest {
    /// Builds the payload for one user turn: the system instruction first,
    /// then the user message, with the fixed sampling parameters.
    pub fn turn(
        model: impl Into<String>,
        instructions: impl Into<String>,
        user_text: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage::system(instructions),
                ChatMessage::user(user_text),
            ],
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Extracts the reply text from a success response body.
///
/// The body must be `{"choices":[{"message":{"content":...}}]}` with at
/// least one choice; anything else is a [`CompletionError::Malformed`].
pub fn extract_reply(body: &str) -> Result<String, CompletionError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|error| CompletionError::Malformed(error.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| CompletionError::Malformed("response contained no choices".to_string()))
}
