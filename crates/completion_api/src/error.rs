use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;

/// Failure taxonomy for one completion submission.
///
/// The three network-facing variants are mutually exclusive for a single
/// call: `Transport` means no response was obtained, `Status` means the
/// remote answered with a non-success code, and `Malformed` means a
/// success response did not carry the expected body shape.
#[derive(Debug)]
pub enum CompletionError {
    /// No credential was configured; the request was not attempted.
    MissingApiKey,
    /// The request carried a blank model identifier.
    EmptyModel,
    /// The request carried no messages.
    EmptyMessages,
    /// Connection/IO failure before a response was obtained.
    Transport(reqwest::Error),
    /// Transport succeeded but the remote signaled a non-success status.
    Status(StatusCode, String),
    /// Success status with a body that did not match the expected shape.
    Malformed(String),
    /// Failure outside the request/response path (runtime setup, panics).
    Unknown(String),
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key is required"),
            Self::EmptyModel => write!(f, "model identifier must not be empty"),
            Self::EmptyMessages => write!(f, "request must carry at least one message"),
            Self::Transport(error) => write!(f, "network error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status}: {message}"),
            Self::Malformed(message) => write!(f, "malformed response: {message}"),
            Self::Unknown(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for CompletionError {}

impl From<reqwest::Error> for CompletionError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayloadFields {
    message: Option<String>,
}

/// Extracts a human-readable detail string from a non-success response body.
///
/// Falls back to the raw body, then to the status's canonical reason when
/// the body is empty or not the conventional `{"error":{"message"}}` shape.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload
            .error
            .and_then(|fields| fields.message)
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty())
        {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
