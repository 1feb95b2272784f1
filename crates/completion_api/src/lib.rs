//! Transport-only chat-completion client primitives.
//!
//! This crate owns request building, response parsing, and the error
//! taxonomy for one remote completion endpoint. It intentionally contains
//! no credential provisioning, no retry policy, and no UI coupling: one
//! `submit` call is exactly one outbound request, and the caller decides
//! what to do with the outcome.

pub mod client;
pub mod config;
pub mod error;
pub mod payload;

pub use client::CompletionClient;
pub use config::{CompletionConfig, DEFAULT_ENDPOINT};
pub use error::CompletionError;
pub use reqwest::StatusCode;
pub use payload::{extract_reply, ChatMessage, CompletionRequest, MAX_OUTPUT_TOKENS, TEMPERATURE};
