//! Headless chat-client core.
//!
//! ## Backend bootstrap
//!
//! `chat_shell` selects its completion backend from the environment:
//!
//! - `CHAT_SHELL_BACKEND=mock` for deterministic offline replies
//! - `CHAT_SHELL_BACKEND=openrouter` (the default) for the OpenRouter
//!   chat-completions transport, authenticated via `OPENROUTER_API_KEY`
//!
//! `CHAT_SHELL_MODEL` overrides the model identifier sent with every turn and
//! `CHAT_SHELL_SYSTEM_INSTRUCTIONS` overrides the system message.
//!
//! ## Threading contract
//!
//! [`app::App`] is mutated only on the presentation sink's thread. Turn
//! workers and the speech bridge's reader thread hand results to the sink
//! through [`runtime::ChatController`]'s pending-event queue; the first event
//! enqueued onto an empty queue wakes the sink via [`runtime::SinkWaker`].
//!
//! ## Speech input
//!
//! Set `CHAT_SHELL_RECOGNIZER` to a recognizer command line (for example
//! `python3 recognize.py`) to enable voice input. Recognized utterances are
//! submitted exactly as if typed.

pub mod app;
pub mod providers;
pub mod render;
pub mod runtime;
