use std::collections::HashSet;

use completion_api::CompletionError;

pub type TurnId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Immutable once appended; vec order in
/// [`App::transcript`] is creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Host operations the sink-owned state may request. Implemented by the
/// runtime controller; spied in tests.
pub trait HostOps {
    fn start_turn(&mut self, prompt: String, instructions: String) -> Result<TurnId, String>;
    fn request_render(&mut self);
}

pub const SYSTEM_INSTRUCTIONS_ENV_VAR: &str = "CHAT_SHELL_SYSTEM_INSTRUCTIONS";
pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "You are a helpful assistant.";

/// Presentation-sink state: the transcript and input buffer.
///
/// `App` is mutated only on the sink's thread. Background contexts reach it
/// exclusively through the controller's pending-event queue, so every append
/// here happens in drain order on one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub input: String,
    pub transcript: Vec<Message>,
    in_flight: HashSet<TurnId>,
    system_instructions: String,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

pub fn system_instructions_from_env() -> String {
    let from_env = std::env::var(SYSTEM_INSTRUCTIONS_ENV_VAR).ok();
    sanitize_system_instructions(from_env)
}

fn sanitize_system_instructions(raw: Option<String>) -> String {
    let Some(value) = raw else {
        return DEFAULT_SYSTEM_INSTRUCTIONS.to_string();
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        DEFAULT_SYSTEM_INSTRUCTIONS.to_string()
    } else {
        trimmed.to_string()
    }
}

impl App {
    pub fn new() -> Self {
        Self::with_system_instructions(None)
    }

    pub fn with_system_instructions(system_instructions: Option<String>) -> Self {
        Self {
            input: String::new(),
            transcript: Vec::new(),
            in_flight: HashSet::new(),
            system_instructions: sanitize_system_instructions(system_instructions),
        }
    }

    pub fn system_instructions(&self) -> &str {
        &self.system_instructions
    }

    /// Number of submitted turns still awaiting a result.
    pub fn in_flight_turns(&self) -> usize {
        self.in_flight.len()
    }

    pub fn on_input_replace(&mut self, text: String) {
        self.input = text;
    }

    /// Submits the current input buffer as one user turn.
    ///
    /// Empty or whitespace-only input is silently dropped: no transcript
    /// entry, no turn started. Otherwise the user message is appended first,
    /// the buffer is cleared, and the host starts a completion turn. There is
    /// no at-most-one-turn gate; a new turn may be submitted while others are
    /// outstanding, and each result is matched back by its own id.
    pub fn on_submit(&mut self, host: &mut dyn HostOps) {
        let submitted = std::mem::take(&mut self.input);
        let prompt = submitted.trim().to_string();

        if prompt.is_empty() {
            host.request_render();
            return;
        }

        self.transcript.push(Message {
            role: Role::User,
            content: prompt.clone(),
        });

        match host.start_turn(prompt, self.system_instructions.clone()) {
            Ok(turn_id) => {
                self.in_flight.insert(turn_id);
            }
            Err(error) => {
                self.push_assistant(format!("Failed to start turn: {error}"));
            }
        }

        host.request_render();
    }

    /// Applies one turn result: the reply text on success, a labeled notice
    /// on failure. A result for an unknown or already-resolved turn is
    /// dropped, which keeps delivery exactly-once per submitted turn.
    pub fn on_turn_resolved(&mut self, turn_id: TurnId, outcome: Result<String, CompletionError>) {
        if !self.in_flight.remove(&turn_id) {
            tracing::warn!(turn_id, "dropping result for unknown or already-resolved turn");
            return;
        }

        let content = match outcome {
            Ok(reply) => reply,
            Err(error) => failure_notice(&error),
        };
        self.push_assistant(content);
    }

    /// Treats a recognized utterance as voice-entered user input: it replaces
    /// whatever is in the input buffer and is submitted as a normal turn.
    pub fn on_utterance(&mut self, text: String, host: &mut dyn HostOps) {
        self.on_input_replace(text);
        self.on_submit(host);
    }

    fn push_assistant(&mut self, content: String) {
        self.transcript.push(Message {
            role: Role::Assistant,
            content,
        });
    }
}

/// Human-readable assistant-side notice for a failed turn. Failures never
/// propagate past this boundary; every one becomes a visible transcript entry.
fn failure_notice(error: &CompletionError) -> String {
    match error {
        CompletionError::Transport(cause) => format!("Network error: {cause}"),
        CompletionError::Status(status, _) => format!("HTTP error: {}", status.as_u16()),
        CompletionError::Malformed(detail) => format!("Malformed response: {detail}"),
        CompletionError::MissingApiKey
        | CompletionError::EmptyModel
        | CompletionError::EmptyMessages => format!("Configuration error: {error}"),
        CompletionError::Unknown(message) => format!("Error: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use completion_api::StatusCode;

    use super::*;

    #[derive(Default)]
    struct HostSpy {
        next_turn_id: TurnId,
        started: Vec<(String, String)>,
        render_requests: usize,
    }

    impl HostOps for HostSpy {
        fn start_turn(&mut self, prompt: String, instructions: String) -> Result<TurnId, String> {
            self.started.push((prompt, instructions));
            Ok(self.next_turn_id)
        }

        fn request_render(&mut self) {
            self.render_requests += 1;
        }
    }

    #[test]
    fn submit_appends_user_turn_clears_input_and_starts_turn() {
        let mut app = App::new();
        let mut host = HostSpy {
            next_turn_id: 7,
            ..HostSpy::default()
        };

        app.on_input_replace("  what is rust?  ".to_string());
        app.on_submit(&mut host);

        assert_eq!(app.input, "");
        assert_eq!(
            app.transcript,
            vec![Message {
                role: Role::User,
                content: "what is rust?".to_string(),
            }]
        );
        assert_eq!(
            host.started,
            vec![(
                "what is rust?".to_string(),
                DEFAULT_SYSTEM_INSTRUCTIONS.to_string(),
            )]
        );
        assert_eq!(app.in_flight_turns(), 1);
    }

    #[test]
    fn empty_and_whitespace_submissions_are_silently_dropped() {
        let mut app = App::new();
        let mut host = HostSpy::default();

        app.on_submit(&mut host);
        app.on_input_replace("   \t ".to_string());
        app.on_submit(&mut host);

        assert!(app.transcript.is_empty());
        assert!(host.started.is_empty());
        assert_eq!(app.input, "");
    }

    #[test]
    fn resolved_turn_appends_exactly_one_assistant_message() {
        let mut app = App::new();
        let mut host = HostSpy {
            next_turn_id: 3,
            ..HostSpy::default()
        };

        app.on_input_replace("hi".to_string());
        app.on_submit(&mut host);
        app.on_turn_resolved(3, Ok("hello back".to_string()));

        assert_eq!(app.transcript.len(), 2);
        assert_eq!(
            app.transcript[1],
            Message {
                role: Role::Assistant,
                content: "hello back".to_string(),
            }
        );
        assert_eq!(app.in_flight_turns(), 0);

        // A duplicate delivery for the same turn is dropped.
        app.on_turn_resolved(3, Ok("hello again".to_string()));
        assert_eq!(app.transcript.len(), 2);
    }

    #[test]
    fn result_for_unknown_turn_is_ignored() {
        let mut app = App::new();
        app.on_turn_resolved(99, Ok("stray".to_string()));
        assert!(app.transcript.is_empty());
    }

    #[test]
    fn status_failure_becomes_http_error_notice_with_code() {
        let mut app = App::new();
        let mut host = HostSpy::default();
        app.on_input_replace("hi".to_string());
        app.on_submit(&mut host);

        app.on_turn_resolved(
            0,
            Err(CompletionError::Status(
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream exploded".to_string(),
            )),
        );

        assert_eq!(app.transcript[1].role, Role::Assistant);
        assert_eq!(app.transcript[1].content, "HTTP error: 500");
    }

    #[test]
    fn malformed_failure_becomes_notice_with_detail() {
        let mut app = App::new();
        let mut host = HostSpy::default();
        app.on_input_replace("hi".to_string());
        app.on_submit(&mut host);

        app.on_turn_resolved(
            0,
            Err(CompletionError::Malformed("missing choices".to_string())),
        );

        assert!(app.transcript[1].content.contains("missing choices"));
    }

    #[test]
    fn missing_credential_becomes_configuration_notice() {
        let mut app = App::new();
        let mut host = HostSpy::default();
        app.on_input_replace("hi".to_string());
        app.on_submit(&mut host);

        app.on_turn_resolved(0, Err(CompletionError::MissingApiKey));

        assert!(app.transcript[1].content.starts_with("Configuration error:"));
    }

    #[test]
    fn utterance_is_submitted_as_a_user_turn() {
        let mut app = App::new();
        let mut host = HostSpy::default();

        app.on_input_replace("half-typed draft".to_string());
        app.on_utterance("turn on the lights".to_string(), &mut host);

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].content, "turn on the lights");
        assert_eq!(host.started.len(), 1);
    }

    #[test]
    fn start_turn_failure_surfaces_as_assistant_notice() {
        struct FailingHost;

        impl HostOps for FailingHost {
            fn start_turn(&mut self, _: String, _: String) -> Result<TurnId, String> {
                Err("worker spawn failed".to_string())
            }

            fn request_render(&mut self) {}
        }

        let mut app = App::new();
        app.on_input_replace("hi".to_string());
        app.on_submit(&mut FailingHost);

        assert_eq!(app.transcript.len(), 2);
        assert!(app.transcript[1].content.contains("worker spawn failed"));
        assert_eq!(app.in_flight_turns(), 0);
    }

    #[test]
    fn blank_system_instruction_overrides_fall_back_to_default() {
        let app = App::with_system_instructions(Some("   ".to_string()));
        assert_eq!(app.system_instructions(), DEFAULT_SYSTEM_INSTRUCTIONS);

        let app = App::with_system_instructions(Some("Answer in French.".to_string()));
        assert_eq!(app.system_instructions(), "Answer in French.");
    }
}
