use std::io::{self, BufRead};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use chat_shell::app::{system_instructions_from_env, App, Role};
use chat_shell::providers;
use chat_shell::render::render_to_safe_inline;
use chat_shell::runtime::{ChatController, SinkWaker};
use speech_bridge::{RecognizerCommand, SpeechBridge};
use tracing_subscriber::EnvFilter;

const MODEL_ENV_VAR: &str = "CHAT_SHELL_MODEL";
const DEFAULT_MODEL_ID: &str = "openai/gpt-3.5-turbo";
const RECOGNIZER_ENV_VAR: &str = "CHAT_SHELL_RECOGNIZER";

enum ShellEvent {
    Input(String),
    Wake,
    InputClosed,
}

struct ChannelWaker(Sender<ShellEvent>);

impl SinkWaker for ChannelWaker {
    fn wake(&self) {
        // Receiver gone means the sink loop already exited.
        let _ = self.0.send(ShellEvent::Wake);
    }
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let system_instructions = system_instructions_from_env();
    let app = Arc::new(Mutex::new(App::with_system_instructions(Some(
        system_instructions,
    ))));

    let backend = providers::backend_from_env().map_err(io::Error::other)?;
    let model_id =
        std::env::var(MODEL_ENV_VAR).unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());

    let (sender, receiver) = mpsc::channel();
    let controller = ChatController::new(
        Arc::clone(&app),
        Arc::new(ChannelWaker(sender.clone())),
        backend,
        model_id,
    );

    let bridge = recognizer_from_env().map(SpeechBridge::new);
    if let Some(bridge) = &bridge {
        bridge
            .start_listening(controller.utterance_handler())
            .map_err(io::Error::other)?;
        tracing::info!("speech recognizer started");
    }

    spawn_stdin_reader(sender);

    let mut printed = 0usize;
    let mut host = Arc::clone(&controller);
    for event in receiver {
        match event {
            ShellEvent::Input(line) => {
                let mut app = lock_unpoisoned(&app);
                app.on_input_replace(line);
                app.on_submit(&mut host);
            }
            ShellEvent::Wake => {
                controller.flush_pending_events();
            }
            ShellEvent::InputClosed => break,
        }

        printed = print_new_messages(&app, printed);
    }

    if let Some(bridge) = &bridge {
        bridge.stop_listening();
    }

    Ok(())
}

fn recognizer_from_env() -> Option<RecognizerCommand> {
    let raw = std::env::var(RECOGNIZER_ENV_VAR).ok()?;
    let mut parts = raw.split_whitespace();
    let program = parts.next()?;

    let mut command = RecognizerCommand::new(program).args(parts.map(str::to_string));
    if let Ok(cwd) = std::env::current_dir() {
        command = command.current_dir(cwd);
    }

    Some(command)
}

fn spawn_stdin_reader(sender: Sender<ShellEvent>) {
    // Detached on purpose: a blocked stdin read must not hold up shutdown.
    let _ = thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let event = match line {
                    Ok(line) => ShellEvent::Input(line),
                    Err(_) => ShellEvent::InputClosed,
                };
                if sender.send(event).is_err() {
                    return;
                }
            }
            let _ = sender.send(ShellEvent::InputClosed);
        });
}

fn print_new_messages(app: &Arc<Mutex<App>>, already_printed: usize) -> usize {
    let app = lock_unpoisoned(app);
    for message in &app.transcript[already_printed..] {
        let label = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        println!("{label}: {}", render_to_safe_inline(&message.content));
    }
    app.transcript.len()
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
