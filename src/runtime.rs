use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use completion_api::{CompletionError, CompletionRequest};

use crate::app::{App, HostOps, TurnId};

/// Blocking completion seam the per-turn workers call.
///
/// Implementations live in [`crate::providers`]; tests script their own.
pub trait CompletionBackend: Send + Sync + 'static {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Notifies the presentation sink that pending events are waiting.
///
/// The sink reacts by calling [`ChatController::flush_pending_events`] on its
/// own thread; the waker itself must never touch sink state.
pub trait SinkWaker: Send + Sync + 'static {
    fn wake(&self);
}

/// One marshaled command for the sink's drain queue.
#[derive(Debug)]
pub enum SinkEvent {
    TurnResolved {
        turn_id: TurnId,
        outcome: Result<String, CompletionError>,
    },
    Utterance {
        text: String,
    },
}

/// Cross-thread host for the sink-owned [`App`].
///
/// Background contexts (turn workers, the speech bridge's reader thread)
/// never mutate `App` directly: they enqueue [`SinkEvent`]s here, the first
/// enqueue onto an empty queue wakes the sink, and the sink drains the queue
/// on its own thread. That preserves per-source ordering while leaving
/// cross-turn completion order unconstrained.
pub struct ChatController {
    app: Arc<Mutex<App>>,
    waker: Arc<dyn SinkWaker>,
    backend: Arc<dyn CompletionBackend>,
    model_id: String,
    pending_events: Mutex<VecDeque<SinkEvent>>,
    next_turn_id: AtomicU64,
}

impl ChatController {
    pub fn new(
        app: Arc<Mutex<App>>,
        waker: Arc<dyn SinkWaker>,
        backend: Arc<dyn CompletionBackend>,
        model_id: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            app,
            waker,
            backend,
            model_id: model_id.into(),
            pending_events: Mutex::new(VecDeque::new()),
            next_turn_id: AtomicU64::new(1),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns a handler suitable for `SpeechBridge::start_listening`: each
    /// utterance is enqueued for the sink rather than applied from the
    /// bridge's reader thread.
    pub fn utterance_handler(self: &Arc<Self>) -> impl FnMut(String) + Send + 'static {
        let controller = Arc::clone(self);
        move |text| controller.enqueue(SinkEvent::Utterance { text })
    }

    pub fn enqueue_utterance(self: &Arc<Self>, text: String) {
        self.enqueue(SinkEvent::Utterance { text });
    }

    /// Drains queued events into the app. Must be called from the sink's
    /// thread; returns the number of events applied.
    pub fn flush_pending_events(self: &Arc<Self>) -> usize {
        let mut drained = 0usize;

        loop {
            let event = {
                let mut pending_events = lock_unpoisoned(&self.pending_events);
                pending_events.pop_front()
            };

            match event {
                Some(event) => {
                    self.apply_event(event);
                    drained += 1;
                }
                None => break,
            }
        }

        drained
    }

    fn start_turn_internal(
        self: &Arc<Self>,
        prompt: String,
        instructions: String,
    ) -> Result<TurnId, String> {
        let turn_id = self.next_turn_id.fetch_add(1, Ordering::SeqCst);
        let request = CompletionRequest::turn(self.model_id.clone(), instructions, prompt);

        let controller = Arc::clone(self);
        thread::Builder::new()
            .name(format!("chat-turn-{turn_id}"))
            .spawn(move || controller.run_turn(turn_id, request))
            .map_err(|error| format!("Failed to spawn turn worker: {error}"))?;

        Ok(turn_id)
    }

    /// Worker body for one turn. Exactly one `TurnResolved` event is enqueued
    /// per turn, including when the backend panics.
    fn run_turn(self: Arc<Self>, turn_id: TurnId, request: CompletionRequest) {
        let backend = Arc::clone(&self.backend);
        let outcome = match catch_unwind(AssertUnwindSafe(|| backend.complete(&request))) {
            Ok(outcome) => outcome,
            Err(_) => Err(CompletionError::Unknown(
                "completion backend panicked".to_string(),
            )),
        };

        self.enqueue(SinkEvent::TurnResolved { turn_id, outcome });
    }

    fn enqueue(self: &Arc<Self>, event: SinkEvent) {
        let should_wake = {
            let mut queue = lock_unpoisoned(&self.pending_events);
            let was_empty = queue.is_empty();
            queue.push_back(event);
            was_empty
        };

        if should_wake {
            self.waker.wake();
        }
    }

    fn apply_event(self: &Arc<Self>, event: SinkEvent) {
        match event {
            SinkEvent::TurnResolved { turn_id, outcome } => {
                let mut app = lock_unpoisoned(&self.app);
                app.on_turn_resolved(turn_id, outcome);
            }
            SinkEvent::Utterance { text } => {
                let mut host = Arc::clone(self);
                let mut app = lock_unpoisoned(&self.app);
                app.on_utterance(text, &mut host);
            }
        }
    }
}

impl HostOps for Arc<ChatController> {
    fn start_turn(&mut self, prompt: String, instructions: String) -> Result<TurnId, String> {
        self.start_turn_internal(prompt, instructions)
    }

    fn request_render(&mut self) {
        self.waker.wake();
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
