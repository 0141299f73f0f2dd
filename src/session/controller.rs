//! Conversation state machine
//!
//! The controller owns the speech channel, the live session and the idle
//! clock. It runs as a single task; everything that happens to a session
//! arrives as a message on one queue, so turns are handled strictly one at
//! a time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use uuid::Uuid;

use super::classify::{FirstTurn, classify_first_turn, clean_name, is_end_command};
use super::state::{ConversationSession, SessionState, Speaker, Utterance};
use super::store::NameStore;
use crate::resolver::{GENERIC_LISTENER, Resolution, ResponseResolver, ResponseSource};
use crate::text::normalize_input;
use crate::Result;
use crate::voice::SpeechChannel;

/// Spoken when the conversation ends
pub const FAREWELL: &str = "Thank you for chatting with me. I hope I was able to help you.";

/// Spoken when the completion provider cannot be reached
pub const PROVIDER_APOLOGY: &str =
    "I'm having trouble connecting to my brain. Please check if Ollama is running properly.";

/// Timing and identity for a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Inactivity before the session is torn down
    pub idle_timeout: Duration,
    /// Delay between the farewell and the fresh session
    pub reset_delay: Duration,
    /// Name the assistant introduces itself with
    pub assistant_name: String,
    /// Model passed to the resolver; empty means its default
    pub selected_model: String,
    /// Start the next conversation as soon as a finished one is reset
    pub restart_after_reset: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(35),
            reset_delay: Duration::from_secs(5),
            assistant_name: "R3".to_string(),
            selected_model: String::new(),
            restart_after_reset: false,
        }
    }
}

/// Observable view of the live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub state: SessionState,
    pub user_name: String,
    pub transcript: Vec<Utterance>,
}

impl SessionSnapshot {
    fn of(session: &ConversationSession) -> Self {
        Self {
            id: session.id(),
            state: session.state(),
            user_name: session.user_name().to_string(),
            transcript: session.transcript().to_vec(),
        }
    }

    /// Text of the most recent assistant line
    #[must_use]
    pub fn last_reply(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|u| u.speaker == Speaker::Assistant)
            .map(|u| u.text.as_str())
    }
}

#[derive(Debug)]
enum Message {
    StartPressed,
    TogglePressed,
    Utterance(String),
    Resolved {
        session_id: Uuid,
        seq: u64,
        result: Result<Resolution>,
    },
    Close,
    Shutdown,
}

/// Why a session is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    EndCommand,
    IdleTimeout,
}

struct PendingResolution {
    seq: u64,
    task: JoinHandle<()>,
}

/// Client side of a running controller
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Message>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Press "start conversation"
    pub fn start(&self) {
        self.send(Message::StartPressed);
    }

    /// Press the listen toggle
    pub fn toggle(&self) {
        self.send(Message::TogglePressed);
    }

    /// Deliver text as if it had been recognized
    pub fn submit(&self, text: impl Into<String>) {
        self.send(Message::Utterance(text.into()));
    }

    /// Stop once no reply is pending
    ///
    /// Messages already queued are still handled, so a question asked just
    /// before closing gets its answer spoken.
    pub fn close(&self) {
        self.send(Message::Close);
    }

    /// Stop the controller loop
    pub fn shutdown(&self) {
        self.send(Message::Shutdown);
    }

    /// Current session view
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every session change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    fn send(&self, message: Message) {
        if self.tx.send(message).is_err() {
            tracing::debug!("session controller has stopped");
        }
    }
}

/// Drives one conversation at a time
pub struct SessionController {
    session: ConversationSession,
    speech: SpeechChannel,
    resolver: Arc<ResponseResolver>,
    names: Arc<dyn NameStore>,
    settings: SessionSettings,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    snapshots: watch::Sender<SessionSnapshot>,
    idle_deadline: Option<Instant>,
    reset_deadline: Option<Instant>,
    pending: Option<PendingResolution>,
    next_seq: u64,
    closing: bool,
}

impl SessionController {
    /// Create a controller and the handle used to drive it
    #[must_use]
    pub fn new(
        speech: SpeechChannel,
        resolver: Arc<ResponseResolver>,
        names: Arc<dyn NameStore>,
        settings: SessionSettings,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ConversationSession::new();
        let (snapshots, snapshot_rx) = watch::channel(SessionSnapshot::of(&session));

        let handle = SessionHandle {
            tx: tx.clone(),
            snapshots: snapshot_rx,
        };

        let controller = Self {
            session,
            speech,
            resolver,
            names,
            settings,
            tx,
            rx,
            snapshots,
            idle_deadline: None,
            reset_deadline: None,
            pending: None,
            next_seq: 1,
            closing: false,
        };

        (controller, handle)
    }

    /// Run until shut down
    pub async fn run(mut self) {
        tracing::info!(session = %self.session.id(), "session controller started");

        loop {
            let idle = deadline(self.idle_deadline);
            let reset = deadline(self.reset_deadline);

            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(Message::Shutdown) | None => break,
                    Some(message) => self.handle_message(message),
                },
                Some(event) = self.speech.next_event() => self.speech.handle_event(event),
                () = idle => self.on_idle_timeout(),
                () = reset => self.reset(),
            }

            self.publish();

            if self.closing && self.pending.is_none() {
                break;
            }
        }

        self.abort_pending();
        self.speech.stop_listening();
        tracing::info!("session controller stopped");
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::StartPressed => self.on_start(),
            Message::TogglePressed => self.on_toggle(),
            Message::Utterance(raw) => self.on_utterance(&raw),
            Message::Resolved {
                session_id,
                seq,
                result,
            } => self.on_resolved(session_id, seq, result),
            Message::Close => {
                tracing::info!(pending = self.pending.is_some(), "closing session controller");
                self.closing = true;
            }
            Message::Shutdown => {}
        }
    }

    fn on_start(&mut self) {
        if self.session.state() != SessionState::Idle || self.session.is_started() {
            tracing::debug!(state = %self.session.state(), "start ignored");
            return;
        }

        self.session.set_state(SessionState::Greeting);
        self.session.mark_started();
        self.publish();

        let remembered = self.load_name();
        let greeting = match &remembered {
            Some(name) => {
                self.session.set_user_name(name.clone());
                format!("Welcome back, {name}.")
            }
            None => format!("Hi, I'm {}. What's your name?", self.settings.assistant_name),
        };

        tracing::info!(session = %self.session.id(), returning = remembered.is_some(), "greeting");
        self.say(&greeting, None);
        self.resume_capture();
        self.arm_idle();
    }

    fn on_toggle(&mut self) {
        match self.session.state() {
            SessionState::Listening | SessionState::AwaitingName => {
                self.speech.stop_listening();
                self.session.set_state(SessionState::Idle);
                self.idle_deadline = None;
                tracing::info!("listening paused");
            }
            SessionState::Idle if self.session.is_started() => {
                self.resume_capture();
                self.arm_idle();
                tracing::info!("listening resumed");
            }
            SessionState::Idle => self.on_start(),
            state => tracing::debug!(%state, "toggle ignored"),
        }
    }

    fn on_utterance(&mut self, raw: &str) {
        let state = self.session.state();
        if !matches!(state, SessionState::Listening | SessionState::AwaitingName) {
            tracing::debug!(%state, "utterance ignored");
            return;
        }

        let text = normalize_input(raw);
        if text.is_empty() {
            tracing::debug!("empty utterance ignored");
            return;
        }

        let first_turn = !self.session.has_user_turn();
        self.session.push(Utterance::user(text.clone()));
        self.session.touch();
        self.arm_idle();

        if is_end_command(&text) {
            self.teardown(Teardown::EndCommand);
            return;
        }

        if !first_turn {
            let name = self.listener_name();
            self.begin_thinking(text, name);
            return;
        }

        match classify_first_turn(&text) {
            FirstTurn::Name => self.accept_name(&text),
            FirstTurn::Question => {
                let name = self.load_name();
                if let Some(name) = &name {
                    self.session.set_user_name(name.clone());
                }
                let name = name.unwrap_or_else(|| GENERIC_LISTENER.to_string());
                self.begin_thinking(text, name);
            }
        }
    }

    fn accept_name(&mut self, text: &str) {
        let name = clean_name(text);
        tracing::info!(name = %name, "user introduced themselves");

        self.session.set_user_name(name.clone());
        if let Err(e) = self.names.save(&name) {
            tracing::warn!(error = %e, "failed to persist user name");
        }

        self.say(&format!("Nice to meet you, {name}."), None);
        self.session.set_state(SessionState::Listening);
    }

    fn begin_thinking(&mut self, input: String, name: String) {
        self.speech.stop_listening();
        self.session.set_state(SessionState::Thinking);
        self.abort_pending();

        let seq = self.next_seq;
        self.next_seq += 1;

        let session_id = self.session.id();
        let resolver = Arc::clone(&self.resolver);
        let model = self.settings.selected_model.clone();
        let tx = self.tx.clone();

        let task = tokio::spawn(async move {
            let result = resolver.resolve(&input, &name, &model).await;
            let _ = tx.send(Message::Resolved {
                session_id,
                seq,
                result,
            });
        });

        self.pending = Some(PendingResolution { seq, task });
    }

    fn on_resolved(&mut self, session_id: Uuid, seq: u64, result: Result<Resolution>) {
        let current = self.pending.as_ref().map(|p| p.seq);
        if session_id != self.session.id() || current != Some(seq) {
            tracing::debug!(%session_id, seq, "discarding stale resolution");
            return;
        }
        self.pending = None;

        match result {
            Ok(resolution) => {
                tracing::info!(source = %resolution.source, "reply ready");
                self.session.set_state(SessionState::Speaking);
                self.say(&resolution.text, Some(resolution.source));
            }
            Err(e) => {
                tracing::warn!(error = %e, provider = e.is_provider(), "resolution failed");
                self.session.set_state(SessionState::Speaking);
                self.say(PROVIDER_APOLOGY, None);
            }
        }

        self.session.touch();
        self.resume_capture();
        self.arm_idle();
    }

    fn on_idle_timeout(&mut self) {
        self.idle_deadline = None;
        if !self.session.state().is_active() {
            return;
        }

        tracing::info!(session = %self.session.id(), "idle timeout");
        self.teardown(Teardown::IdleTimeout);
    }

    fn teardown(&mut self, reason: Teardown) {
        tracing::info!(session = %self.session.id(), ?reason, "ending conversation");

        self.speech.stop_listening();
        self.abort_pending();
        self.idle_deadline = None;
        self.session.set_state(SessionState::Ending);

        self.say(FAREWELL, None);

        self.session.set_user_name(String::new());
        if let Err(e) = self.names.clear() {
            tracing::warn!(error = %e, "failed to clear user name");
        }

        self.reset_deadline = Instant::now().checked_add(self.settings.reset_delay);
    }

    fn reset(&mut self) {
        self.reset_deadline = None;
        let previous = self.session.id();
        self.session = ConversationSession::new();
        tracing::info!(%previous, session = %self.session.id(), "session reset");

        if self.settings.restart_after_reset && !self.closing {
            self.on_start();
        }
    }

    /// Record and speak an assistant line
    fn say(&mut self, text: &str, source: Option<ResponseSource>) {
        self.session.push(Utterance::assistant(text, source));
        if let Err(e) = self.speech.speak(text) {
            tracing::warn!(error = %e, "speech synthesis unavailable");
        }
    }

    fn resume_capture(&mut self) {
        let tx = self.tx.clone();
        let on_utterance = Box::new(move |text: String| {
            let _ = tx.send(Message::Utterance(text));
        });

        if let Err(e) = self.speech.start_listening(on_utterance) {
            tracing::warn!(error = %e, "speech capture unavailable");
        }

        let awaiting = !self.session.has_user_turn() && self.session.user_name().is_empty();
        self.session.set_state(if awaiting {
            SessionState::AwaitingName
        } else {
            SessionState::Listening
        });
    }

    fn arm_idle(&mut self) {
        // Past the clock's range means the session never idles out
        self.idle_deadline = Instant::now().checked_add(self.settings.idle_timeout);
    }

    fn abort_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
            tracing::debug!(seq = pending.seq, "in-flight resolution abandoned");
        }
    }

    fn load_name(&self) -> Option<String> {
        match self.names.load() {
            Ok(name) => name.filter(|n| !n.trim().is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load user name");
                None
            }
        }
    }

    fn listener_name(&self) -> String {
        let name = self.session.user_name();
        if name.is_empty() {
            GENERIC_LISTENER.to_string()
        } else {
            name.to_string()
        }
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot::of(&self.session);
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// Sleep until `at`, or forever when unset
fn deadline(at: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match at {
            Some(at) => sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}
