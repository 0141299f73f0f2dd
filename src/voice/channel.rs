//! Speech channel: continuous listening built from single-shot captures
//!
//! The channel owns the only live capture engine. Every engine instance is
//! tagged with an id, and events from any instance other than the current
//! one are dropped, so an aborted engine can never reactivate capture.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::engine::{
    CaptureBackend, CaptureEngine, CaptureOptions, EngineEvent, EngineEventKind, EngineEventSink,
    RecognitionErrorKind, SpeechRequest, Synthesizer, Voice,
};
use crate::{Error, Result};

/// Voices tried in order before falling back to any voice in the target language
pub const DEFAULT_PREFERRED_VOICES: &[&str] = &[
    "Google UK English Female",
    "Microsoft Libby Online (Natural)",
    "Microsoft David Online (Natural)",
    "Samantha",
    "Alex",
];

/// Lifecycle of the capture side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No engine is capturing
    Idle,
    /// Capture requested, engine not yet live
    Starting,
    /// Engine is live
    Listening,
}

/// Callback invoked once per recognized utterance
pub type UtteranceCallback = Box<dyn FnMut(String) + Send>;

struct ActiveEngine {
    id: u64,
    engine: Box<dyn CaptureEngine>,
}

/// Owns capture and synthesis for a single conversation
pub struct SpeechChannel {
    backend: Arc<dyn CaptureBackend>,
    synthesizer: Box<dyn Synthesizer>,
    options: CaptureOptions,
    preferred_voices: Vec<String>,
    state: ChannelState,
    stopped: bool,
    active: Option<ActiveEngine>,
    next_engine_id: u64,
    on_utterance: Option<UtteranceCallback>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl SpeechChannel {
    /// Create an idle channel
    #[must_use]
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        synthesizer: Box<dyn Synthesizer>,
        lang: impl Into<String>,
        preferred_voices: Vec<String>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            synthesizer,
            options: CaptureOptions::single_shot(lang),
            preferred_voices,
            state: ChannelState::Idle,
            stopped: false,
            active: None,
            next_engine_id: 1,
            on_utterance: None,
            events_tx,
            events_rx,
        }
    }

    /// Current capture state
    #[must_use]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether capture was explicitly stopped
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Id of the current engine instance, if any
    #[must_use]
    pub fn active_engine_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Begin listening, reporting each utterance to `on_utterance`
    ///
    /// A no-op while already starting or listening.
    ///
    /// # Errors
    ///
    /// Returns error if no engine can be allocated or armed; the channel is
    /// left idle.
    pub fn start_listening(&mut self, on_utterance: UtteranceCallback) -> Result<()> {
        if matches!(self.state, ChannelState::Starting | ChannelState::Listening) {
            tracing::warn!(state = ?self.state, "start requested while capture already active");
            return Ok(());
        }

        self.release_engine();
        self.on_utterance = Some(on_utterance);

        let id = self.next_engine_id;
        self.next_engine_id += 1;

        let sink = EngineEventSink::new(id, self.events_tx.clone());
        let mut engine = self.backend.create(&self.options, sink)?;
        engine.start()?;

        self.active = Some(ActiveEngine { id, engine });
        self.stopped = false;
        self.state = ChannelState::Starting;

        tracing::debug!(engine_id = id, lang = %self.options.lang, "capture starting");
        Ok(())
    }

    /// Stop listening and abandon the current engine
    pub fn stop_listening(&mut self) {
        self.stopped = true;
        self.state = ChannelState::Idle;
        self.release_engine();
        tracing::debug!("capture stopped");
    }

    /// Speak `text`, interrupting anything already being spoken
    ///
    /// # Errors
    ///
    /// Returns error if synthesis is unavailable
    pub fn speak(&mut self, text: &str) -> Result<()> {
        self.synthesizer.cancel();

        let voices = self.synthesizer.voices();
        let voice = select_voice(&voices, &self.preferred_voices, &self.options.lang).cloned();

        tracing::debug!(text, voice = ?voice.as_ref().map(|v| &v.name), "speaking");

        self.synthesizer.speak(SpeechRequest {
            text: text.to_string(),
            voice,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        })
    }

    /// Wait for the next engine event
    ///
    /// Cancel-safe, so it can sit in a `select!` loop.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events_rx.recv().await
    }

    /// Apply every event already queued, returning how many were handled
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Apply an engine event to the channel state
    pub fn handle_event(&mut self, event: EngineEvent) {
        if self.active_engine_id() != Some(event.engine_id) {
            tracing::debug!(engine_id = event.engine_id, kind = ?event.kind, "ignoring stale engine event");
            return;
        }

        match event.kind {
            EngineEventKind::Started => {
                if self.state == ChannelState::Starting {
                    self.state = ChannelState::Listening;
                    tracing::trace!(engine_id = event.engine_id, "capture live");
                }
            }
            EngineEventKind::Result(transcript) => {
                if let Some(callback) = self.on_utterance.as_mut() {
                    callback(transcript);
                }
            }
            EngineEventKind::Ended => self.capture_finished(),
            EngineEventKind::Errored(RecognitionErrorKind::NoSpeech) => {
                tracing::debug!("no speech detected");
                self.capture_finished();
            }
            EngineEventKind::Errored(reason) => {
                let err = Error::Recognition(reason.to_string());
                tracing::warn!(error = %err, "capture failed, going idle");
                self.state = ChannelState::Idle;
                self.release_engine();
            }
        }
    }

    /// Restart after a finished capture, or go idle
    fn capture_finished(&mut self) {
        if self.state == ChannelState::Listening && !self.stopped {
            self.state = ChannelState::Starting;
            let restarted = self.active.as_mut().map(|a| a.engine.start());
            match restarted {
                Some(Ok(())) => tracing::trace!("capture restarted"),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "capture restart failed");
                    self.state = ChannelState::Idle;
                    self.release_engine();
                }
                None => self.state = ChannelState::Idle,
            }
        } else {
            self.state = ChannelState::Idle;
            self.release_engine();
        }
    }

    fn release_engine(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.engine.abort();
            tracing::trace!(engine_id = active.id, "engine released");
        }
    }
}

impl Drop for SpeechChannel {
    fn drop(&mut self) {
        self.release_engine();
    }
}

/// Pick a synthesis voice
///
/// Preferred names win in order; otherwise the first voice whose locale
/// matches the primary language of `lang`; otherwise the engine default.
#[must_use]
pub fn select_voice<'a>(voices: &'a [Voice], preferred: &[String], lang: &str) -> Option<&'a Voice> {
    preferred
        .iter()
        .find_map(|name| voices.iter().find(|v| &v.name == name))
        .or_else(|| {
            let primary = lang
                .split(['-', '_'])
                .next()
                .unwrap_or(lang)
                .to_lowercase();
            voices.iter().find(|v| {
                let voice_lang = v.lang.to_lowercase();
                voice_lang == primary
                    || voice_lang.starts_with(&format!("{primary}-"))
                    || voice_lang.starts_with(&format!("{primary}_"))
            })
        })
}
