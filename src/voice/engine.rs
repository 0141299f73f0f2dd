//! Capture and synthesis collaborator interface
//!
//! A capture engine performs one single-shot recognition per `start` and
//! reports progress as [`EngineEvent`]s through the sink it was created
//! with. Synthesis is queued and fire-and-forget.

use tokio::sync::mpsc;

use crate::Result;

/// Reason reported with a recognition error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Nothing was said before the engine gave up
    NoSpeech,
    /// Capture was aborted
    Aborted,
    /// Audio input failed or ended
    AudioCapture,
    /// Microphone permission denied
    NotAllowed,
    /// Recognition backend could not be reached
    Network,
    /// Any other engine-specific reason
    Other(String),
}

impl RecognitionErrorKind {
    /// Parse an engine reason code
    #[must_use]
    pub fn parse(reason: &str) -> Self {
        match reason {
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "not-allowed" => Self::NotAllowed,
            "network" => Self::Network,
            other => Self::Other(other.to_string()),
        }
    }

    /// Reason code as reported by engines
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoSpeech => "no-speech",
            Self::Aborted => "aborted",
            Self::AudioCapture => "audio-capture",
            Self::NotAllowed => "not-allowed",
            Self::Network => "network",
            Self::Other(reason) => reason,
        }
    }
}

impl std::fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened inside a capture engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEventKind {
    /// Capture is live
    Started,
    /// A final transcript was produced
    Result(String),
    /// The single-shot capture finished
    Ended,
    /// The engine failed
    Errored(RecognitionErrorKind),
}

/// Event emitted by a specific engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    /// Instance that emitted the event
    pub engine_id: u64,
    /// Event payload
    pub kind: EngineEventKind,
}

/// Sending half handed to a capture engine at creation
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    engine_id: u64,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineEventSink {
    pub(crate) const fn new(engine_id: u64, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { engine_id, tx }
    }

    /// Instance this sink reports for
    #[must_use]
    pub const fn engine_id(&self) -> u64 {
        self.engine_id
    }

    pub fn started(&self) {
        self.send(EngineEventKind::Started);
    }

    pub fn result(&self, transcript: impl Into<String>) {
        self.send(EngineEventKind::Result(transcript.into()));
    }

    pub fn ended(&self) {
        self.send(EngineEventKind::Ended);
    }

    pub fn errored(&self, kind: RecognitionErrorKind) {
        self.send(EngineEventKind::Errored(kind));
    }

    fn send(&self, kind: EngineEventKind) {
        // Receiver gone means the channel was dropped; nothing left to notify
        let _ = self.tx.send(EngineEvent {
            engine_id: self.engine_id,
            kind,
        });
    }
}

/// Capture settings applied to each engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Recognition language (BCP 47, e.g. "en-US")
    pub lang: String,
    /// Keep capturing after the first result
    pub continuous: bool,
    /// Report partial transcripts
    pub interim_results: bool,
}

impl CaptureOptions {
    /// Single-shot, final-results-only capture in the given language
    #[must_use]
    pub fn single_shot(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            continuous: false,
            interim_results: false,
        }
    }
}

/// One live capture engine instance
pub trait CaptureEngine: Send {
    /// Arm a single-shot capture
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot begin capturing
    fn start(&mut self) -> Result<()>;

    /// Abort capture immediately
    fn abort(&mut self);
}

/// Factory for capture engine instances
pub trait CaptureBackend: Send + Sync {
    /// Allocate a new engine that reports through `events`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SpeechUnsupported`] if capture is unavailable
    fn create(
        &self,
        options: &CaptureOptions,
        events: EngineEventSink,
    ) -> Result<Box<dyn CaptureEngine>>;
}

/// A synthesis voice offered by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Display name (e.g. "Samantha")
    pub name: String,
    /// Locale (e.g. "en-US")
    pub lang: String,
}

impl Voice {
    #[must_use]
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// A queued synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    /// Text to speak
    pub text: String,
    /// Chosen voice; `None` uses the engine default
    pub voice: Option<Voice>,
    /// Speaking rate multiplier
    pub rate: f32,
    /// Pitch multiplier
    pub pitch: f32,
    /// Volume (0.0 to 1.0)
    pub volume: f32,
}

/// Text-to-speech side of the collaborator
pub trait Synthesizer: Send {
    /// Voices currently available
    fn voices(&self) -> Vec<Voice>;

    /// Cancel any in-progress or queued speech
    fn cancel(&mut self);

    /// Queue speech
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SpeechUnsupported`] if synthesis is unavailable
    fn speak(&mut self, request: SpeechRequest) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_round_trip() {
        for code in ["no-speech", "aborted", "audio-capture", "not-allowed", "network"] {
            assert_eq!(RecognitionErrorKind::parse(code).as_str(), code);
        }
        assert_eq!(
            RecognitionErrorKind::parse("language-not-supported"),
            RecognitionErrorKind::Other("language-not-supported".to_string())
        );
    }

    #[test]
    fn test_sink_tags_events_with_engine_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EngineEventSink::new(7, tx);

        sink.started();
        sink.result("hello");

        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent {
                engine_id: 7,
                kind: EngineEventKind::Started
            }
        );
        assert_eq!(
            rx.try_recv().unwrap().kind,
            EngineEventKind::Result("hello".to_string())
        );
    }
}
