//! Terminal-backed speech engine
//!
//! Each armed capture consumes one line from stdin; synthesis prints the
//! reply. Lets the assistant run on hosts without audio hardware.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use super::engine::{
    CaptureBackend, CaptureEngine, CaptureOptions, EngineEventSink, RecognitionErrorKind,
    SpeechRequest, Synthesizer, Voice,
};
use crate::Result;

/// Lines typed by the user; `None` marks end of input
type LineReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Option<String>>>>;

/// Capture backend reading utterances from a line source
pub struct ConsoleBackend {
    lines: LineReceiver,
    closed: Arc<watch::Sender<bool>>,
}

impl ConsoleBackend {
    /// Read utterances from the process stdin
    #[must_use]
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(Some(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(None);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read stdin");
                        let _ = tx.send(None);
                        break;
                    }
                }
            }
        });

        Self::from_receiver(rx)
    }

    /// Read utterances from an arbitrary line source
    #[must_use]
    pub fn from_receiver(rx: mpsc::UnboundedReceiver<Option<String>>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(rx)),
            closed: Arc::new(watch::channel(false).0),
        }
    }

    /// Flips to `true` once a capture has consumed the end of input
    #[must_use]
    pub fn input_closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

impl CaptureBackend for ConsoleBackend {
    fn create(
        &self,
        options: &CaptureOptions,
        events: EngineEventSink,
    ) -> Result<Box<dyn CaptureEngine>> {
        tracing::trace!(engine_id = events.engine_id(), lang = %options.lang, "console engine created");
        Ok(Box::new(ConsoleEngine {
            lines: Arc::clone(&self.lines),
            closed: Arc::clone(&self.closed),
            events,
            task: None,
        }))
    }
}

/// One console capture instance
struct ConsoleEngine {
    lines: LineReceiver,
    closed: Arc<watch::Sender<bool>>,
    events: EngineEventSink,
    task: Option<JoinHandle<()>>,
}

impl CaptureEngine for ConsoleEngine {
    fn start(&mut self) -> Result<()> {
        // A previous capture has already reported its end
        self.abort();

        let lines = Arc::clone(&self.lines);
        let events = self.events.clone();
        let closed = Arc::clone(&self.closed);

        self.task = Some(tokio::spawn(async move {
            events.started();
            let next = lines.lock().await.recv().await;
            match next {
                Some(Some(line)) if line.trim().is_empty() => {
                    events.errored(RecognitionErrorKind::NoSpeech);
                }
                Some(Some(line)) => {
                    events.result(line);
                    events.ended();
                }
                Some(None) | None => {
                    tracing::debug!("console input closed");
                    closed.send_replace(true);
                    events.errored(RecognitionErrorKind::AudioCapture);
                }
            }
        }));

        Ok(())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ConsoleEngine {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Synthesizer that prints replies to stdout
pub struct ConsoleSynthesizer {
    speaker: String,
}

impl ConsoleSynthesizer {
    #[must_use]
    pub fn new(speaker: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
        }
    }
}

impl Synthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("Console", "en-US")]
    }

    fn cancel(&mut self) {}

    fn speak(&mut self, request: SpeechRequest) -> Result<()> {
        println!("{}: {}", self.speaker, request.text);
        Ok(())
    }
}
