//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::JoinHandle;

use r3_assistant::knowledge::{Dataset, KnowledgeEntry, TopicRecord, TopicTable};
use r3_assistant::provider::{CompletionProvider, GenerateRequest, ModelInfo};
use r3_assistant::voice::{
    CaptureBackend, CaptureEngine, CaptureOptions, EngineEventSink, RecognitionErrorKind,
    SpeechRequest, Synthesizer, Voice,
};
use r3_assistant::{
    Error, NameStore, ResolverConfig, ResponseResolver, Result, SessionController, SessionHandle,
    SessionSettings, SessionSnapshot, SpeechChannel,
};

// ---------------------------------------------------------------------------
// Completion provider
// ---------------------------------------------------------------------------

/// Canned outcome of one generation call
pub enum Reply {
    Text(String),
    Status(u16),
    Unreachable,
}

/// Completion provider answering from a script
///
/// Queued replies are used first; after that every call gets the fallback.
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Reply>,
    models: Mutex<Option<Vec<ModelInfo>>>,
    delay: Mutex<Duration>,
    requests: Mutex<Vec<GenerateRequest>>,
    inventory_calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Every call answers `text`
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self::new(Reply::Text(text.to_string())))
    }

    /// Every call fails as if the server were down
    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self::new(Reply::Unreachable))
    }

    fn new(fallback: Reply) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            models: Mutex::new(Some(vec![model("llama3:latest")])),
            delay: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
            inventory_calls: AtomicUsize::new(0),
        }
    }

    /// Queue a one-off reply ahead of the fallback
    pub fn push(&self, reply: Reply) -> &Self {
        self.queue.lock().unwrap().push_back(reply);
        self
    }

    /// Replace the installed model list
    pub fn set_models(&self, names: &[&str]) -> &Self {
        *self.models.lock().unwrap() = Some(names.iter().map(|n| model(n)).collect());
        self
    }

    /// Make the inventory call fail
    pub fn fail_inventory(&self) -> &Self {
        *self.models.lock().unwrap() = None;
        self
    }

    /// Delay every generation call
    pub fn set_delay(&self, delay: Duration) -> &Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn generate_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn inventory_calls(&self) -> usize {
        self.inventory_calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Result<String> {
        let queued = self.queue.lock().unwrap().pop_front();
        let reply = match queued {
            Some(reply) => reply,
            None => match &*self.fallback.lock().unwrap() {
                Reply::Text(text) => Reply::Text(text.clone()),
                Reply::Status(status) => Reply::Status(*status),
                Reply::Unreachable => Reply::Unreachable,
            },
        };

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Status(status) => Err(Error::Provider {
                status,
                body: "scripted failure".to_string(),
            }),
            Reply::Unreachable => Err(Error::ProviderUnreachable(
                "connection refused".to_string(),
            )),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.next_reply()
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.inventory_calls.fetch_add(1, Ordering::SeqCst);
        self.models
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::ProviderUnreachable("connection refused".to_string()))
    }

    async fn create_model(&self, _name: &str, _modelfile: &str) -> Result<Vec<String>> {
        Ok(vec!["success".to_string()])
    }
}

pub fn model(name: &str) -> ModelInfo {
    ModelInfo {
        name: name.to_string(),
        size: None,
        modified_at: None,
    }
}

// ---------------------------------------------------------------------------
// Capture engine
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BackendState {
    sinks: Vec<EngineEventSink>,
    starts: Vec<u64>,
    aborts: Vec<u64>,
    unsupported: bool,
}

/// Capture backend driven by the test
///
/// Engines report `started` as soon as they are armed; everything else is
/// emitted explicitly through the helpers.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<BackendState>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose engines can never be created
    pub fn unsupported() -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().unsupported = true;
        backend
    }

    /// Number of engine instances created so far
    pub fn engines_created(&self) -> usize {
        self.state.lock().unwrap().sinks.len()
    }

    /// Engine ids in the order they were armed (restarts included)
    pub fn starts(&self) -> Vec<u64> {
        self.state.lock().unwrap().starts.clone()
    }

    /// Engine ids in the order they were aborted
    pub fn aborts(&self) -> Vec<u64> {
        self.state.lock().unwrap().aborts.clone()
    }

    /// Sink of the most recently created engine
    pub fn latest(&self) -> EngineEventSink {
        self.state
            .lock()
            .unwrap()
            .sinks
            .last()
            .cloned()
            .expect("no capture engine created yet")
    }

    /// Sink of a specific engine
    pub fn sink(&self, engine_id: u64) -> EngineEventSink {
        self.state
            .lock()
            .unwrap()
            .sinks
            .iter()
            .find(|s| s.engine_id() == engine_id)
            .cloned()
            .expect("unknown engine id")
    }

    /// Recognize `text` on the latest engine and end the capture
    pub fn say(&self, text: &str) {
        let sink = self.latest();
        sink.result(text);
        sink.ended();
    }

    /// Report silence on the latest engine
    pub fn no_speech(&self) {
        self.latest().errored(RecognitionErrorKind::NoSpeech);
    }
}

impl CaptureBackend for ScriptedBackend {
    fn create(
        &self,
        _options: &CaptureOptions,
        events: EngineEventSink,
    ) -> Result<Box<dyn CaptureEngine>> {
        let mut state = self.state.lock().unwrap();
        if state.unsupported {
            return Err(Error::SpeechUnsupported("no microphone".to_string()));
        }
        state.sinks.push(events.clone());

        Ok(Box::new(ScriptedEngine {
            events,
            state: Arc::clone(&self.state),
        }))
    }
}

struct ScriptedEngine {
    events: EngineEventSink,
    state: Arc<Mutex<BackendState>>,
}

impl CaptureEngine for ScriptedEngine {
    fn start(&mut self) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .starts
            .push(self.events.engine_id());
        self.events.started();
        Ok(())
    }

    fn abort(&mut self) {
        self.state
            .lock()
            .unwrap()
            .aborts
            .push(self.events.engine_id());
    }
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

/// Synthesizer that records what it was asked to say
#[derive(Clone)]
pub struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<SpeechRequest>>>,
    cancels: Arc<AtomicUsize>,
    voices: Vec<Voice>,
    unsupported: bool,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::with_voices(vec![
            Voice::new("Daniel", "en-GB"),
            Voice::new("Samantha", "en-US"),
        ])
    }

    pub fn with_voices(voices: Vec<Voice>) -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
            cancels: Arc::new(AtomicUsize::new(0)),
            voices,
            unsupported: false,
        }
    }

    /// Synthesizer that refuses to speak
    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::new()
        }
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.text).collect()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl Synthesizer for RecordingSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn cancel(&mut self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn speak(&mut self, request: SpeechRequest) -> Result<()> {
        if self.unsupported {
            return Err(Error::SpeechUnsupported("no speech synthesis".to_string()));
        }
        self.spoken.lock().unwrap().push(request);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Knowledge and session wiring
// ---------------------------------------------------------------------------

pub fn entry(keywords: &[&str], responses: &[&str]) -> KnowledgeEntry {
    KnowledgeEntry {
        keywords: keywords.iter().map(ToString::to_string).collect(),
        responses: responses.iter().map(ToString::to_string).collect(),
    }
}

pub fn topic(key: &str, subtopics: &[(&str, &str)]) -> TopicRecord {
    TopicRecord {
        topic: key.to_string(),
        subtopics: subtopics
            .iter()
            .map(|(name, text)| ((*name).to_string(), (*text).to_string()))
            .collect(),
    }
}

/// Small knowledge base: one dataset entry, one topic
pub fn sample_knowledge() -> (Dataset, TopicTable) {
    let dataset = Dataset::new(vec![entry(
        &["key room", "kagi"],
        &[
            "The Key Room holds every door.",
            "Kagi keeps the keys.",
            "Each key opens one world.",
            "Only the worthy find it.",
        ],
    )])
    .unwrap();

    let topics = TopicTable::new(vec![topic(
        "spiral",
        &[
            ("shape", "The Spiral winds through every universe."),
            ("origin", "Nobody knows who drew it first."),
        ],
    )]);

    (dataset, topics)
}

pub fn resolver(provider: Arc<ScriptedProvider>) -> ResponseResolver {
    let (dataset, topics) = sample_knowledge();
    ResponseResolver::with_rng(
        provider,
        Arc::new(dataset),
        Arc::new(topics),
        ResolverConfig::default(),
        StdRng::seed_from_u64(7),
    )
}

/// A running controller plus the fakes around it
pub struct Harness {
    pub handle: SessionHandle,
    pub backend: ScriptedBackend,
    pub synth: RecordingSynthesizer,
    pub provider: Arc<ScriptedProvider>,
    pub task: JoinHandle<()>,
}

impl Harness {
    pub fn spawn(provider: Arc<ScriptedProvider>, names: Arc<dyn NameStore>) -> Self {
        Self::spawn_with(provider, names, SessionSettings::default())
    }

    pub fn spawn_with(
        provider: Arc<ScriptedProvider>,
        names: Arc<dyn NameStore>,
        settings: SessionSettings,
    ) -> Self {
        let backend = ScriptedBackend::new();
        let synth = RecordingSynthesizer::new();
        let speech = SpeechChannel::new(
            Arc::new(backend.clone()),
            Box::new(synth.clone()),
            "en-US",
            vec!["Samantha".to_string()],
        );

        let resolver = Arc::new(resolver(Arc::clone(&provider)));
        let (controller, handle) = SessionController::new(speech, resolver, names, settings);
        let task = tokio::spawn(controller.run());

        Self {
            handle,
            backend,
            synth,
            provider,
            task,
        }
    }

    /// Wait until the session satisfies `predicate`
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = self.handle.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(600), rx.wait_for(predicate))
            .await
            .expect("timed out waiting for session")
            .expect("controller stopped");
        SessionSnapshot::clone(&snapshot)
    }

    pub async fn shutdown(self) {
        self.handle.shutdown();
        self.task.await.unwrap();
    }
}
