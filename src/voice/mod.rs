//! Voice processing module
//!
//! Speech capture and synthesis are consumed through the traits in
//! [`engine`]; [`SpeechChannel`] turns single-shot captures into continuous
//! listening.

mod channel;
mod console;
pub mod engine;

pub use channel::{
    ChannelState, DEFAULT_PREFERRED_VOICES, SpeechChannel, UtteranceCallback, select_voice,
};
pub use console::{ConsoleBackend, ConsoleSynthesizer};
pub use engine::{
    CaptureBackend, CaptureEngine, CaptureOptions, EngineEvent, EngineEventKind, EngineEventSink,
    RecognitionErrorKind, SpeechRequest, Synthesizer, Voice,
};
