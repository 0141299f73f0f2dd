//! R3 - spoken-dialogue assistant
//!
//! This library provides the pieces of a voice conversation loop:
//! - Speech capture and synthesis behind a race-free channel
//! - Tiered reply resolution over local knowledge and an Ollama-compatible model
//! - A session state machine with greeting, naming, idle timeout and farewell
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 SessionController                    │
//! │   greeting │ naming │ idle clock │ farewell/reset   │
//! └──────────┬──────────────────────────────┬───────────┘
//!            │                              │
//! ┌──────────▼──────────┐      ┌────────────▼───────────┐
//! │    SpeechChannel    │      │    ResponseResolver    │
//! │  capture │ synth    │      │ model │ dataset │ topic │
//! └─────────────────────┘      └────────────┬───────────┘
//!                                           │
//!                              ┌────────────▼───────────┐
//!                              │  Completion provider   │
//!                              └────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod knowledge;
pub mod provider;
pub mod resolver;
pub mod session;
pub mod text;
pub mod voice;

pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use knowledge::{Dataset, KnowledgeEntry, TopicRecord, TopicTable};
pub use provider::{CompletionProvider, OllamaClient};
pub use resolver::{Resolution, ResolverConfig, ResponseResolver, ResponseSource};
pub use session::{
    ConversationSession, MemoryNameStore, NameStore, SessionController, SessionHandle,
    SessionSettings, SessionSnapshot, SessionState, SqliteNameStore, Utterance,
};
pub use text::{normalize_input, normalize_output};
pub use voice::SpeechChannel;
