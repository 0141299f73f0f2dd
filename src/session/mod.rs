//! Conversation sessions
//!
//! - [`SessionController`]: the state machine driving a spoken conversation
//! - [`NameStore`]: where the user's name survives between conversations
//! - [`classify`]: pattern tables for end commands and first-turn intent

pub mod classify;
mod controller;
mod state;
mod store;

pub use classify::{FirstTurn, classify_first_turn, is_end_command, is_question};
pub use controller::{
    FAREWELL, PROVIDER_APOLOGY, SessionController, SessionHandle, SessionSettings, SessionSnapshot,
};
pub use state::{ConversationSession, SessionState, Speaker, Utterance};
pub use store::{MemoryNameStore, NameStore, SqliteNameStore, USER_NAME_KEY};
