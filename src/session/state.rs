//! Session data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resolver::ResponseSource;

/// Conversation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Greeting,
    AwaitingName,
    Listening,
    Thinking,
    Speaking,
    Ending,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Greeting => "greeting",
            Self::AwaitingName => "awaiting_name",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
            Self::Ending => "ending",
        }
    }

    /// Whether the idle clock may tear the session down from this state
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Ending)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One transcript line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ResponseSource>,
}

impl Utterance {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            timestamp: Utc::now(),
            source: None,
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>, source: Option<ResponseSource>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
            source,
        }
    }
}

/// The live conversation
///
/// Replaced wholesale on reset; the transcript only grows while the
/// session lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    id: Uuid,
    user_name: String,
    state: SessionState,
    last_activity_at: DateTime<Utc>,
    transcript: Vec<Utterance>,
    started: bool,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            user_name: String::new(),
            state: SessionState::Idle,
            last_activity_at: Utc::now(),
            transcript: Vec::new(),
            started: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn set_user_name(&mut self, name: impl Into<String>) {
        self.user_name = name.into();
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(session = %self.id, from = %self.state, to = %state, "session state");
        }
        self.state = state;
    }

    #[must_use]
    pub const fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    #[must_use]
    pub fn transcript(&self) -> &[Utterance] {
        &self.transcript
    }

    pub fn push(&mut self, utterance: Utterance) {
        self.transcript.push(utterance);
    }

    /// Whether the greeting has been given
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    pub fn mark_started(&mut self) {
        self.started = true;
    }

    /// Whether the user has said anything substantive yet
    #[must_use]
    pub fn has_user_turn(&self) -> bool {
        self.transcript.iter().any(|u| u.speaker == Speaker::User)
    }
}
