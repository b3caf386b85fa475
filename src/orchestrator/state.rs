//! Session state owned by the orchestrator and the snapshot it publishes.

use serde::Serialize;

use crate::error::ErrorInfo;
use crate::history::{ConversationEntry, ConversationHistory};

/// Orchestrator phases. Exactly one is current, which is what keeps
/// capturing, resolving and speaking mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Listening,
    Resolving,
    Speaking,
    /// A failure is being reported. Always followed by `Idle`.
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Listening => write!(f, "listening"),
            Self::Resolving => write!(f, "resolving"),
            Self::Speaking => write!(f, "speaking"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub phase: Phase,
    pub transcript: String,
    pub last_response: String,
    pub last_error: Option<ErrorInfo>,
    /// Whether audio is actually coming out of the speaker.
    pub audio_playing: bool,
    pub history: ConversationHistory,
}

impl SessionState {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            transcript: self.transcript.clone(),
            last_response: self.last_response.clone(),
            last_error: self.last_error.clone(),
            history: self.history.entries().to_vec(),
            history_len: self.history.len(),
            audio_playing: self.audio_playing,
        }
    }

    /// Whether an unacknowledged error blocks new listening attempts.
    pub fn error_pending(&self) -> bool {
        self.last_error.as_ref().is_some_and(|e| e.blocking)
    }

    pub(crate) fn reset_turn(&mut self) {
        self.transcript.clear();
        self.last_response.clear();
        self.last_error = None;
    }
}

/// Read-only view for the presentation layer, republished on every transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub transcript: String,
    pub last_response: String,
    pub last_error: Option<ErrorInfo>,
    pub history: Vec<ConversationEntry>,
    pub history_len: usize,
    pub audio_playing: bool,
}

impl SessionSnapshot {
    pub fn is_listening(&self) -> bool {
        self.phase == Phase::Listening
    }

    pub fn is_resolving(&self) -> bool {
        self.phase == Phase::Resolving
    }

    pub fn is_speaking(&self) -> bool {
        self.phase == Phase::Speaking
    }
}
