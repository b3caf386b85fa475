//! IPC protocol types for communication with the host process.
//!
//! Events use `{"event": "<name>", "data": {...}}` format (Rust -> host).
//! Commands use `{"command": "<name>", ...}` format (host -> Rust).

pub mod bridge;

use serde::{Deserialize, Serialize};

use crate::error::{CaptureErrorKind, Rejected};
use crate::orchestrator::SessionSnapshot;

// ---------------------------------------------------------------------------
// Events: Rust -> host (stdout)
// ---------------------------------------------------------------------------

/// All events emitted to the host via stdout as JSON lines.
///
/// Serialized as `{"event": "<variant>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum VoiceEvent {
    Starting {},
    Ready {
        name: String,
        #[serde(rename = "providerConfigured")]
        provider_configured: bool,
    },
    /// Full session snapshot, sent after every transition.
    State { snapshot: SessionSnapshot },
    /// Ask the host recognizer to begin a capture attempt.
    CaptureStart { attempt: u64 },
    /// Ask the host recognizer to abandon a capture attempt.
    CaptureStop { attempt: u64 },
    Rejected { command: String, reason: Rejected },
    Error { message: String },
    Pong {},
    Stopping {},
}

// ---------------------------------------------------------------------------
// Commands: host -> Rust (stdin)
// ---------------------------------------------------------------------------

/// All commands received from the host via stdin as JSON lines.
///
/// Deserialized from `{"command": "<variant>", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum VoiceCommand {
    StartListening {},
    StopListening {},
    Clear {},
    RepeatLast {},
    AcknowledgeError {},
    CaptureAvailable { available: bool },
    CaptureResult { attempt: u64, text: String },
    CaptureEnd { attempt: u64 },
    CaptureError { attempt: u64, kind: CaptureErrorKind },
    Ping {},
    Shutdown {},
}

impl VoiceCommand {
    /// Wire name, used in `rejected` events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartListening {} => "start_listening",
            Self::StopListening {} => "stop_listening",
            Self::Clear {} => "clear",
            Self::RepeatLast {} => "repeat_last",
            Self::AcknowledgeError {} => "acknowledge_error",
            Self::CaptureAvailable { .. } => "capture_available",
            Self::CaptureResult { .. } => "capture_result",
            Self::CaptureEnd { .. } => "capture_end",
            Self::CaptureError { .. } => "capture_error",
            Self::Ping {} => "ping",
            Self::Shutdown {} => "shutdown",
        }
    }
}
