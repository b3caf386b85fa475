//! Error taxonomy for the voice core.
//!
//! Every collaborator failure is recoverable. The orchestrator translates
//! these into an [`ErrorInfo`] on the session state instead of propagating
//! them to the presentation layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories reported by the speech recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureErrorKind {
    Unsupported,
    PermissionDenied,
    NoMatch,
    Network,
    Aborted,
}

impl CaptureErrorKind {
    /// Kinds the user has to act on before listening again.
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Unsupported | Self::PermissionDenied)
    }
}

impl std::fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported => write!(f, "unsupported"),
            Self::PermissionDenied => write!(f, "permission-denied"),
            Self::NoMatch => write!(f, "no-match"),
            Self::Network => write!(f, "network"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("speech capture failed ({kind}): {message}")]
pub struct CaptureError {
    pub kind: CaptureErrorKind,
    pub message: String,
}

impl CaptureError {
    pub fn new(kind: CaptureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<CaptureErrorKind> for CaptureError {
    fn from(kind: CaptureErrorKind) -> Self {
        let message = match kind {
            CaptureErrorKind::Unsupported => "speech recognition is not supported",
            CaptureErrorKind::PermissionDenied => "microphone permission denied",
            CaptureErrorKind::NoMatch => "no speech was recognized",
            CaptureErrorKind::Network => "speech recognition network failure",
            CaptureErrorKind::Aborted => "speech recognition aborted",
        };
        Self::new(kind, message)
    }
}

/// Response-generation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("response service is not configured")]
    NotConfigured,
    #[error("response service error {status}: {message}")]
    Status { status: u16, message: String },
    #[error("response service unreachable: {0}")]
    Network(String),
    #[error("malformed reply from response service: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("speech synthesis is not configured")]
    Unavailable,
    #[error("no text provided for synthesis")]
    EmptyText,
    #[error("speech synthesis error {status}: {message}")]
    Status { status: u16, message: String },
    #[error("speech synthesis request failed: {0}")]
    Request(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("failed to open audio output: {0}")]
    Device(String),
    #[error("audio playback failed: {0}")]
    Failed(String),
}

/// Outcome of a failed `PlaybackCoordinator::speak` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeakError {
    #[error("playback already in progress")]
    Busy,
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Why a presentation command was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejected {
    #[error("orchestrator is busy")]
    Busy,
    #[error("not listening")]
    NotListening,
    #[error("speech capture is unavailable")]
    CaptureUnavailable,
    #[error("an error must be acknowledged first")]
    ErrorPending,
    #[error("nothing to repeat")]
    NothingToRepeat,
    #[error("orchestrator has shut down")]
    Closed,
}

/// Which collaborator a reported error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Capture,
    Provider,
    Synthesis,
    Playback,
    Internal,
}

/// Presentation-facing error description stored in the session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    /// Set when `start_listening` stays rejected until acknowledged.
    pub blocking: bool,
}

impl ErrorInfo {
    pub fn notice(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            blocking: false,
        }
    }
}

impl From<&CaptureError> for ErrorInfo {
    fn from(err: &CaptureError) -> Self {
        Self {
            kind: ErrorKind::Capture,
            message: format!("Speech error: {}", err.kind),
            blocking: err.kind.is_blocking(),
        }
    }
}

impl From<&ProviderError> for ErrorInfo {
    fn from(err: &ProviderError) -> Self {
        Self::notice(
            ErrorKind::Provider,
            format!("Using fallback response ({})", err),
        )
    }
}

impl From<&SpeakError> for ErrorInfo {
    fn from(err: &SpeakError) -> Self {
        let kind = match err {
            SpeakError::Synthesis(_) => ErrorKind::Synthesis,
            SpeakError::Playback(_) | SpeakError::Busy => ErrorKind::Playback,
        };
        Self::notice(kind, format!("Reply not spoken: {}", err))
    }
}
