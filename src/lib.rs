//! Jarvis voice assistant core.
//!
//! Sequences one voice turn at a time: capture an utterance, resolve a reply
//! (response service with a local fallback), speak it, and keep a bounded
//! conversation history. The binary in `main.rs` exposes this over JSON-line
//! IPC to a host process that owns the speech recognizer and the UI.

pub mod capture;
pub mod config;
pub mod error;
pub mod history;
pub mod ipc;
pub mod logging;
pub mod orchestrator;
pub mod playback;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use capture::{CaptureEvent, CaptureSink, IpcCapture, IpcCaptureFeed, SpeechCapture};
pub use history::{ConversationEntry, ConversationHistory};
pub use orchestrator::{
    Command, OrchestratorConfig, OrchestratorHandle, Phase, SessionSnapshot, VoiceOrchestrator,
};
pub use playback::PlaybackCoordinator;
pub use resolver::{ResponseGenerator, ResponseResolver};
