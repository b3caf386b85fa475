//! Speech capture contract.
//!
//! The recognizer itself lives outside the core. A `SpeechCapture`
//! implementation starts and stops one capture attempt at a time and reports
//! back through the [`CaptureSink`] it was handed, which turns each callback
//! into an orchestrator event tagged with the attempt it belongs to.

pub mod ipc;

use tokio::sync::mpsc;

use crate::error::{CaptureError, CaptureErrorKind};
use crate::orchestrator::Event;

pub use ipc::{IpcCapture, IpcCaptureFeed};

/// Common trait for speech capture backends.
pub trait SpeechCapture: Send {
    /// Whether a recognizer is present at all. Polled before every attempt.
    fn is_available(&self) -> bool;

    /// Begin one capture attempt, reporting through `sink`.
    fn start(&mut self, sink: CaptureSink) -> Result<(), CaptureError>;

    /// Cancel or finalize the current attempt.
    fn stop(&mut self);
}

/// Recognizer callbacks as delivered to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Result(String),
    End,
    Error(CaptureErrorKind),
}

/// Callback handle for one capture attempt.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    attempt: u64,
    tx: mpsc::UnboundedSender<Event>,
}

impl CaptureSink {
    pub(crate) fn new(attempt: u64, tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn on_result(&self, text: impl Into<String>) {
        self.send(CaptureEvent::Result(text.into()));
    }

    pub fn on_end(&self) {
        self.send(CaptureEvent::End);
    }

    pub fn on_error(&self, kind: CaptureErrorKind) {
        self.send(CaptureEvent::Error(kind));
    }

    fn send(&self, event: CaptureEvent) {
        // The orchestrator may already be gone during shutdown.
        let _ = self.tx.send(Event::Capture {
            attempt: self.attempt,
            event,
        });
    }
}
