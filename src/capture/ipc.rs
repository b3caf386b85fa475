//! Speech capture delegated to the host process.
//!
//! The host owns the platform recognizer. `IpcCapture` asks it to start or
//! stop via `capture_start` / `capture_stop` events; the host answers with
//! `capture_result` / `capture_end` / `capture_error` commands, which the
//! main loop hands to [`IpcCaptureFeed::deliver`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use super::{CaptureEvent, CaptureSink, SpeechCapture};
use crate::error::{CaptureError, CaptureErrorKind};
use crate::ipc::VoiceEvent;

struct Shared {
    available: AtomicBool,
    current: Mutex<Option<CaptureSink>>,
}

pub struct IpcCapture {
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<VoiceEvent>,
}

/// Host-side entry point for recognizer callbacks.
#[derive(Clone)]
pub struct IpcCaptureFeed {
    shared: Arc<Shared>,
}

impl IpcCapture {
    /// `events` is the outbound channel to the host.
    pub fn new(available: bool, events: mpsc::UnboundedSender<VoiceEvent>) -> (Self, IpcCaptureFeed) {
        let shared = Arc::new(Shared {
            available: AtomicBool::new(available),
            current: Mutex::new(None),
        });
        let feed = IpcCaptureFeed {
            shared: Arc::clone(&shared),
        };
        (Self { shared, events }, feed)
    }
}

impl SpeechCapture for IpcCapture {
    fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::Acquire)
    }

    fn start(&mut self, sink: CaptureSink) -> Result<(), CaptureError> {
        if !self.is_available() {
            return Err(CaptureErrorKind::Unsupported.into());
        }
        let attempt = sink.attempt();
        self.events
            .send(VoiceEvent::CaptureStart { attempt })
            .map_err(|_| CaptureError::new(CaptureErrorKind::Aborted, "host channel closed"))?;
        *self.shared.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        let previous = self
            .shared
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sink) = previous {
            let _ = self.events.send(VoiceEvent::CaptureStop {
                attempt: sink.attempt(),
            });
        }
    }
}

impl IpcCaptureFeed {
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::Release);
    }

    /// Forward a host callback to the active attempt. Returns `false` when
    /// `attempt` is not the one in flight.
    pub fn deliver(&self, attempt: u64, event: CaptureEvent) -> bool {
        let mut current = self
            .shared
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sink = match current.as_ref() {
            Some(sink) if sink.attempt() == attempt => sink.clone(),
            _ => {
                debug!(attempt, ?event, "Dropping capture event for inactive attempt");
                return false;
            }
        };

        match event {
            CaptureEvent::Result(text) => sink.on_result(text),
            CaptureEvent::End => {
                *current = None;
                sink.on_end();
            }
            CaptureEvent::Error(kind) => {
                *current = None;
                sink.on_error(kind);
            }
        }
        true
    }
}
