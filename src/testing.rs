//! Deterministic collaborator fakes for unit tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::capture::{CaptureSink, SpeechCapture};
use crate::error::{CaptureError, PlaybackError, ProviderError, SynthesisError};
use crate::playback::{AudioOutput, SpeechSynthesizer, SynthesizedAudio, VoiceParams};
use crate::resolver::{ChatTurn, ResponseGenerator};

pub type Calls = Arc<Mutex<Vec<(String, Vec<ChatTurn>)>>>;

// ---------------------------------------------------------------------------
// Response generator
// ---------------------------------------------------------------------------

enum Behavior {
    Reply(String),
    Fail(ProviderError),
    Panic,
}

pub struct FakeGenerator {
    available: Arc<AtomicBool>,
    behavior: Behavior,
    calls: Calls,
}

impl FakeGenerator {
    fn with(available: bool, behavior: Behavior) -> Self {
        Self {
            available: Arc::new(AtomicBool::new(available)),
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unavailable() -> Self {
        Self::with(false, Behavior::Fail(ProviderError::NotConfigured))
    }

    pub fn replying(text: &str) -> Self {
        Self::with(true, Behavior::Reply(text.to_string()))
    }

    pub fn failing(err: ProviderError) -> Self {
        Self::with(true, Behavior::Fail(err))
    }

    pub fn panicking() -> Self {
        Self::with(true, Behavior::Panic)
    }

    pub fn calls(&self) -> Calls {
        Arc::clone(&self.calls)
    }

    /// Switch that stays with the test after the generator is boxed.
    pub fn availability(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.available)
    }
}

impl ResponseGenerator for FakeGenerator {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn generate(
        &self,
        system_prompt: &str,
        turns: Vec<ChatTurn>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + '_>> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), turns));
        Box::pin(async move {
            match &self.behavior {
                Behavior::Reply(text) => Ok(text.clone()),
                Behavior::Fail(err) => Err(err.clone()),
                Behavior::Panic => panic!("fake generator panicked"),
            }
        })
    }

    fn name(&self) -> String {
        "Fake".to_string()
    }
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

pub struct FakeSynthesizer {
    available: Arc<AtomicBool>,
    failure: Option<SynthesisError>,
    gate: Option<Arc<Notify>>,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self {
            available: Arc::new(AtomicBool::new(true)),
            failure: None,
            gate: None,
            spoken: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unavailable() -> Self {
        let synth = Self::new();
        synth.available.store(false, Ordering::SeqCst);
        synth
    }

    /// Synthesis blocks until the gate is notified.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::new()
        }
    }

    pub fn gate(&self) -> Arc<Notify> {
        self.gate.clone().unwrap_or_else(|| Arc::new(Notify::new()))
    }

    pub fn availability(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.available)
    }

    pub fn failing(err: SynthesisError) -> Self {
        Self {
            failure: Some(err),
            ..Self::new()
        }
    }

    /// Texts synthesized so far.
    pub fn spoken(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.spoken)
    }
}

impl SpeechSynthesizer for FakeSynthesizer {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn synthesize(
        &self,
        text: &str,
        _voice: &VoiceParams,
    ) -> Pin<Box<dyn Future<Output = Result<SynthesizedAudio, SynthesisError>> + Send + '_>> {
        self.spoken.lock().unwrap().push(text.to_string());
        let result = match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(SynthesizedAudio {
                samples: vec![0.0; 240],
                sample_rate: 24_000,
            }),
        };
        let gate = self.gate.clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            result
        })
    }

    fn name(&self) -> String {
        "Fake TTS".to_string()
    }
}

// ---------------------------------------------------------------------------
// Audio output
// ---------------------------------------------------------------------------

pub struct FakeOutput {
    failure: Option<PlaybackError>,
    panic_once: AtomicBool,
    gate: Option<Arc<Notify>>,
    played: Arc<Mutex<Vec<SynthesizedAudio>>>,
    stopped: Arc<AtomicBool>,
}

impl FakeOutput {
    pub fn new() -> Self {
        Self {
            failure: None,
            panic_once: AtomicBool::new(false),
            gate: None,
            played: Arc::new(Mutex::new(Vec::new())),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing(err: PlaybackError) -> Self {
        Self {
            failure: Some(err),
            ..Self::new()
        }
    }

    /// The first `play` panics; later ones succeed.
    pub fn panicking_once() -> Self {
        Self {
            panic_once: AtomicBool::new(true),
            ..Self::new()
        }
    }

    /// Playback blocks until the gate is notified (or `stop` is called).
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::new()
        }
    }

    pub fn gate(&self) -> Arc<Notify> {
        self.gate.clone().unwrap_or_else(|| Arc::new(Notify::new()))
    }

    pub fn played(&self) -> Arc<Mutex<Vec<SynthesizedAudio>>> {
        Arc::clone(&self.played)
    }

    /// Whether a stop is pending for the current utterance.
    pub fn stopped(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

impl AudioOutput for FakeOutput {
    fn play(
        &self,
        audio: SynthesizedAudio,
    ) -> Pin<Box<dyn Future<Output = Result<(), PlaybackError>> + Send + '_>> {
        Box::pin(async move {
            if self.panic_once.swap(false, Ordering::SeqCst) {
                panic!("fake output panicked");
            }
            if self.stopped.load(Ordering::SeqCst) {
                return Ok(());
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            self.played.lock().unwrap().push(audio);
            Ok(())
        })
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    fn prepare(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Speech capture
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CaptureShared {
    unavailable: AtomicBool,
    start_error: Mutex<Option<CaptureError>>,
    sinks: Mutex<Vec<CaptureSink>>,
    stops: AtomicUsize,
}

/// Fake recognizer. Clones share state, so a test keeps one clone to drive
/// callbacks while the orchestrator owns another.
#[derive(Clone, Default)]
pub struct FakeCapture {
    shared: Arc<CaptureShared>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.shared.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn fail_next_start(&self, err: CaptureError) {
        *self.shared.start_error.lock().unwrap() = Some(err);
    }

    /// Sink handed over by the most recent successful `start`.
    pub fn last_sink(&self) -> CaptureSink {
        self.shared
            .sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("capture was never started")
    }

    pub fn starts(&self) -> usize {
        self.shared.sinks.lock().unwrap().len()
    }

    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }
}

impl SpeechCapture for FakeCapture {
    fn is_available(&self) -> bool {
        !self.shared.unavailable.load(Ordering::SeqCst)
    }

    fn start(&mut self, sink: CaptureSink) -> Result<(), CaptureError> {
        if let Some(err) = self.shared.start_error.lock().unwrap().take() {
            return Err(err);
        }
        self.shared.sinks.lock().unwrap().push(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
    }
}
