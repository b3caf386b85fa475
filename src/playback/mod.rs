//! Speech synthesis and playback.
//!
//! `PlaybackCoordinator` combines a `SpeechSynthesizer` (text -> PCM) with an
//! `AudioOutput` (PCM -> speaker) behind a single-flight `speak` call that
//! reports when audio starts and stops.

pub mod openai;
pub mod output;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::error::{PlaybackError, SpeakError, SynthesisError};

pub use openai::OpenAiSpeech;
pub use output::RodioOutput;

/// Voice settings passed to the synthesizer on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    pub model: String,
    pub voice: String,
    /// Clamped to 0.25..=4.0 by the synthesizer.
    pub speed: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
        }
    }
}

/// Mono f32 PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Common trait for speech synthesizers (dyn-compatible).
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether the synthesizer is configured. Polled before every attempt.
    fn is_available(&self) -> bool;

    fn synthesize(
        &self,
        text: &str,
        voice: &VoiceParams,
    ) -> Pin<Box<dyn Future<Output = Result<SynthesizedAudio, SynthesisError>> + Send + '_>>;

    /// Display name (e.g. "OpenAI TTS (alloy)").
    fn name(&self) -> String;
}

/// Common trait for audio sinks (dyn-compatible).
pub trait AudioOutput: Send + Sync {
    /// Play `audio` to completion, or until [`stop`](Self::stop) is called.
    fn play(
        &self,
        audio: SynthesizedAudio,
    ) -> Pin<Box<dyn Future<Output = Result<(), PlaybackError>> + Send + '_>>;

    /// Interrupt the current playback. A stop issued before `play` makes the
    /// next `play` return immediately.
    fn stop(&self);

    /// Forget any earlier stop request. Called once per utterance, before
    /// synthesis starts.
    fn prepare(&self);
}

/// Releases the single-flight slot on every exit path, unwinding included.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Reports `false` exactly once if `true` was reported.
struct PlayingState<'a, F: FnMut(bool)> {
    on_state_change: &'a mut F,
    playing: bool,
}

impl<'a, F: FnMut(bool)> PlayingState<'a, F> {
    fn new(on_state_change: &'a mut F) -> Self {
        Self {
            on_state_change,
            playing: false,
        }
    }

    fn started(&mut self) {
        if !self.playing {
            self.playing = true;
            (self.on_state_change)(true);
        }
    }
}

impl<F: FnMut(bool)> Drop for PlayingState<'_, F> {
    fn drop(&mut self) {
        if self.playing {
            self.playing = false;
            (self.on_state_change)(false);
        }
    }
}

pub struct PlaybackCoordinator {
    synthesizer: Box<dyn SpeechSynthesizer>,
    output: Box<dyn AudioOutput>,
    voice: VoiceParams,
    in_flight: AtomicBool,
}

impl PlaybackCoordinator {
    pub fn new(
        synthesizer: Box<dyn SpeechSynthesizer>,
        output: Box<dyn AudioOutput>,
        voice: VoiceParams,
    ) -> Self {
        Self {
            synthesizer,
            output,
            voice,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn synthesis_available(&self) -> bool {
        self.synthesizer.is_available()
    }

    pub fn is_speaking(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Synthesize and play `text`. `on_state_change(true)` fires when audio
    /// starts; `on_state_change(false)` fires exactly once afterwards, whether
    /// playback ended, failed or was stopped.
    pub async fn speak<F>(&self, text: &str, mut on_state_change: F) -> Result<(), SpeakError>
    where
        F: FnMut(bool) + Send,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Speak requested while playback is in flight");
            return Err(SpeakError::Busy);
        }
        let _in_flight = InFlight(&self.in_flight);
        self.output.prepare();

        self.speak_inner(text, &mut on_state_change).await
    }

    async fn speak_inner<F>(&self, text: &str, on_state_change: &mut F) -> Result<(), SpeakError>
    where
        F: FnMut(bool) + Send,
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyText.into());
        }
        if !self.synthesizer.is_available() {
            return Err(SynthesisError::Unavailable.into());
        }

        debug!(engine = %self.synthesizer.name(), text_len = text.len(), "Synthesizing reply");
        let audio = self.synthesizer.synthesize(text, &self.voice).await?;

        let mut state = PlayingState::new(on_state_change);
        state.started();
        info!(
            samples = audio.samples.len(),
            sample_rate = audio.sample_rate,
            "Playback started"
        );
        self.output.play(audio).await?;
        info!("Playback finished");
        Ok(())
    }

    /// Interrupt the current utterance, if any. A stop during synthesis
    /// cancels the playback that would follow it.
    pub fn stop(&self) {
        if self.is_speaking() {
            self.output.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeOutput, FakeSynthesizer};
    use std::sync::{Arc, Mutex};

    fn coordinator(synth: FakeSynthesizer, output: FakeOutput) -> PlaybackCoordinator {
        PlaybackCoordinator::new(Box::new(synth), Box::new(output), VoiceParams::default())
    }

    fn recorder() -> (Arc<Mutex<Vec<bool>>>, impl FnMut(bool) + Send) {
        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&states);
        (states, move |playing| sink.lock().unwrap().push(playing))
    }

    #[tokio::test]
    async fn test_speak_reports_start_and_end_once() {
        let output = FakeOutput::new();
        let played = output.played();
        let playback = coordinator(FakeSynthesizer::new(), output);
        let (states, on_state) = recorder();

        playback.speak("Hello there", on_state).await.unwrap();
        assert_eq!(*states.lock().unwrap(), vec![true, false]);
        assert_eq!(played.lock().unwrap().len(), 1);
        assert!(!playback.is_speaking());
    }

    #[tokio::test]
    async fn test_synthesis_failure_never_reports_playing() {
        let playback = coordinator(
            FakeSynthesizer::failing(SynthesisError::Request("boom".into())),
            FakeOutput::new(),
        );
        let (states, on_state) = recorder();
        let err = playback.speak("Hello", on_state).await.unwrap_err();
        assert!(matches!(err, SpeakError::Synthesis(_)));
        assert!(states.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_synthesizer() {
        let playback = coordinator(FakeSynthesizer::unavailable(), FakeOutput::new());
        let err = playback.speak("Hello", |_| {}).await.unwrap_err();
        assert_eq!(err, SpeakError::Synthesis(SynthesisError::Unavailable));
    }

    #[tokio::test]
    async fn test_playback_failure_reports_false() {
        let playback = coordinator(
            FakeSynthesizer::new(),
            FakeOutput::failing(PlaybackError::Device("no device".into())),
        );
        let (states, on_state) = recorder();
        let err = playback.speak("Hello", on_state).await.unwrap_err();
        assert!(matches!(err, SpeakError::Playback(_)));
        assert_eq!(*states.lock().unwrap(), vec![true, false]);
        assert!(!playback.is_speaking());
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let playback = coordinator(FakeSynthesizer::new(), FakeOutput::new());
        let err = playback.speak("   ", |_| {}).await.unwrap_err();
        assert_eq!(err, SpeakError::Synthesis(SynthesisError::EmptyText));
    }

    #[tokio::test]
    async fn test_single_flight() {
        let output = FakeOutput::gated();
        let gate = output.gate();
        let playback = Arc::new(coordinator(FakeSynthesizer::new(), output));

        let first = {
            let playback = Arc::clone(&playback);
            tokio::spawn(async move { playback.speak("first", |_| {}).await })
        };
        while !playback.is_speaking() {
            tokio::task::yield_now().await;
        }

        let second = playback.speak("second", |_| {}).await;
        assert_eq!(second, Err(SpeakError::Busy));

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!playback.is_speaking());
    }

    #[tokio::test]
    async fn test_panicking_output_releases_slot() {
        let playback = Arc::new(coordinator(FakeSynthesizer::new(), FakeOutput::panicking_once()));
        let (states, on_state) = recorder();

        let crashed = {
            let playback = Arc::clone(&playback);
            tokio::spawn(async move { playback.speak("first", on_state).await })
        };
        assert!(crashed.await.unwrap_err().is_panic());
        assert!(!playback.is_speaking());
        assert_eq!(*states.lock().unwrap(), vec![true, false]);

        assert!(playback.speak("second", |_| {}).await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_during_synthesis_skips_playback() {
        let synth = FakeSynthesizer::gated();
        let synth_gate = synth.gate();
        let output = FakeOutput::new();
        let played = output.played();
        let stopped = output.stopped();
        let playback = Arc::new(coordinator(synth, output));

        let speaking = {
            let playback = Arc::clone(&playback);
            tokio::spawn(async move { playback.speak("never heard", |_| {}).await })
        };
        while !playback.is_speaking() {
            tokio::task::yield_now().await;
        }
        playback.stop();
        synth_gate.notify_one();

        assert!(speaking.await.unwrap().is_ok());
        assert!(played.lock().unwrap().is_empty());
        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));

        // The next utterance starts from a clean slate.
        playback.speak("heard", |_| {}).await.unwrap();
        assert_eq!(played.lock().unwrap().len(), 1);
        assert!(!stopped.load(std::sync::atomic::Ordering::SeqCst));
    }
}
