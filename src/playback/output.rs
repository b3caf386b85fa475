//! Audio playback via rodio.
//!
//! Plays f32 PCM audio through the default output device with volume
//! control and interruptible playback. The output stream is opened on a
//! blocking thread per utterance since `OutputStream` cannot leave the
//! thread that created it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use tracing::debug;

use super::{AudioOutput, SynthesizedAudio};
use crate::error::PlaybackError;

/// How often the playback thread checks for a stop request.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct RodioOutput {
    volume: f32,
    stop_requested: Arc<AtomicBool>,
}

impl RodioOutput {
    /// `volume`: 0.0 = silent, 1.0 = full volume.
    pub fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl AudioOutput for RodioOutput {
    fn play(
        &self,
        audio: SynthesizedAudio,
    ) -> Pin<Box<dyn Future<Output = Result<(), PlaybackError>> + Send + '_>> {
        let volume = self.volume;
        let stop_requested = Arc::clone(&self.stop_requested);
        Box::pin(async move {
            if audio.samples.is_empty() || stop_requested.load(Ordering::SeqCst) {
                return Ok(());
            }

            tokio::task::spawn_blocking(move || play_blocking(audio, volume, &stop_requested))
                .await
                .map_err(|e| PlaybackError::Failed(format!("playback thread failed: {}", e)))?
        })
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn prepare(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }
}

fn play_blocking(
    audio: SynthesizedAudio,
    volume: f32,
    stop_requested: &AtomicBool,
) -> Result<(), PlaybackError> {
    let (_stream, stream_handle) =
        OutputStream::try_default().map_err(|e| PlaybackError::Device(e.to_string()))?;
    let sink = Sink::try_new(&stream_handle)
        .map_err(|e| PlaybackError::Device(format!("Failed to create audio sink: {}", e)))?;
    sink.set_volume(volume);

    sink.append(SamplesBuffer::new(1, audio.sample_rate, audio.samples));
    while !sink.empty() {
        if stop_requested.load(Ordering::SeqCst) {
            debug!("Playback interrupted");
            sink.stop();
            break;
        }
        std::thread::sleep(STOP_POLL_INTERVAL);
    }
    Ok(())
}
