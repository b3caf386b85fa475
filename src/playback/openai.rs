//! OpenAI TTS: cloud synthesis via the REST API.
//!
//! POST `{base_url}/audio/speech`
//! Body: `{"model": "tts-1", "input": "text", "voice": "alloy", "response_format": "pcm"}`
//! Returns raw 24kHz 16-bit mono PCM.

use std::future::Future;
use std::pin::Pin;

use tracing::{info, warn};

use super::{SpeechSynthesizer, SynthesizedAudio, VoiceParams};
use crate::config::OpenAiConfig;
use crate::error::SynthesisError;

/// Sample rate of OpenAI's `pcm` response format.
const PCM_SAMPLE_RATE: u32 = 24_000;

pub struct OpenAiSpeech {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiSpeech {
    pub fn from_config(config: &OpenAiConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        if !Self::is_known_voice(&config.tts_voice) {
            warn!(
                voice = %config.tts_voice,
                known = ?Self::available_voices(),
                "Unknown TTS voice, the speech service may reject it"
            );
        }

        Ok(Self {
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Available OpenAI TTS voices.
    pub fn available_voices() -> &'static [&'static str] {
        &["alloy", "echo", "fable", "onyx", "nova", "shimmer"]
    }

    pub fn is_known_voice(voice: &str) -> bool {
        Self::available_voices().iter().any(|known| *known == voice)
    }
}

impl SpeechSynthesizer for OpenAiSpeech {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn synthesize(
        &self,
        text: &str,
        voice: &VoiceParams,
    ) -> Pin<Box<dyn Future<Output = Result<SynthesizedAudio, SynthesisError>> + Send + '_>> {
        let text = text.trim().to_string();
        let voice = voice.clone();
        Box::pin(async move {
            let api_key = self.api_key.as_deref().ok_or(SynthesisError::Unavailable)?;
            if text.is_empty() {
                return Err(SynthesisError::EmptyText);
            }

            info!(voice = %voice.voice, text_len = text.len(), "OpenAI TTS request");

            let body = serde_json::json!({
                "model": voice.model,
                "input": text,
                "voice": voice.voice,
                "response_format": "pcm",
                "speed": clamp_speed(voice.speed),
            });

            let resp = self
                .client
                .post(format!("{}/audio/speech", self.base_url))
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| SynthesisError::Request(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body: serde_json::Value = resp.json().await.unwrap_or_default();
                return Err(SynthesisError::Status {
                    status: status.as_u16(),
                    message: body["error"]["message"]
                        .as_str()
                        .unwrap_or("Unknown error")
                        .to_string(),
                });
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| SynthesisError::Request(format!("Failed to read TTS response: {}", e)))?;

            let samples = pcm16_to_f32(&bytes);
            info!(samples = samples.len(), "OpenAI TTS synthesis complete");
            Ok(SynthesizedAudio {
                samples,
                sample_rate: PCM_SAMPLE_RATE,
            })
        })
    }

    fn name(&self) -> String {
        "OpenAI TTS".to_string()
    }
}

fn clamp_speed(speed: f32) -> f32 {
    speed.clamp(0.25, 4.0)
}

/// Convert little-endian i16 PCM bytes to f32 samples. A trailing odd byte
/// is dropped.
fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            sample as f32 / 32768.0
        })
        .collect()
}
