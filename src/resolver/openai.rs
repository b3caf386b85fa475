//! OpenAI-compatible chat completions client.
//!
//! POST `{base_url}/chat/completions`
//! Body: `{"model": "...", "messages": [...], "max_tokens": 150, "temperature": 0.7}`

use std::future::Future;
use std::pin::Pin;

use serde_json::{json, Value};
use tracing::{debug, info};

use super::{ChatTurn, ResponseGenerator};
use crate::config::OpenAiConfig;
use crate::error::ProviderError;

pub struct OpenAiChat {
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn from_config(config: &OpenAiConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    /// Model used for completions.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ResponseGenerator for OpenAiChat {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate(
        &self,
        system_prompt: &str,
        turns: Vec<ChatTurn>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + '_>> {
        let system_prompt = system_prompt.to_string();
        Box::pin(async move {
            let api_key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured)?;

            let messages = build_messages(&system_prompt, &turns);
            let prompt_tokens: usize = turns.iter().map(|t| estimate_tokens(&t.text)).sum::<usize>()
                + estimate_tokens(&system_prompt);
            info!(model = %self.model, turns = turns.len(), prompt_tokens, "Chat completion request");

            let body = json!({
                "model": self.model,
                "messages": messages,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
                "stream": false,
            });

            let resp = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body: Value = resp.json().await.unwrap_or(Value::Null);
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }

            let data: Value = resp
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            let text = extract_reply(&data)?;
            debug!(reply_tokens = estimate_tokens(&text), "Chat completion received");
            Ok(text)
        })
    }

    fn name(&self) -> String {
        format!("OpenAI ({})", self.model)
    }
}

/// Rough token estimate: about four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

fn build_messages(system_prompt: &str, turns: &[ChatTurn]) -> Vec<Value> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(json!({ "role": "system", "content": system_prompt }));
    for turn in turns {
        messages.push(json!({ "role": turn.role.as_str(), "content": turn.text }));
    }
    messages
}

fn extract_reply(data: &Value) -> Result<String, ProviderError> {
    data["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ProviderError::Malformed("Invalid response format".to_string()))
}

fn error_message(body: &Value) -> String {
    body["error"]["message"]
        .as_str()
        .unwrap_or("Unknown error")
        .to_string()
}
