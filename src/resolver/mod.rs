//! Response resolution: turn a user utterance into assistant reply text.
//!
//! Provides a common `ResponseGenerator` trait for response services, with
//! one implementation:
//! - OpenAI-compatible chat completions (`openai`)
//!
//! When the service is unavailable or fails, `ResponseResolver` falls back
//! to the deterministic keyword responder in `fallback`.

pub mod fallback;
pub mod openai;

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::history::{ConversationEntry, ConversationHistory, CONTEXT_WINDOW};

pub use fallback::FallbackResponder;

/// Fixed acknowledgement for the clear command.
pub const CLEAR_ACK: &str = "Conversation cleared!";

/// Utterances containing this token (case-insensitive) clear the history.
const CLEAR_TOKEN: &str = "clear";

/// Persona instruction sent ahead of every conversation.
pub const SYSTEM_PROMPT: &str = "You are Jarvis, a helpful voice assistant. \
Keep responses concise and conversational, as they will be read aloud. \
Be friendly but professional.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of provider context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Common trait for response services (dyn-compatible).
pub trait ResponseGenerator: Send + Sync {
    /// Whether the service is configured. Polled before every attempt.
    fn is_available(&self) -> bool;

    /// Produce a reply for `turns`, the last of which is the new user turn.
    fn generate(
        &self,
        system_prompt: &str,
        turns: Vec<ChatTurn>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + '_>>;

    /// Display name (e.g. "OpenAI (gpt-4o-mini)").
    fn name(&self) -> String;
}

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Provider,
    Fallback,
    /// The clear command acknowledgement.
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub source: ResponseSource,
    /// Provider failure that forced the fallback, if any.
    pub notice: Option<ProviderError>,
}

impl Resolution {
    pub fn is_clear_ack(&self) -> bool {
        self.source == ResponseSource::Command
    }
}

/// Resolves assistant replies via the response service or the fallback table.
pub struct ResponseResolver {
    generator: Box<dyn ResponseGenerator>,
    fallback: FallbackResponder,
}

impl ResponseResolver {
    pub fn new(generator: Box<dyn ResponseGenerator>) -> Self {
        Self::with_fallback(generator, FallbackResponder::new())
    }

    pub fn with_fallback(generator: Box<dyn ResponseGenerator>, fallback: FallbackResponder) -> Self {
        Self {
            generator,
            fallback,
        }
    }

    pub fn provider_configured(&self) -> bool {
        self.generator.is_available()
    }

    /// Resolve a reply for `user_text`, clearing `history` for the clear command.
    pub async fn resolve(&self, user_text: &str, history: &mut ConversationHistory) -> Resolution {
        if let Some(resolution) = self.intercept_command(user_text, history) {
            return resolution;
        }
        self.reply(user_text, history.recent_window(CONTEXT_WINDOW))
            .await
    }

    /// Handle the clear command. Returns `None` for ordinary utterances.
    pub fn intercept_command(
        &self,
        user_text: &str,
        history: &mut ConversationHistory,
    ) -> Option<Resolution> {
        if !user_text.to_lowercase().contains(CLEAR_TOKEN) {
            return None;
        }
        info!(cleared = history.len(), "Clear command received");
        history.clear();
        Some(Resolution {
            text: CLEAR_ACK.to_string(),
            source: ResponseSource::Command,
            notice: None,
        })
    }

    /// Ask the response service, falling back locally when it is unavailable
    /// or fails. `context` is the recent history window.
    pub async fn reply(&self, user_text: &str, context: &[ConversationEntry]) -> Resolution {
        if !self.generator.is_available() {
            debug!("Response service not configured, using fallback responder");
            return self.fallback(user_text, None);
        }

        let turns = build_turns(context, user_text);
        match self.generator.generate(SYSTEM_PROMPT, turns).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    let err = ProviderError::Malformed("empty reply".to_string());
                    warn!(provider = %self.generator.name(), "{}", err);
                    return self.fallback(user_text, Some(err));
                }
                Resolution {
                    text: text.to_string(),
                    source: ResponseSource::Provider,
                    notice: None,
                }
            }
            Err(err) => {
                warn!(provider = %self.generator.name(), error = %err, "Response service failed, using fallback");
                self.fallback(user_text, Some(err))
            }
        }
    }

    /// Local keyword reply, carrying `notice` when a provider failure caused it.
    pub fn fallback(&self, user_text: &str, notice: Option<ProviderError>) -> Resolution {
        Resolution {
            text: self
                .fallback
                .respond(user_text, self.generator.is_available()),
            source: ResponseSource::Fallback,
            notice,
        }
    }
}

/// Map history entries to alternating user/assistant turns and append the
/// new user turn.
pub fn build_turns(context: &[ConversationEntry], user_text: &str) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(context.len() * 2 + 1);
    for entry in context {
        turns.push(ChatTurn::user(entry.user_text()));
        turns.push(ChatTurn::assistant(entry.assistant_text()));
    }
    turns.push(ChatTurn::user(user_text));
    turns
}
