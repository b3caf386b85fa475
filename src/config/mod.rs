//! Configuration reading and data directory paths.

pub mod paths;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use paths::get_data_dir;

/// Top-level assistant_config.json shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub app: AppConfig,
}

/// Response and speech service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_speed: f32,
    pub tts_volume: f32,
    pub request_timeout_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            tts_volume: 1.0,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub name: String,
    pub speech_timeout_ms: u64,
    pub debug_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Jarvis Voice Assistant".to_string(),
            speech_timeout_ms: 10_000,
            debug_mode: false,
        }
    }
}

impl AssistantConfig {
    /// Whether an API key is present for the response and speech services.
    pub fn is_configured(&self) -> bool {
        self.openai.has_api_key()
    }

    /// Upper bound on one listening attempt; `None` disables the timeout.
    pub fn speech_timeout(&self) -> Option<Duration> {
        match self.app.speech_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Apply environment variable overrides on top of the file values.
    /// Returns a description of every override that was ignored.
    pub fn apply_env(&mut self) -> Vec<String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut ignored = Vec::new();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(model) = var("JARVIS_OPENAI_MODEL") {
            self.openai.model = model;
        }
        if let Some(url) = var("JARVIS_OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        if let Some(model) = var("JARVIS_TTS_MODEL") {
            self.openai.tts_model = model;
        }
        if let Some(voice) = var("JARVIS_TTS_VOICE") {
            self.openai.tts_voice = voice;
        }
        if let Some(name) = var("JARVIS_APP_NAME") {
            self.app.name = name;
        }
        if let Some(ms) = var("JARVIS_SPEECH_TIMEOUT_MS") {
            match ms.parse() {
                Ok(ms) => self.app.speech_timeout_ms = ms,
                Err(e) => ignored.push(format!("Ignoring JARVIS_SPEECH_TIMEOUT_MS={}: {}", ms, e)),
            }
        }
        if let Some(debug) = var("JARVIS_DEBUG") {
            self.app.debug_mode = debug == "true" || debug == "1";
        }
        ignored
    }
}

impl OpenAiConfig {
    /// Per-request HTTP timeout; `None` (0 in the file) disables it.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Read assistant_config.json from the data directory, then apply env
/// overrides. Nothing is logged here since this runs before logging is set
/// up: problems with the file or the overrides are handed back so the caller
/// can report them. An unusable file falls back to defaults.
pub fn load_assistant_config() -> (AssistantConfig, Vec<String>) {
    let mut problems = Vec::new();
    let mut config = match read_json_file::<AssistantConfig>(&get_config_path()) {
        Ok(config) => config.unwrap_or_default(),
        Err(problem) => {
            problems.push(problem);
            AssistantConfig::default()
        }
    };
    problems.extend(config.apply_env());
    (config, problems)
}

/// Path to assistant_config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("assistant_config.json")
}

/// Generic helper: read a JSON file and deserialize it. A missing file is
/// `Ok(None)`; unreadable or malformed files are described in the error.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("Failed to read {}: {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = AssistantConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.max_tokens, 150);
        assert_eq!(config.openai.tts_voice, "alloy");
        assert_eq!(config.speech_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"openai": {"apiKey": "sk-test", "model": "gpt-4o"}, "app": {"debugMode": true}}"#;
        let config: AssistantConfig = serde_json::from_str(json).unwrap();
        assert!(config.is_configured());
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.openai.tts_model, "tts-1");
        assert!(config.app.debug_mode);
        assert_eq!(config.app.name, "Jarvis Voice Assistant");
    }

    #[test]
    fn test_zero_request_timeout_disables_it() {
        let mut openai = OpenAiConfig::default();
        assert_eq!(openai.request_timeout(), Some(Duration::from_secs(30)));
        openai.request_timeout_ms = 0;
        assert_eq!(openai.request_timeout(), None);
    }

    #[test]
    fn test_blank_api_key_is_not_configured() {
        let mut config = AssistantConfig::default();
        config.openai.api_key = Some("   ".to_string());
        assert!(!config.is_configured());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-env"),
            ("JARVIS_TTS_VOICE", "nova"),
            ("JARVIS_SPEECH_TIMEOUT_MS", "0"),
            ("JARVIS_DEBUG", "true"),
            ("JARVIS_OPENAI_MODEL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AssistantConfig::default();
        let ignored = config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert!(ignored.is_empty());
        assert!(config.is_configured());
        assert_eq!(config.openai.tts_voice, "nova");
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.speech_timeout(), None);
        assert!(config.app.debug_mode);
    }

    #[test]
    fn test_bad_env_override_is_reported() {
        let mut config = AssistantConfig::default();
        let ignored = config.apply_overrides(|key| {
            (key == "JARVIS_SPEECH_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert_eq!(ignored.len(), 1);
        assert!(ignored[0].contains("JARVIS_SPEECH_TIMEOUT_MS=soon"));
        assert_eq!(config.app.speech_timeout_ms, 10_000);
    }

    #[test]
    fn test_read_json_file_missing_and_invalid() {
        let dir = env::temp_dir().join("jarvis-voice-test-config");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create test dir");

        let missing = read_json_file::<AssistantConfig>(&dir.join("nope.json"));
        assert_eq!(missing.map(|c| c.is_none()), Ok(true));

        let bad = dir.join("bad.json");
        fs::write(&bad, "{not json").unwrap();
        let problem = read_json_file::<AssistantConfig>(&bad).unwrap_err();
        assert!(problem.starts_with("Failed to parse"));
        assert!(problem.contains("bad.json"));

        let good = dir.join("good.json");
        fs::write(&good, r#"{"app": {"name": "Friday"}}"#).unwrap();
        let parsed: AssistantConfig = read_json_file(&good).unwrap().unwrap();
        assert_eq!(parsed.app.name, "Friday");

        let _ = fs::remove_dir_all(&dir);
    }
}
