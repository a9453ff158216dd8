use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

// ============================================================================
// Spotify Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct SpotifyConfig {
    /// Client id from the Spotify developer dashboard. Supports ${ENV_VAR}.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Client secret. Supports ${ENV_VAR}.
    #[serde(default = "default_client_secret")]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Where the OAuth tokens are cached between runs.
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            client_secret: default_client_secret(),
            redirect_uri: default_redirect_uri(),
            scope: default_scope(),
            cache_path: default_cache_path(),
        }
    }
}

fn default_client_id() -> String {
    "${SPOTIFY_CLIENT_ID}".into()
}

fn default_client_secret() -> String {
    "${SPOTIFY_CLIENT_SECRET}".into()
}

fn default_redirect_uri() -> String {
    "http://localhost:8080/callback".into()
}

fn default_scope() -> String {
    "user-library-read user-read-playback-state user-modify-playback-state \
     playlist-modify-public playlist-modify-private"
        .into()
}

fn default_cache_path() -> String {
    ".croon-tokens".into()
}

// ============================================================================
// Voice Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct VoiceConfig {
    /// Transcription endpoint base URL; resolved from `preset` if empty.
    #[serde(default)]
    pub endpoint: String,
    /// Preset shortcuts: "openai" or "local"
    #[serde(default)]
    pub preset: Option<String>,
    /// API key (supports ${ENV_VAR} syntax)
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_voice_model")]
    pub model: String,
    /// Give up when no speech starts within this many seconds
    #[serde(default = "default_voice_timeout")]
    pub timeout_secs: u64,
    /// Hard cap on a single utterance
    #[serde(default = "default_phrase_limit")]
    pub phrase_limit_secs: u64,
    /// RMS level above which a frame counts as speech
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            preset: None,
            api_key: None,
            model: default_voice_model(),
            timeout_secs: default_voice_timeout(),
            phrase_limit_secs: default_phrase_limit(),
            silence_threshold: default_silence_threshold(),
        }
    }
}

fn default_voice_model() -> String {
    "whisper-1".into()
}

fn default_voice_timeout() -> u64 {
    5
}

fn default_phrase_limit() -> u64 {
    10
}

fn default_silence_threshold() -> f32 {
    0.01
}

// ============================================================================
// Feedback Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FeedbackConfig {
    /// Play a short tone after each command
    #[serde(default = "default_enable_tone")]
    pub enable_tone: bool,
    /// Speak the result message
    #[serde(default = "default_enable_speech")]
    pub enable_speech: bool,
    /// Speech endpoint base URL; resolved from `preset` if empty.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_speech_model")]
    pub model: String,
    #[serde(default = "default_speech_voice")]
    pub voice: String,
    #[serde(default = "default_speech_speed")]
    pub speed: f32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enable_tone: default_enable_tone(),
            enable_speech: default_enable_speech(),
            endpoint: String::new(),
            preset: None,
            api_key: None,
            model: default_speech_model(),
            voice: default_speech_voice(),
            speed: default_speech_speed(),
        }
    }
}

fn default_enable_tone() -> bool {
    true
}

fn default_enable_speech() -> bool {
    true
}

fn default_speech_model() -> String {
    "tts-1".into()
}

fn default_speech_voice() -> String {
    "alloy".into()
}

fn default_speech_speed() -> f32 {
    1.0
}

// ============================================================================
// Loading
// ============================================================================

/// Expand ${VAR} to environment variable values
fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_else(|_| {
                eprintln!("Warning: Environment variable '{}' not found", var_name);
                String::new()
            });
            result.replace_range(start..start + end + 1, &value);
        } else {
            break;
        }
    }

    result
}

/// Resolve an endpoint preset name to its base URL.
fn resolve_endpoint(endpoint: &mut String, preset: &Option<String>) {
    if !endpoint.is_empty() {
        return;
    }
    *endpoint = match preset.as_deref() {
        Some("openai") | None => "https://api.openai.com/v1".to_string(),
        Some("local") => "http://localhost:8000/v1".to_string(),
        Some(other) => {
            eprintln!("Warning: Unknown preset '{}', using OpenAI default", other);
            "https://api.openai.com/v1".to_string()
        }
    };
}

impl Config {
    pub fn load() -> Self {
        let path = Path::new("config.toml");
        let mut config = if path.exists() {
            fs::read_to_string(path)
                .ok()
                .and_then(|s| toml::from_str(&s).ok())
                .unwrap_or_default()
        } else {
            Config::default()
        };

        config.resolve();
        config
    }

    /// Expand secrets and resolve endpoint presets in place.
    fn resolve(&mut self) {
        self.spotify.client_id = expand_env_vars(&self.spotify.client_id);
        self.spotify.client_secret = expand_env_vars(&self.spotify.client_secret);
        if let Some(key) = &mut self.voice.api_key {
            *key = expand_env_vars(key);
        }
        if let Some(key) = &mut self.feedback.api_key {
            *key = expand_env_vars(key);
        }
        resolve_endpoint(&mut self.voice.endpoint, &self.voice.preset);
        resolve_endpoint(&mut self.feedback.endpoint, &self.feedback.preset);
    }
}
