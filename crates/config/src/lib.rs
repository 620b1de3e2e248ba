//! # Attune Configuration
//!
//! TOML-based configuration with defaults and validation for the Attune
//! runtime. Every section and field is optional in the file; anything
//! omitted falls back to a sensible default, so an empty or missing file
//! yields a fully working configuration.
//!
//! ```toml
//! [memory]
//! decay_factor = 0.95
//! max_history_sessions = 10
//!
//! [dialogue]
//! token_budget = 8000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    ReadError { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Root configuration for the Attune runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: defaults are used and a note is
    /// logged. A file that exists but cannot be read or parsed is an
    /// error, as is any value that fails validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.memory;
        if m.decay_factor <= 0.0 || m.decay_factor >= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "memory.decay_factor must be between 0 and 1 exclusive, got {}",
                m.decay_factor
            )));
        }
        if m.max_history_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_history_sessions must be at least 1".into(),
            ));
        }
        if m.summarize_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "memory.summarize_timeout_secs must be greater than 0".into(),
            ));
        }

        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.score_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.score_threshold must be between 0 and 1, got {}",
                r.score_threshold
            )));
        }
        if r.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.timeout_secs must be greater than 0".into(),
            ));
        }

        let d = &self.dialogue;
        if d.token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "dialogue.token_budget must be greater than 0".into(),
            ));
        }
        if d.recent_turn_window == 0 {
            return Err(ConfigError::ValidationError(
                "dialogue.recent_turn_window must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&d.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "dialogue.temperature must be between 0 and 2, got {}",
                d.temperature
            )));
        }

        Ok(())
    }

    /// A commented TOML template with every field at its default.
    pub fn default_toml() -> &'static str {
        r#"# Attune runtime configuration.
# Every field is optional; omitted values use the defaults shown here.

[memory]
# Weight multiplier applied per step back in session history.
decay_factor = 0.95
# How many recent sessions are considered for retrieval.
max_history_sessions = 10
# Summarize sessions automatically when they end.
auto_summarize = true
# Give up on a summarization call after this many seconds.
summarize_timeout_secs = 15
# Directory for persisted user memory files.
storage_dir = "memory"

[retrieval]
# Documents to keep per knowledge source.
top_k = 5
# Drop scored documents below this relevance.
score_threshold = 0.5
# Give up on a knowledge base call after this many seconds.
timeout_secs = 10

[dialogue]
# Base system prompt prepended to every assembled context.
# system_prompt = "..."
# Token budget for the assembled context.
token_budget = 8000
# Raw turns of the current session to include.
recent_turn_window = 10
# Past session summaries to include.
memory_top_k = 3
# Sampling temperature for generation.
temperature = 0.7
# Toggle the knowledge retrieval stage.
enable_knowledge = true
# Toggle the memory retrieval stage.
enable_memory = true
"#
    }
}

// ── Memory ───────────────────────────────────────────────────────────────────

/// Settings for the memory tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Per-step recency decay applied when scoring past sessions.
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    /// Size of the session window considered for retrieval.
    #[serde(default = "default_max_history_sessions")]
    pub max_history_sessions: usize,
    /// Whether ending a session triggers summarization.
    #[serde(default = "default_auto_summarize")]
    pub auto_summarize: bool,
    /// Timeout for a single summarization call, in seconds.
    #[serde(default = "default_summarize_timeout_secs")]
    pub summarize_timeout_secs: u64,
    /// Directory where user memory files live.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

fn default_decay_factor() -> f64 {
    0.95
}

fn default_max_history_sessions() -> usize {
    10
}

fn default_auto_summarize() -> bool {
    true
}

fn default_summarize_timeout_secs() -> u64 {
    15
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("memory")
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            decay_factor: default_decay_factor(),
            max_history_sessions: default_max_history_sessions(),
            auto_summarize: default_auto_summarize(),
            summarize_timeout_secs: default_summarize_timeout_secs(),
            storage_dir: default_storage_dir(),
        }
    }
}

// ── Retrieval ────────────────────────────────────────────────────────────────

/// Settings for knowledge base retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Documents to keep per knowledge source.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum relevance score; unscored documents always pass.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    /// Timeout for a single knowledge base call, in seconds.
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_top_k() -> usize {
    5
}

fn default_score_threshold() -> f32 {
    0.5
}

fn default_retrieval_timeout_secs() -> u64 {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

// ── Dialogue ─────────────────────────────────────────────────────────────────

/// Settings for context assembly and generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Base system prompt for every conversation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Token budget for the assembled context.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// Raw turns of the current session to include.
    #[serde(default = "default_recent_turn_window")]
    pub recent_turn_window: usize,
    /// Past session summaries to include in the context.
    #[serde(default = "default_memory_top_k")]
    pub memory_top_k: usize,
    /// Sampling temperature passed to the language model.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Whether to run the knowledge retrieval stage.
    #[serde(default = "default_enable_knowledge")]
    pub enable_knowledge: bool,
    /// Whether to run the memory retrieval stage.
    #[serde(default = "default_enable_memory")]
    pub enable_memory: bool,
}

fn default_system_prompt() -> String {
    "You are a supportive counseling companion. Listen carefully, respond with \
     empathy, and draw on what you know about the user when it helps."
        .to_string()
}

fn default_token_budget() -> usize {
    8000
}

fn default_recent_turn_window() -> usize {
    10
}

fn default_memory_top_k() -> usize {
    3
}

fn default_temperature() -> f32 {
    0.7
}

fn default_enable_knowledge() -> bool {
    true
}

fn default_enable_memory() -> bool {
    true
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            token_budget: default_token_budget(),
            recent_turn_window: default_recent_turn_window(),
            memory_top_k: default_memory_top_k(),
            temperature: default_temperature(),
            enable_knowledge: default_enable_knowledge(),
            enable_memory: default_enable_memory(),
        }
    }
}
