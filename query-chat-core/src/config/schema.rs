//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for query-chat
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Query engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
    /// Feedback log configuration
    #[serde(default)]
    pub feedback: FeedbackConfig,
    /// Chat presentation configuration
    #[serde(default)]
    pub chat: ChatConfig,
    /// Web server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Session persistence configuration
    #[serde(default)]
    pub sessions: SessionsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// Query engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path of the precomputed engine artifact
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,
    /// Number of documents combined into one reply
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_artifact_path() -> String {
    "rag_model.json".to_string()
}

fn default_top_k() -> usize {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            top_k: default_top_k(),
        }
    }
}

/// Feedback log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Path of the CSV feedback log
    #[serde(default = "default_feedback_log")]
    pub log_path: String,
}

fn default_feedback_log() -> String {
    "feedback_log.csv".to_string()
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            log_path: default_feedback_log(),
        }
    }
}

/// Chat presentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Assistant turn every new transcript starts with
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Page title
    #[serde(default = "default_title")]
    pub title: String,
    /// Caption shown under the title
    #[serde(default = "default_caption")]
    pub caption: String,
}

fn default_greeting() -> String {
    crate::session::DEFAULT_GREETING.to_string()
}

fn default_title() -> String {
    "Query Engine Chatbot".to_string()
}

fn default_caption() -> String {
    "A chatbot powered by a precomputed index".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            title: default_title(),
            caption: default_caption(),
        }
    }
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Write sessions to disk after every change
    #[serde(default)]
    pub persist: bool,
    /// Directory holding one JSONL file per session
    #[serde(default = "default_sessions_dir")]
    pub dir: String,
    /// Seconds without activity before a persisted session leaves memory
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

fn default_sessions_dir() -> String {
    "sessions".to_string()
}

fn default_idle_ttl_secs() -> u64 {
    30 * 60
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            persist: false,
            dir: default_sessions_dir(),
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}
