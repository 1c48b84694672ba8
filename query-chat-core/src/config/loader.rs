//! Configuration loading and management

use super::schema::Config;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Prefix of environment variables that override config paths,
/// e.g. `QUERY_CHAT__SERVER__PORT=9000`
const ENV_PREFIX: &str = "QUERY_CHAT__";

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".query-chat"))
            .unwrap_or_else(|| PathBuf::from(".query-chat"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file and environment
    pub fn load(&self) -> crate::Result<Config> {
        let config_path = self.config_path();
        let mut merged = serde_json::to_value(Config::default())?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file_value: Value = serde_json::from_str(&content)?;
            merge_values(&mut merged, file_value);
        }

        apply_path_overrides(&mut merged);

        let config: Config = serde_json::from_value(merged)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the config file path
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `overlay` into `base`; objects merge key by key, anything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                merge_values(base_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Env values are JSON when they parse as JSON, otherwise plain strings
fn parse_env_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    })
}

fn set_path_value(target: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        set_path_value(map.entry(head.clone()).or_insert(Value::Null), rest, value);
    }
}

/// Turn `QUERY_CHAT__A__B=v` pairs into `(["a", "b"], v)` overrides
fn env_overrides<I>(vars: I) -> Vec<(Vec<String>, Value)>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, raw)| {
            let path: Vec<String> = key
                .strip_prefix(ENV_PREFIX)?
                .split("__")
                .filter(|s| !s.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            (!path.is_empty()).then(|| (path, parse_env_value(&raw)))
        })
        .collect()
}

fn apply_path_overrides(config: &mut Value) {
    for (path, value) in env_overrides(std::env::vars()) {
        set_path_value(config, &path, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    struct EnvVarGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe { std::env::set_var(key, value) };
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.original {
                // SAFETY: tests serialize env mutations with ENV_LOCK.
                unsafe { std::env::set_var(&self.key, value) };
            } else {
                // SAFETY: tests serialize env mutations with ENV_LOCK.
                unsafe { std::env::remove_var(&self.key) };
            }
        }
    }

    fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_load_default_config() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.engine.artifact_path, "rag_model.json");
        assert_eq!(config.feedback.log_path, "feedback_log.csv");
        assert_eq!(config.chat.greeting, "How can I help you?");
        assert_eq!(config.server.port, 8501);
        assert!(!config.sessions.persist);
    }

    #[test]
    fn test_save_and_load_config() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());

        let mut config = Config::default();
        config.engine.artifact_path = "/srv/index/model.json".to_string();
        config.chat.greeting = "Ask me anything.".to_string();

        loader.save(&config).unwrap();
        let loaded = loader.load().unwrap();

        assert_eq!(loaded.engine.artifact_path, "/srv/index/model.json");
        assert_eq!(loaded.chat.greeting, "Ask me anything.");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("config.json"),
            r#"{"server":{"port":9000}}"#,
        )
        .unwrap();

        let config = ConfigLoader::with_dir(temp_dir.path()).load().unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.engine.top_k, 2);
    }

    #[test]
    fn test_load_applies_path_env_overrides() {
        let _lock = lock_env();
        let _port_guard = EnvVarGuard::set("QUERY_CHAT__SERVER__PORT", "9100");
        let _persist_guard = EnvVarGuard::set("QUERY_CHAT__SESSIONS__PERSIST", "true");
        let _log_guard = EnvVarGuard::set("QUERY_CHAT__FEEDBACK__LOG_PATH", "/tmp/fb.csv");

        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::with_dir(temp_dir.path()).load().unwrap();

        assert_eq!(config.server.port, 9100);
        assert!(config.sessions.persist);
        assert_eq!(config.feedback.log_path, "/tmp/fb.csv");
    }

    #[test]
    fn test_path_env_overrides_file() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::set("QUERY_CHAT__ENGINE__ARTIFACT_PATH", "env_model.json");

        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("config.json"),
            r#"{"engine":{"artifact_path":"file_model.json"}}"#,
        )
        .unwrap();

        let config = ConfigLoader::with_dir(temp_dir.path()).load().unwrap();
        assert_eq!(config.engine.artifact_path, "env_model.json");
    }

    #[test]
    fn test_validation_rejects_zero_top_k() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::set("QUERY_CHAT__ENGINE__TOP_K", "0");

        let temp_dir = TempDir::new().unwrap();
        let err = ConfigLoader::with_dir(temp_dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_env_overrides_parse_paths_and_values() {
        let vars = vec![
            ("QUERY_CHAT__SERVER__PORT".to_string(), "9000".to_string()),
            ("QUERY_CHAT__SESSIONS__PERSIST".to_string(), "TRUE".to_string()),
            ("QUERY_CHAT__CHAT__TITLE".to_string(), "Docs bot".to_string()),
            ("QUERY_CHAT__".to_string(), "ignored".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];
        let overrides = env_overrides(vars);

        assert_eq!(overrides.len(), 3);
        assert_eq!(overrides[0].0, vec!["server", "port"]);
        assert_eq!(overrides[0].1, Value::from(9000));
        assert_eq!(overrides[1].1, Value::Bool(true));
        assert_eq!(overrides[2].1, Value::String("Docs bot".to_string()));
    }

    #[test]
    fn test_merge_and_set_path() {
        let mut base = serde_json::json!({"server": {"host": "127.0.0.1", "port": 8501}});
        merge_values(&mut base, serde_json::json!({"server": {"port": 9000}, "extra": 1}));
        assert_eq!(base["server"]["host"], "127.0.0.1");
        assert_eq!(base["server"]["port"], 9000);
        assert_eq!(base["extra"], 1);

        set_path_value(&mut base, &["extra".to_string(), "deep".to_string()], Value::Bool(false));
        assert_eq!(base["extra"]["deep"], false);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("config.json"), "{ not json").unwrap();

        let err = ConfigLoader::with_dir(temp_dir.path()).load().unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }
}
