//! Configuration validation rules.

use std::net::IpAddr;

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.engine.artifact_path.trim().is_empty() {
        errors.push("engine.artifact_path must not be empty".to_string());
    }
    if config.engine.top_k == 0 {
        errors.push("engine.top_k must be > 0".to_string());
    }
    if config.feedback.log_path.trim().is_empty() {
        errors.push("feedback.log_path must not be empty".to_string());
    }
    if config.chat.greeting.trim().is_empty() {
        errors.push("chat.greeting must not be empty".to_string());
    }
    if config.server.host.parse::<IpAddr>().is_err() {
        errors.push(format!(
            "server.host must be an IP address, got '{}'",
            config.server.host
        ));
    }
    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }
    if config.sessions.persist && config.sessions.dir.trim().is_empty() {
        errors.push("sessions.dir is required when sessions.persist is enabled".to_string());
    }
    if config.sessions.idle_ttl_secs == 0 {
        errors.push("sessions.idle_ttl_secs must be > 0".to_string());
    }

    let format = config.logging.format.to_ascii_lowercase();
    if format != "text" && format != "json" {
        errors.push("logging.format must be 'text' or 'json'".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
