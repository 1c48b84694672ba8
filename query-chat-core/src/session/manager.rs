//! Session manager for handling multiple sessions

use super::store::{Session, Turn};
use crate::utils::{decode_filename, encode_filename};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Owns every live session, optionally mirroring them to JSONL files
#[derive(Debug)]
pub struct SessionManager {
    /// Sessions directory, `None` keeps sessions in memory only
    sessions_dir: Option<PathBuf>,
    /// Greeting for newly created sessions
    greeting: String,
    /// In-memory cache of sessions
    cache: HashMap<String, Session>,
    /// How long a persisted session may sit unused before leaving the cache
    idle_ttl: Option<chrono::Duration>,
}

impl SessionManager {
    /// Create a manager that keeps sessions in memory only
    pub fn in_memory(greeting: impl Into<String>) -> Self {
        Self {
            sessions_dir: None,
            greeting: greeting.into(),
            cache: HashMap::new(),
            idle_ttl: None,
        }
    }

    /// Create a manager persisting sessions under `dir`
    pub fn persistent<P: AsRef<Path>>(dir: P, greeting: impl Into<String>) -> Self {
        Self {
            sessions_dir: Some(dir.as_ref().to_path_buf()),
            greeting: greeting.into(),
            cache: HashMap::new(),
            idle_ttl: None,
        }
    }

    /// Drop sessions from the cache after `ttl` without updates
    ///
    /// Only persistent managers evict, since evicted sessions are reloaded
    /// from disk on their next access.
    pub fn with_idle_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.idle_ttl = chrono::Duration::from_std(ttl).ok();
        self
    }

    /// Get or create a session
    ///
    /// Existing sessions (cached or on disk) are returned as they are, so
    /// repeated calls never reset a transcript.
    pub fn get_or_create(&mut self, key: impl Into<String>) -> &mut Session {
        match self.cache.entry(key.into()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let session = self
                    .sessions_dir
                    .as_deref()
                    .and_then(|dir| load_session(dir, entry.key(), &self.greeting))
                    .unwrap_or_else(|| Session::new(entry.key().clone(), self.greeting.clone()));
                entry.insert(session)
            }
        }
    }

    /// Get a live session, loading it from disk if needed
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Session> {
        if !self.cache.contains_key(key) {
            let dir = self.sessions_dir.as_deref()?;
            let session = load_session(dir, key, &self.greeting)?;
            self.cache.insert(key.to_string(), session);
        }
        self.cache.get_mut(key)
    }

    /// Get a cached session
    pub fn get(&self, key: &str) -> Option<&Session> {
        self.cache.get(key)
    }

    /// Number of cached sessions
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Whether sessions are written to disk
    pub fn is_persistent(&self) -> bool {
        self.sessions_dir.is_some()
    }

    /// Save a session to disk; a no-op for in-memory managers
    pub fn save(&self, session: &Session) -> crate::Result<()> {
        match &self.sessions_dir {
            Some(dir) => write_session(dir, session),
            None => Ok(()),
        }
    }

    /// Save a cached session by key
    pub fn save_key(&self, key: &str) -> crate::Result<()> {
        match self.cache.get(key) {
            Some(session) => self.save(session),
            None => Err(crate::Error::NotFound(format!("session '{}'", key))),
        }
    }

    /// Delete a session
    pub fn delete(&mut self, key: &str) -> crate::Result<bool> {
        let cached = self.cache.remove(key).is_some();

        match self.sessions_dir.as_deref().map(|dir| session_path(dir, key)) {
            Some(path) if path.exists() => {
                std::fs::remove_file(&path)?;
                Ok(true)
            }
            _ => Ok(cached),
        }
    }

    /// Save and drop cached sessions idle for longer than the configured ttl
    ///
    /// Returns how many sessions left the cache. A session that fails to
    /// save stays cached.
    pub fn evict_idle(&mut self) -> usize {
        let (Some(dir), Some(ttl)) = (self.sessions_dir.as_deref(), self.idle_ttl) else {
            return 0;
        };
        let cutoff = chrono::Utc::now() - ttl;

        let idle: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, session)| session.updated_at < cutoff)
            .map(|(key, _)| key.clone())
            .collect();

        let mut evicted = 0;
        for key in idle {
            if let Some(session) = self.cache.get(&key) {
                if let Err(e) = write_session(dir, session) {
                    warn!(session = %key, "Failed to save idle session, keeping it cached: {}", e);
                    continue;
                }
            }
            self.cache.remove(&key);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, remaining = self.cache.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// List sessions stored on disk, most recently updated first
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let Some(dir) = &self.sessions_dir else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut sessions: Vec<SessionInfo> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let stem = name.strip_suffix(".jsonl")?.to_string();
                let content = std::fs::read_to_string(entry.path()).ok()?;
                let first_line = content.lines().next()?;
                let value = serde_json::from_str::<serde_json::Value>(first_line).ok()?;
                if value.get("_type").and_then(|v| v.as_str()) != Some("metadata") {
                    return None;
                }
                let field = |name: &str| {
                    value
                        .get(name)
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                };
                let key = field("key").or_else(|| decode_filename(&stem))?;
                Some(SessionInfo {
                    key,
                    created_at: field("created_at"),
                    updated_at: field("updated_at"),
                    path: entry.path().to_string_lossy().to_string(),
                })
            })
            .collect();

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }
}

/// Write a session as JSONL: a metadata line, then one line per turn
fn write_session(dir: &Path, session: &Session) -> crate::Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = session_path(dir, &session.key);

    let mut lines = Vec::new();

    let metadata = serde_json::json!({
        "_type": "metadata",
        "key": session.key,
        "created_at": session.created_at.to_rfc3339(),
        "updated_at": session.updated_at.to_rfc3339(),
        "feedback_submitted": session.feedback_submitted(),
    });
    lines.push(serde_json::to_string(&metadata)?);

    for turn in session.turns() {
        lines.push(serde_json::to_string(turn)?);
    }

    std::fs::write(&path, lines.join("\n"))?;
    Ok(())
}

/// Get the file path for a session
fn session_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.jsonl", encode_filename(key)))
}

/// Load a session from disk
fn load_session(dir: &Path, key: &str, greeting: &str) -> Option<Session> {
    let path = session_path(dir, key);
    if !path.exists() {
        return None;
    }

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read session file {:?}: {}", path, e);
            return None;
        }
    };

    let mut turns = Vec::new();
    let mut feedback_submitted = false;
    let mut created_at = None;
    let mut stored_key = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
            if value.get("_type").and_then(|v| v.as_str()) == Some("metadata") {
                stored_key = value.get("key").and_then(|v| v.as_str()).map(str::to_string);
                feedback_submitted = value
                    .get("feedback_submitted")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                created_at = value
                    .get("created_at")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok());
            } else if let Ok(turn) = serde_json::from_value::<Turn>(value) {
                turns.push(turn);
            }
        }
    }

    if stored_key.as_deref() != Some(key) {
        warn!(
            "Session file {:?} belongs to {:?}, not '{}'; ignoring it",
            path, stored_key, key
        );
        return None;
    }

    Some(Session::restore(
        key,
        greeting,
        turns,
        feedback_submitted,
        created_at.unwrap_or_else(chrono::Utc::now),
    ))
}

/// Information about a stored session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session key
    pub key: String,
    /// Creation time
    pub created_at: Option<String>,
    /// Last update time
    pub updated_at: Option<String>,
    /// File path
    pub path: String,
}
