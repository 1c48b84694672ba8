//! Session data structures and the chat/feedback state transitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::engine::QueryEngine;
use crate::feedback::{Feedback, FeedbackRecord, FeedbackStore};

/// Greeting every transcript starts with unless configured otherwise
pub const DEFAULT_GREETING: &str = "How can I help you?";

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One message in the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Message role
    pub role: Role,
    /// Message content
    pub content: String,
    /// Set on the placeholder reply appended when the engine fails
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    /// Message timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            error: false,
            timestamp: Utc::now(),
        }
    }

    fn engine_failure(err: &crate::engine::EngineError) -> Self {
        Self {
            error: true,
            ..Self::assistant(format!("Sorry, I couldn't answer that: {}", err))
        }
    }
}

/// A chat session: the transcript plus the feedback flag
///
/// Turns are append-only; the only way to add them is
/// [`Session::submit_user_message`], which always appends a user turn
/// followed by an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session key
    pub key: String,
    turns: Vec<Turn>,
    feedback_submitted: bool,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an initialized session holding only the greeting
    pub fn new(key: impl Into<String>, greeting: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            turns: vec![Turn::assistant(greeting)],
            feedback_submitted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a session from persisted parts, then initialize it
    pub(crate) fn restore(
        key: impl Into<String>,
        greeting: &str,
        turns: Vec<Turn>,
        feedback_submitted: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut session = Self {
            key: key.into(),
            turns,
            feedback_submitted,
            created_at,
            updated_at: Utc::now(),
        };
        session.initialize(greeting);
        session
    }

    /// Ensure the transcript starts with a greeting
    ///
    /// Existing turns and the feedback flag are left untouched, so calling
    /// this repeatedly is harmless.
    pub fn initialize(&mut self, greeting: &str) {
        if self.turns.is_empty() {
            self.turns.push(Turn::assistant(greeting));
            self.feedback_submitted = false;
            self.updated_at = Utc::now();
        }
    }

    /// The transcript, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent turn
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Whether feedback was recorded for the current last assistant turn
    pub fn feedback_submitted(&self) -> bool {
        self.feedback_submitted
    }

    /// Send a user message to the engine and append both turns
    ///
    /// On engine failure an error-marked assistant turn is still appended so
    /// the transcript keeps alternating, and the engine error is returned.
    pub async fn submit_user_message(
        &mut self,
        engine: &dyn QueryEngine,
        text: impl Into<String>,
    ) -> crate::Result<&Turn> {
        let text = text.into();
        self.turns.push(Turn::user(text.clone()));
        self.updated_at = Utc::now();

        debug!(session = %self.key, engine = engine.name(), "Querying engine");
        let outcome = engine.query(&text).await;

        let (reply, result) = match outcome {
            Ok(response) => (Turn::assistant(response.to_string()), Ok(())),
            Err(e) => {
                warn!(session = %self.key, error = %e, "Query engine failed");
                (Turn::engine_failure(&e), Err(crate::Error::Engine(e)))
            }
        };

        self.turns.push(reply);
        self.feedback_submitted = false;
        self.updated_at = Utc::now();

        result?;
        self.turns
            .last()
            .ok_or_else(|| crate::Error::Internal("transcript empty after reply".to_string()))
    }

    /// True when the last turn is an assistant reply that has not been rated
    pub fn is_feedback_eligible(&self) -> bool {
        !self.feedback_submitted
            && self.turns.len() > 1
            && matches!(self.turns.last(), Some(turn) if turn.role == Role::Assistant)
    }

    /// The (question, reply) pair feedback would be recorded for
    pub fn last_exchange(&self) -> Option<(&Turn, &Turn)> {
        match self.turns.as_slice() {
            [.., question, reply] if reply.role == Role::Assistant => Some((question, reply)),
            _ => None,
        }
    }

    /// Record feedback on the last reply
    ///
    /// Returns `Ok(None)` without touching anything when the session is not
    /// eligible. If the store fails, the flag stays clear so the user can
    /// retry.
    pub fn submit_feedback(
        &mut self,
        store: &dyn FeedbackStore,
        choice: Feedback,
    ) -> crate::Result<Option<FeedbackRecord>> {
        if !self.is_feedback_eligible() {
            debug!(session = %self.key, "Ignoring feedback for ineligible session");
            return Ok(None);
        }
        let Some((question, reply)) = self.last_exchange() else {
            return Ok(None);
        };

        let record = FeedbackRecord::new(question.content.clone(), reply.content.clone(), choice);
        store.append(&record)?;

        self.feedback_submitted = true;
        self.updated_at = Utc::now();
        Ok(Some(record))
    }
}
