use query_chat_core::feedback::Feedback;
use query_chat_core::session::{Session, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
pub struct AppState {
    pub api_tx: mpsc::Sender<ManagerCommand>,
    /// Rendered chat page
    pub page: Arc<String>,
}

/// Requests handled one at a time by the [`crate::Manager`] task
pub enum ManagerCommand {
    OpenSession {
        session_id: String,
        reply: oneshot::Sender<SessionView>,
    },
    GetSession {
        session_id: String,
        reply: oneshot::Sender<Option<SessionView>>,
    },
    Chat {
        session_id: String,
        message: String,
        reply: oneshot::Sender<ChatResponse>,
    },
    Feedback {
        session_id: String,
        feedback: Feedback,
        reply: oneshot::Sender<query_chat_core::Result<FeedbackResponse>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub turns: Vec<Turn>,
    pub feedback_eligible: bool,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.key.clone(),
            turns: session.turns().to_vec(),
            feedback_eligible: session.is_feedback_eligible(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: Turn,
    pub feedback_eligible: bool,
    /// Engine failure for this turn; `reply` is then the placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub session_id: String,
    pub recorded: bool,
    pub feedback_eligible: bool,
}
