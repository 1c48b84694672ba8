use query_chat_core::engine::QueryEngine;
use query_chat_core::feedback::{Feedback, FeedbackStore};
use query_chat_core::session::{Session, SessionManager};
use query_chat_core::utils::truncate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::state::{ChatResponse, FeedbackResponse, ManagerCommand, SessionView};

/// How often idle sessions are pushed out of the cache
const EVICT_INTERVAL: Duration = Duration::from_secs(60);

/// Owns every session and processes commands strictly in order, so no two
/// interactions ever touch session state at the same time.
pub struct Manager {
    api_rx: mpsc::Receiver<ManagerCommand>,
    engine: Arc<dyn QueryEngine>,
    feedback: Arc<dyn FeedbackStore>,
    sessions: SessionManager,
}

impl Manager {
    pub fn new(
        api_rx: mpsc::Receiver<ManagerCommand>,
        engine: Arc<dyn QueryEngine>,
        feedback: Arc<dyn FeedbackStore>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            api_rx,
            engine,
            feedback,
            sessions,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(engine = self.engine.name(), "Manager loop started");

        let mut evict_tick = tokio::time::interval(EVICT_INTERVAL);

        loop {
            tokio::select! {
                cmd = self.api_rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = evict_tick.tick() => {
                    self.sessions.evict_idle();
                }
            }
        }

        info!("Manager channel closed, stopping loop");
        Ok(())
    }

    async fn handle(&mut self, cmd: ManagerCommand) {
        match cmd {
            ManagerCommand::OpenSession { session_id, reply } => {
                let view = SessionView::from(&*self.sessions.get_or_create(session_id.as_str()));
                self.persist(&session_id);
                let _ = reply.send(view);
            }
            ManagerCommand::GetSession { session_id, reply } => {
                let view = self.sessions.get_mut(&session_id).map(|s| SessionView::from(&*s));
                let _ = reply.send(view);
            }
            ManagerCommand::Chat {
                session_id,
                message,
                reply,
            } => {
                let response = self.chat(&session_id, message).await;
                self.persist(&session_id);
                let _ = reply.send(response);
            }
            ManagerCommand::Feedback {
                session_id,
                feedback,
                reply,
            } => {
                let result = self.feedback(&session_id, feedback);
                if matches!(result, Ok(FeedbackResponse { recorded: true, .. })) {
                    self.persist(&session_id);
                }
                let _ = reply.send(result);
            }
        }
    }

    async fn chat(&mut self, session_id: &str, message: String) -> ChatResponse {
        debug!(session = %session_id, question = %truncate(&message, 80), "Processing chat message");

        let session = self.sessions.get_or_create(session_id);
        let error = session
            .submit_user_message(self.engine.as_ref(), message)
            .await
            .err()
            .map(|e| e.to_string());

        chat_response(session, error)
    }

    fn feedback(
        &mut self,
        session_id: &str,
        feedback: Feedback,
    ) -> query_chat_core::Result<FeedbackResponse> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| query_chat_core::Error::NotFound(format!("session '{}'", session_id)))?;

        let recorded = match session.submit_feedback(self.feedback.as_ref(), feedback) {
            Ok(record) => record.is_some(),
            Err(e) => {
                error!(session = %session_id, "Failed to record feedback: {}", e);
                return Err(e);
            }
        };
        if recorded {
            info!(session = %session_id, feedback = %feedback, "Feedback recorded");
        }

        Ok(FeedbackResponse {
            session_id: session_id.to_string(),
            recorded,
            feedback_eligible: session.is_feedback_eligible(),
        })
    }

    fn persist(&self, session_id: &str) {
        if let Err(e) = self.sessions.save_key(session_id) {
            warn!(session = %session_id, "Failed to persist session: {}", e);
        }
    }
}

fn chat_response(session: &Session, error: Option<String>) -> ChatResponse {
    // submit_user_message always leaves an assistant turn last
    let reply = session
        .last_turn()
        .cloned()
        .unwrap_or_else(|| query_chat_core::session::Turn::assistant(""));

    ChatResponse {
        session_id: session.key.clone(),
        reply,
        feedback_eligible: session.is_feedback_eligible(),
        error,
    }
}
