use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use query_chat_core::config::ChatConfig;
use query_chat_core::feedback::Feedback;
use serde::Deserialize;
use tokio::sync::oneshot;

use crate::error::ApiError;
use crate::state::{AppState, ChatResponse, FeedbackResponse, ManagerCommand, SessionView};

const PAGE_TEMPLATE: &str = include_str!("../static/index.html");

/// Fill the page template with the configured title and caption
pub fn render_page(chat: &ChatConfig) -> String {
    PAGE_TEMPLATE
        .replace("{{title}}", &html_escape::encode_text(&chat.title))
        .replace("{{caption}}", &html_escape::encode_text(&chat.caption))
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenSessionRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: String,
    pub feedback: String,
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Send a command to the manager and wait for its answer
async fn ask_manager<T>(
    state: &AppState,
    build: impl FnOnce(oneshot::Sender<T>) -> ManagerCommand,
) -> Result<T, ApiError> {
    let (tx, rx) = oneshot::channel();
    if let Err(e) = state.api_tx.send(build(tx)).await {
        tracing::error!("Failed to send request to manager: {}", e);
        return Err(ApiError::Unavailable);
    }
    rx.await.map_err(|e| {
        tracing::error!("Failed to receive manager response: {}", e);
        ApiError::Unavailable
    })
}

pub async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(state.page.as_str().to_string())
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn open_session_handler(
    State(state): State<AppState>,
    payload: Option<Json<OpenSessionRequest>>,
) -> Result<Json<SessionView>, ApiError> {
    let session_id = payload
        .and_then(|Json(p)| p.session_id)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_session_id);

    let view = ask_manager(&state, |reply| ManagerCommand::OpenSession { session_id, reply }).await?;
    Ok(Json(view))
}

pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let id = session_id.clone();
    ask_manager(&state, |reply| ManagerCommand::GetSession { session_id, reply })
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("session '{}'", id)))
}

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }
    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_session_id);

    let response = ask_manager(&state, |reply| ManagerCommand::Chat {
        session_id,
        message: payload.message,
        reply,
    })
    .await?;

    // The placeholder reply is part of the transcript, so it goes back to
    // the client along with the failure status.
    let status = if response.error.is_some() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

pub async fn feedback_handler(
    State(state): State<AppState>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let feedback: Feedback = payload.feedback.parse()?;
    let session_id = payload.session_id;

    let response = ask_manager(&state, |reply| ManagerCommand::Feedback {
        session_id,
        feedback,
        reply,
    })
    .await??;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_page_escapes() {
        let chat = ChatConfig {
            title: "<b>Docs</b> & more".to_string(),
            ..ChatConfig::default()
        };
        let page = render_page(&chat);
        assert!(page.contains("&lt;b&gt;Docs&lt;/b&gt; &amp; more"));
        assert!(!page.contains("<b>Docs</b>"));
        assert!(!page.contains("{{title}}"));
        assert!(!page.contains("{{caption}}"));
    }
}
