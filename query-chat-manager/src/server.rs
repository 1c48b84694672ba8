use axum::{
    routing::{get, post},
    Router,
};
use query_chat_core::config::ChatConfig;
use query_chat_core::engine::QueryEngine;
use query_chat_core::feedback::FeedbackStore;
use query_chat_core::session::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    chat_handler, feedback_handler, get_session_handler, health_handler, index_handler,
    open_session_handler, render_page,
};
use crate::manager::Manager;
use crate::state::AppState;

/// Queue depth between the HTTP handlers and the manager task
const COMMAND_BUFFER: usize = 64;

/// Spawn the manager task and return the state the router needs
pub fn start_manager(
    engine: Arc<dyn QueryEngine>,
    feedback: Arc<dyn FeedbackStore>,
    sessions: SessionManager,
    chat: &ChatConfig,
) -> (AppState, JoinHandle<anyhow::Result<()>>) {
    let (api_tx, api_rx) = mpsc::channel(COMMAND_BUFFER);
    let manager = Manager::new(api_rx, engine, feedback, sessions);
    let handle = tokio::spawn(manager.run());

    let state = AppState {
        api_tx,
        page: Arc::new(render_page(chat)),
    };
    (state, handle)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/sessions", post(open_session_handler))
        .route("/api/sessions/:id", get(get_session_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/feedback", post(feedback_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            tracing::info!("Server shutting down signal received");
        })
        .await?;

    Ok(())
}
