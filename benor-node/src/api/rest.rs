use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use benor_common::{Message, NodeState, NodeStatus};
use benor_consensus::{ConsensusError, ConsensusNode, Diagnostics};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::Result;

#[derive(Clone)]
pub struct AppState {
    pub node: Arc<ConsensusNode>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_api))
        .route("/message", post(message_api))
        .route("/start", get(start_api))
        .route("/stop", get(stop_api))
        .route("/getState", get(get_state_api))
        .route("/diagnostics", get(diagnostics_api))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
}

/// Serves the control surface of one node on an already bound listener
/// until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let node = state.node.id();
    info!(node = %node, addr = %listener.local_addr()?, "control surface listening");
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

async fn status_api(State(state): State<AppState>) -> (StatusCode, String) {
    let status = state.node.status();
    let code = match status {
        NodeStatus::Live => StatusCode::OK,
        NodeStatus::Faulty => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, status.to_string())
}

async fn message_api(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Message>, JsonRejection>,
) -> (StatusCode, String) {
    let message = match payload {
        Ok(Json(message)) => message,
        Err(rejection) => {
            state.node.record_rejection(&rejection.body_text());
            return (StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match state.node.handle_inbound(message).await {
        Ok(()) => (StatusCode::OK, "received".to_string()),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn start_api(State(state): State<AppState>) -> (StatusCode, String) {
    // The loop runs on its own task so a client hanging up does not
    // abandon it halfway through a round.
    let node = Arc::clone(&state.node);
    match tokio::spawn(async move { node.start().await }).await {
        Ok(Ok(outcome)) => (StatusCode::OK, outcome.to_string()),
        Ok(Err(e @ ConsensusError::AlreadyRunning(_))) => (StatusCode::CONFLICT, e.to_string()),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => {
            error!(node = %state.node.id(), error = %e, "round loop task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn stop_api(State(state): State<AppState>) -> &'static str {
    state.node.stop().await;
    "success"
}

async fn get_state_api(State(state): State<AppState>) -> Json<NodeState> {
    Json(state.node.get_state().await)
}

async fn diagnostics_api(State(state): State<AppState>) -> Json<Diagnostics> {
    Json(state.node.diagnostics().await)
}
