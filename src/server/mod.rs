//! HTTP and websocket host for the alert engine.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::alerts::{AlertPreferences, SmartAlertEngine};
use crate::delivery::BroadcastChannel;
use crate::game::GameState;
use crate::probability::ProbabilityError;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SmartAlertEngine>,
    pub realtime: BroadcastChannel,
}

/// Body of `POST /api/games/update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameUpdateRequest {
    pub state: GameState,
    pub preferences: AlertPreferences,
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub user_id: Option<String>,
}

/// Build the Axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/games/update", post(game_update_handler))
        .route("/api/games/:game_id", delete(clear_game_handler))
        .route("/api/win-probability", post(win_probability_handler))
        .route("/api/alerts", get(alerts_handler))
        .route("/api/alerts/delivered", delete(clear_delivered_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

fn probability_error(e: ProbabilityError) -> (StatusCode, String) {
    match e {
        ProbabilityError::UnsupportedSport(_) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}

/// GET /health
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "trackedGames": state.engine.tracked_games().await,
        "subscribers": state.realtime.subscriber_count(),
    }))
}

/// POST /api/games/update
async fn game_update_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GameUpdateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .engine
        .process_game_update(&req.state, &req.preferences)
        .await
        .map(Json)
        .map_err(probability_error)
}

/// POST /api/win-probability
async fn win_probability_handler(
    State(state): State<Arc<AppState>>,
    Json(game): Json<GameState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .engine
        .factory()
        .calculate(&game)
        .map(Json)
        .map_err(probability_error)
}

/// DELETE /api/games/:game_id
async fn clear_game_handler(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
) -> StatusCode {
    state.engine.clear_game_history(&game_id).await;
    StatusCode::NO_CONTENT
}

/// GET /api/alerts
async fn alerts_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.get_alert_queue().await)
}

/// DELETE /api/alerts/delivered
async fn clear_delivered_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let removed = state.engine.clear_delivered_alerts().await;
    Json(serde_json::json!({ "removed": removed }))
}

/// GET /ws?user_id=...
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
) -> Response {
    ws.on_upgrade(move |socket| stream_alerts(socket, state, params.user_id))
}

async fn stream_alerts(socket: WebSocket, state: Arc<AppState>, user_id: Option<String>) {
    let mut rx = state.realtime.subscribe();
    let (mut sink, mut incoming) = socket.split();
    info!(
        "Realtime subscriber connected (user filter: {})",
        user_id.as_deref().unwrap_or("none")
    );

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(alert) => {
                    if user_id.as_deref().is_some_and(|u| u != alert.user_id) {
                        continue;
                    }
                    let text = match serde_json::to_string(alert.as_ref()) {
                        Ok(t) => t,
                        Err(e) => {
                            warn!("Failed to encode alert {}: {}", alert.id, e);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Realtime subscriber lagged, {} alert(s) skipped", n);
                }
                Err(RecvError::Closed) => break,
            },
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Realtime subscriber disconnected");
}
