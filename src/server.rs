use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{api, state::AppState, ws};

/// All HTTP and WebSocket routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/polls", post(api::create_poll))
        .route("/polls/join", post(api::join_poll))
        .route("/polls/rejoin", post(api::rejoin_poll))
        .route("/polls/start", post(api::start_poll))
        .route("/polls/ws", get(ws::ws_handler))
        .route("/polls/{id}", get(api::get_poll))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
