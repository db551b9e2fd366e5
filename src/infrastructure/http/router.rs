use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::infrastructure::http::controllers;
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::realtime::chat_socket;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(controllers::health))
        .route("/chat/:namespace", get(chat_socket))
        .route(
            "/api/widget/:tenant_id/config",
            get(controllers::get_widget_config),
        )
        .route(
            "/api/agents/invitations/accept",
            post(controllers::accept_invite),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
