use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::assistant::Assistant;

pub struct AppState {
    pub assistant: Assistant,
}

pub fn create_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes = Router::new().route("/health", get(handlers::health));

    Router::new()
        .route("/", get(handlers::root))
        .route("/process_voice", post(handlers::process_voice))
        .route("/audio/:filename", get(handlers::get_audio))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
