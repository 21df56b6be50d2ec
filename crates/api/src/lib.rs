pub mod error;
pub mod routes;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = state.settings.app.max_upload_bytes;

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/voices", get(routes::voices::list))
        .route("/transcribe", post(routes::transcribe::transcribe))
        .route("/synthesize", post(routes::synthesize::synthesize))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
