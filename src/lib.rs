//! IDPro: turns one portrait into passport, visa, ID card and CV photos by fanning
//! generation requests out to Gemini and tracking each style's outcome.

pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod gemini;
pub mod models;
pub mod routes;
pub mod store;
pub mod view;

use axum::{Router, extract::DefaultBodyLimit, routing::{get, post, put}};
use tower::ServiceBuilder;
use tower_http::cors::{CorsLayer, Any};

use routes::{
    create_session, delete_session, download_style, generate_all, get_session, list_styles,
    retry_style, session_events, upload_image, AppState,
};

/// Largest accepted portrait upload.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/styles", get(list_styles))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/image", put(upload_image))
        .route("/api/sessions/:id/generate", post(generate_all))
        .route("/api/sessions/:id/styles/:style/retry", post(retry_style))
        .route("/api/sessions/:id/styles/:style/download", get(download_style))
        .route("/api/sessions/:id/events", get(session_events))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any)
                ),
        )
        .with_state(state)
}
