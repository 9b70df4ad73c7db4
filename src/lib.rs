pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod templates;
pub mod utils;

use crate::config::UploadConfig;
use crate::services::storage::StorageService;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::get,
};
use std::sync::Arc;
use utoipa::OpenApi;

/// Headroom on top of `max_file_size` for multipart boundaries and part headers
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_form,
        api::handlers::upload::upload_file,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "upload", description = "Upload form and file upload"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageService>,
    pub config: UploadConfig,
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = match state.config.max_file_size {
        Some(max) => DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD)),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route(
            "/",
            get(api::handlers::upload::upload_form).post(api::handlers::upload::upload_file),
        )
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(body_limit)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
