// HTTP surface of the workbench

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::services::GcpProject;
use crate::utils::Metrics;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub project: Arc<GcpProject>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(project: GcpProject) -> Self {
        let metrics = project.metrics().clone();
        Self {
            project: Arc::new(project),
            metrics,
        }
    }
}

/// Count requests per matched route
async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(path) = req.extensions().get::<MatchedPath>() {
        state.metrics.record_endpoint_request(path.as_str());
    }
    next.run(req).await
}

/// Build the router with every endpoint, CORS and the upload body limit.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/stats", get(handlers::stats_endpoint))
        .route("/upload", post(handlers::upload_file))
        .route("/upload_multiple", post(handlers::upload_multiple))
        .route("/images", get(handlers::list_images))
        .route("/uploads/:filename", get(handlers::uploaded_file))
        .route("/add_gcp", post(handlers::add_gcp))
        .route("/get_gcps/:image_name", get(handlers::get_gcps))
        .route("/create_gcp", post(handlers::create_gcp))
        .route("/get_all_gcps", get(handlers::get_all_gcps))
        .route("/download_csv", get(handlers::download_csv))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
}
