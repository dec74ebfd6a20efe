mod dashboard;
mod health;
mod static_files;
mod upload;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/upload", post(upload::upload))
        .route("/healthcheck", get(health::healthcheck))
        .route(
            "/static/detections/{filename}",
            get(static_files::detection_image),
        )
        .route("/static/uploads/{filename}", get(static_files::upload_image))
}
