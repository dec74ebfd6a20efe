use crate::server::SharedState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum StaticFileError {
    #[error("invalid filename")]
    InvalidFilename,
    #[error("file not found")]
    NotFound,
    #[error("Http builder error: {0}")]
    HttpBuilder(String),
}

impl IntoResponse for StaticFileError {
    fn into_response(self) -> Response {
        let status = match self {
            StaticFileError::InvalidFilename => StatusCode::BAD_REQUEST,
            StaticFileError::NotFound => StatusCode::NOT_FOUND,
            StaticFileError::HttpBuilder(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

async fn serve_image(dir: PathBuf, filename: &str) -> Result<Response, StaticFileError> {
    if filename.contains(['/', '\\']) || filename.contains("..") {
        return Err(StaticFileError::InvalidFilename);
    }

    let bytes = tokio::fs::read(dir.join(filename))
        .await
        .map_err(|_| StaticFileError::NotFound)?;

    Response::builder()
        .header(header::CONTENT_TYPE, "image/jpeg")
        .body(Body::from(bytes))
        .map_err(|e| StaticFileError::HttpBuilder(e.to_string()))
}

#[instrument(skip(state))]
pub async fn detection_image(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, StaticFileError> {
    serve_image(state.storage.detection_dir(), &filename).await
}

#[instrument(skip(state))]
pub async fn upload_image(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, StaticFileError> {
    serve_image(state.storage.upload_dir(), &filename).await
}
