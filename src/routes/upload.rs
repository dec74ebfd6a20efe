use crate::{pipeline::PipelineError, server::SharedState};
use axum::{
    extract::{
        multipart::{Multipart, MultipartError},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No image uploaded")]
    MissingImage,
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

#[derive(Serialize)]
struct UploadErrorBody {
    error: String,
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            UploadError::MissingImage | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
            UploadError::Pipeline(PipelineError::Decode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("upload failed: {}", self);
        }
        (
            status,
            Json(UploadErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
pub struct UploadResponse {
    status: String,
    detected_image: String,
    objects: Vec<String>,
    timestamp: String,
    time: String,
    date: String,
}

#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    let mut image_data = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            image_data = Some(field.bytes().await?);
            break;
        }
    }
    let image_data = image_data.ok_or(UploadError::MissingImage)?;

    let summary = state.pipeline.process(&image_data).await?;

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        detected_image: summary.detected_image,
        objects: summary.objects,
        timestamp: summary.timestamp,
        time: summary.time_display,
        date: summary.date_display,
    }))
}
