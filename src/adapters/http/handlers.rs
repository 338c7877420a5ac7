use super::AppState;
use crate::domain::error::JobError;
use crate::domain::jobs::{JobReport, JobRequest};
use crate::ports::codec::CodecTool;
use crate::ports::source::SourceFetcher;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const SERVICE_NAME: &str = "splitdrop";
pub const SPLIT_ROUTE: &str = "/split-audio-upload";

pub async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": SERVICE_NAME,
        "endpoints": [SPLIT_ROUTE],
    }))
}

pub async fn split_audio_upload<C, F>(
    State(state): State<Arc<AppState<C, F>>>,
    body: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<JobReport>, ApiError>
where
    C: CodecTool + 'static,
    F: SourceFetcher + 'static,
{
    let Json(request) =
        body.map_err(|e| JobError::Validation(format!("Invalid JSON body: {}", e.body_text())))?;
    let (job, token) = request.into_job()?;

    let store = state.store_for(&token);
    let report = state.service.run(&job, &store).await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    category: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

/// A failed job rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub JobError);

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            JobError::Validation(_) => StatusCode::BAD_REQUEST,
            JobError::DestinationExhausted { .. } => StatusCode::CONFLICT,
            JobError::Upload { .. } => StatusCode::BAD_GATEWAY,
            JobError::Acquisition { .. } | JobError::Encode { .. } | JobError::Scratch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let err = self.0;

        let mut body = ErrorResponse {
            error: err.to_string(),
            category: err.category(),
            detail: err.detail(),
            url: None,
            dest_root: None,
            path: None,
        };
        match err {
            JobError::Acquisition { url, .. } => body.url = Some(url),
            JobError::DestinationExhausted { dest_root } => body.dest_root = Some(dest_root),
            JobError::Upload { path, .. } => body.path = Some(path),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
