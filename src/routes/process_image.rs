use super::ApiResponse;
use crate::{
    client::{API_ERROR_TEXT, ERROR_TEXT, NOT_CONFIGURED_TEXT},
    codec::{strip_header, CodecError},
    image_source::{SourceError, UploadSource},
    request::RequestError,
    server::SharedState,
    translator::{TranslationError, TranslationResult},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct ProcessImageRequest {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Error, Debug)]
pub enum ProcessImageError {
    #[error("No image data received")]
    NoImageData,
    #[error("Invalid request body")]
    InvalidBody(String),
    #[error("Image too large")]
    PayloadTooLarge,
    #[error("Invalid image data")]
    InvalidImage(String),
    #[error("{0}")]
    Internal(&'static str),
}

impl From<TranslationError> for ProcessImageError {
    fn from(err: TranslationError) -> Self {
        match err {
            TranslationError::Source(SourceError::Codec(CodecError::Decode(reason)))
            | TranslationError::Codec(CodecError::Decode(reason)) => {
                ProcessImageError::InvalidImage(reason)
            }
            TranslationError::Request(RequestError::InvalidInput(reason)) => {
                ProcessImageError::InvalidImage(reason)
            }
            TranslationError::Source(SourceError::Camera(_)) => {
                ProcessImageError::Internal("Camera unavailable")
            }
            TranslationError::Source(SourceError::Codec(_)) | TranslationError::Codec(_) => {
                ProcessImageError::Internal("Failed to encode image")
            }
        }
    }
}

impl IntoResponse for ProcessImageError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProcessImageError::NoImageData
            | ProcessImageError::InvalidBody(_)
            | ProcessImageError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ProcessImageError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProcessImageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        match &self {
            ProcessImageError::InvalidBody(detail) | ProcessImageError::InvalidImage(detail) => {
                tracing::warn!("Rejected image request: {}: {}", self, detail)
            }
            _ => tracing::warn!("Rejected image request: {}", self),
        }
        (status, Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

fn outcome_label(result: &TranslationResult) -> &'static str {
    match result.text.as_str() {
        NOT_CONFIGURED_TEXT => "not_configured",
        API_ERROR_TEXT => "api_error",
        ERROR_TEXT => "error",
        _ => "translated",
    }
}

#[instrument(skip_all)]
pub async fn process_image(
    State(state): State<SharedState>,
    payload: Result<Json<ProcessImageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, ProcessImageError> {
    state.metrics.record_request("/api/process-image");

    let Json(request) = payload.map_err(|e| match e.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ProcessImageError::PayloadTooLarge,
        _ => ProcessImageError::InvalidBody(e.body_text()),
    })?;
    let image = request.image.ok_or(ProcessImageError::NoImageData)?;

    let data = strip_header(&image);
    if data.trim().is_empty() {
        return Err(ProcessImageError::InvalidImage("empty payload".into()));
    }

    let started = Instant::now();
    let source = UploadSource::new(data, state.translator.codec());
    let outcome = state.translator.translate(&source).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(result) => {
            state
                .metrics
                .record_translation(outcome_label(&result), elapsed_ms);
            result
        }
        Err(e) => {
            state.metrics.record_translation("rejected", elapsed_ms);
            return Err(e.into());
        }
    };

    tracing::info!(
        confidence = result.confidence,
        elapsed_ms,
        "Translated image: {}",
        result.text
    );

    Ok(Json(
        ApiResponse::success("Image processed successfully").with_result(result.text),
    ))
}
