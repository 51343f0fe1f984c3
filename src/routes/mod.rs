mod metrics;
mod process_image;
mod status;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;

pub use metrics::metrics_handler;
pub use process_image::process_image;
pub use status::status;

/// `{status, message, result?}` body shared by every API route.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
            result: None,
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            result: None,
        }
    }
}

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/process-image", post(process_image))
        .route("/metrics", get(metrics_handler))
}
