use super::ApiResponse;
use crate::server::SharedState;
use axum::{extract::State, response::Json};

pub async fn status(State(state): State<SharedState>) -> Json<ApiResponse> {
    state.metrics.record_request("/api/status");
    Json(ApiResponse::success("Sign translation server is running"))
}
