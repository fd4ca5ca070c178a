//! Outcome to HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::records::{Outcome, OutcomeKind};
use crate::web::types::ApiResponse;

/// Kind of endpoint an outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Collection read; an empty result is still a 200.
    List,
    /// Single-entity read; an empty result is a 404.
    Fetch,
    Create,
    Update,
    Delete,
}

/// Status code for an outcome at a given endpoint.
pub fn status_for(endpoint: Endpoint, ok: bool, kind: OutcomeKind) -> StatusCode {
    if ok {
        return match endpoint {
            Endpoint::List | Endpoint::Fetch | Endpoint::Update => StatusCode::OK,
            Endpoint::Create => StatusCode::CREATED,
            Endpoint::Delete => StatusCode::NO_CONTENT,
        };
    }
    match kind {
        OutcomeKind::NotFound if endpoint == Endpoint::List => StatusCode::OK,
        OutcomeKind::NotFound => StatusCode::NOT_FOUND,
        OutcomeKind::WriteRejected => StatusCode::BAD_REQUEST,
        OutcomeKind::ReadBackFailed | OutcomeKind::StoreFailure | OutcomeKind::Success => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Render an outcome as an enveloped response. A successful delete has no body.
pub fn respond<T: Serialize>(endpoint: Endpoint, outcome: Outcome<T>) -> Response {
    let status = status_for(endpoint, outcome.ok, outcome.kind);
    if status == StatusCode::NO_CONTENT {
        return status.into_response();
    }
    if status.is_server_error() {
        tracing::error!(status = status.as_u16(), message = %outcome.message, "Request failed");
    }
    (
        status,
        Json(ApiResponse {
            success: outcome.ok,
            message: outcome.message,
            data: outcome.data,
        }),
    )
        .into_response()
}

/// 400 with the envelope; used for input rejected before any store access.
pub fn validation_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// A failure envelope with `data: null` under any status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    tracing::debug!(status = status.as_u16(), %message, "Rejected request");
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            message,
            data: None,
        }),
    )
        .into_response()
}
