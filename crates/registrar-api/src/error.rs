//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use registrar_core::Error as CoreError;
use serde_json::{Value, json};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized")]
  Unauthorized,

  #[error("internal error: {0}")]
  Internal(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, json!({ "error": m }))
      }
      ApiError::Unauthorized => {
        (StatusCode::UNAUTHORIZED, json!({ "error": "unauthorized" }))
      }
      ApiError::Internal(m) => {
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": m }))
      }
      ApiError::Core(e) => core_response(e),
    };
    (status, Json(body)).into_response()
  }
}

/// Map the core taxonomy onto HTTP statuses.
///
/// Conflict responses carry the offending field or the referrer list so the
/// caller can resolve them manually.
fn core_response(e: &CoreError) -> (StatusCode, Value) {
  match e {
    CoreError::NotFound { .. } => {
      (StatusCode::NOT_FOUND, json!({ "error": e.to_string() }))
    }
    CoreError::DuplicateKey { field, .. } => (
      StatusCode::CONFLICT,
      json!({ "error": e.to_string(), "field": field }),
    ),
    CoreError::ReferentialConflict { referrers, .. } => (
      StatusCode::CONFLICT,
      json!({ "error": e.to_string(), "referrers": referrers }),
    ),
    CoreError::DanglingReference { .. } => (
      StatusCode::UNPROCESSABLE_ENTITY,
      json!({ "error": e.to_string() }),
    ),
    CoreError::UnknownField { .. } | CoreError::Validation(_) => {
      (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
    }
    CoreError::Unavailable(_) => {
      (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": e.to_string() }))
    }
    CoreError::Serialization(_) => (
      StatusCode::INTERNAL_SERVER_ERROR,
      json!({ "error": e.to_string() }),
    ),
  }
}
