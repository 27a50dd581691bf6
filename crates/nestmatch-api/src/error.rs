//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error renders as `{"error": <code>, "message": <text>}`. Store
//! failures are logged and replaced with a generic message so storage details
//! never reach the client.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use nestmatch_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthorized,

  #[error("too many requests")]
  RateLimited,

  /// Concurrent updates kept winning; the client may retry.
  #[error("the request conflicted with a concurrent update")]
  Conflict,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Domain(#[from] CoreError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// HTTP status and stable machine-readable code.
  pub fn status_and_code(&self) -> (StatusCode, &'static str) {
    match self {
      Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
      Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
      Self::Conflict => (StatusCode::CONFLICT, "conflict"),
      Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation_error"),
      Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
      Self::Domain(e) => match e {
        CoreError::AlreadyInHousehold => (StatusCode::CONFLICT, "already_in_household"),
        CoreError::NotInHousehold => (StatusCode::CONFLICT, "not_in_household"),
        CoreError::InvitationNotFound => (StatusCode::NOT_FOUND, "invitation_not_found"),
        CoreError::InvitationExpired => (StatusCode::GONE, "invitation_expired"),
        CoreError::InvitationAlreadyResolved => {
          (StatusCode::CONFLICT, "invitation_already_resolved")
        }
        CoreError::MustLeaveHouseholdFirst => {
          (StatusCode::CONFLICT, "must_leave_household_first")
        }
        CoreError::NotDisputed => (StatusCode::CONFLICT, "not_disputed"),
        CoreError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        e if e.is_validation() => (StatusCode::BAD_REQUEST, "validation_error"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = self.status_and_code();
    let message = if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
      "internal server error".to_owned()
    } else {
      self.to_string()
    };
    (status, Json(json!({ "error": code, "message": message }))).into_response()
  }
}
