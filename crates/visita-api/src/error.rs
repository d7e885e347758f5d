//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use visita_engine::inbound::InboundError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("the x-username header is required")]
  MissingUser,

  #[error(transparent)]
  Engine(#[from] visita_engine::Error),

  #[error(transparent)]
  Inbound(#[from] InboundError),
}

fn domain_status(err: &visita_core::Error) -> StatusCode {
  use visita_core::Error as E;
  match err {
    E::Validation(_)
    | E::NotCompletable { .. }
    | E::NotCancellable { .. }
    | E::VisitorsClosed { .. }
    | E::NotACancellationCode(_)
    | E::CancellationCodeOnCompletion(_)
    | E::InvalidTimeRange { .. }
    | E::InvalidDateRange { .. }
    | E::VisitorNotOnVisit { .. } => StatusCode::BAD_REQUEST,
    E::TimeSlotOverlap { .. } | E::VisitOverlap { .. } | E::DuplicateLegacyId { .. } => {
      StatusCode::CONFLICT
    }
    E::VisitNotFound(_)
    | E::TimeSlotNotFound(_)
    | E::VisitSlotNotFound(_)
    | E::LegacyVisitSlotNotFound(_)
    | E::LegacyTimeSlotNotFound(_) => StatusCode::NOT_FOUND,
    E::UnknownCode { .. } | E::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use visita_engine::Error as E;
    match self {
      ApiError::MissingUser => StatusCode::UNAUTHORIZED,
      ApiError::Engine(E::Domain(e)) => domain_status(e),
      ApiError::Engine(E::UserNotFound(_)) => StatusCode::BAD_REQUEST,
      ApiError::Engine(E::Lookup(_)) => StatusCode::BAD_GATEWAY,
      ApiError::Engine(E::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::Inbound(InboundError::Malformed(_)) => StatusCode::BAD_REQUEST,
      // The delivering adapter redelivers on any 5xx.
      ApiError::Inbound(InboundError::Handler(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Validation failures keep every collected message.
  fn messages(&self) -> Vec<String> {
    match self {
      ApiError::Engine(visita_engine::Error::Domain(visita_core::Error::Validation(errors))) => {
        errors.messages().to_vec()
      }
      other => vec![other.to_string()],
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = json!({ "error": self.to_string(), "messages": self.messages() });
    (status, Json(body)).into_response()
  }
}
