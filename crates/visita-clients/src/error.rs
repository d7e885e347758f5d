//! Error type for `visita-clients`.

use thiserror::Error;

/// A failure to ask a collaborator. "Not found" is never one of these.
#[derive(Debug, Error)]
pub enum ClientError {
  #[error("failed to build HTTP client: {0}")]
  Build(#[source] reqwest::Error),

  #[error("invalid base URL for {endpoint}: {url}")]
  BaseUrl { endpoint: &'static str, url: String },

  #[error("HTTP error calling {endpoint}: {source}")]
  Http {
    endpoint: String,
    source:   reqwest::Error,
  },

  #[error("{endpoint} returned {status}")]
  Status { endpoint: String, status: u16 },

  #[error("failed to deserialise response from {endpoint}: {source}")]
  Deserialization {
    endpoint: String,
    source:   reqwest::Error,
  },

  #[error("{0} is unavailable")]
  Unavailable(&'static str),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
