//! Error type for `visita-engine`.

use thiserror::Error;
use visita_core::store::StoreError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule rejected the request. Nothing was written.
  #[error(transparent)]
  Domain(#[from] visita_core::Error),

  #[error("store failure: {0}")]
  Store(#[source] BoxError),

  /// A collaborator could not be asked. Never a "not found".
  #[error("lookup failed: {0}")]
  Lookup(#[source] BoxError),

  #[error("User {0} not found")]
  UserNotFound(String),
}

impl Error {
  /// Split a store failure into a domain rejection or an infrastructure
  /// fault.
  pub fn store<E: StoreError>(err: E) -> Self {
    match err.into_domain() {
      Ok(domain) => Self::Domain(domain),
      Err(other) => Self::Store(Box::new(other)),
    }
  }

  pub fn lookup<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Lookup(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
