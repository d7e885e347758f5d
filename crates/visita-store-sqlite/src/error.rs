//! Error type for `visita-store-sqlite`.

use thiserror::Error;
use visita_core::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule rejected the operation; nothing was written.
  #[error(transparent)]
  Core(#[from] visita_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl StoreError for Error {
  fn into_domain(self) -> Result<visita_core::Error, Self> {
    match self {
      Self::Core(e) => Ok(e),
      other => Err(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
