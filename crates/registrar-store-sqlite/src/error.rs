//! Error type for `registrar-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] registrar_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row that no longer decodes (wrong kind tag, non-object body).
  #[error("corrupt row: {0}")]
  Corrupt(String),

  /// A filter or key field name that is not a plain identifier; rejected
  /// before it can reach a SQL JSON path.
  #[error("invalid field name: {0:?}")]
  InvalidField(String),

  #[error("invalid filter: {0}")]
  InvalidFilter(String),
}

/// Collapse backend errors onto the shared taxonomy at the trait boundary.
impl From<Error> for registrar_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      Error::Json(inner) => Self::Serialization(inner),
      Error::InvalidField(field) => {
        Self::Validation(format!("invalid field name: {field:?}"))
      }
      Error::InvalidFilter(reason) => {
        Self::Validation(format!("invalid filter: {reason}"))
      }
      other => Self::Unavailable(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
