//! Error types for `registrar-core`.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::schema::EntityKind;

/// A record that still references an entity targeted for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Referrer {
  pub kind:  EntityKind,
  pub id:    Uuid,
  /// The reference field on the referring record that holds the target id.
  pub field: &'static str,
}

#[derive(Debug, Error)]
pub enum Error {
  /// The primary record of an operation does not exist. A missing
  /// *referenced* record is never reported through this variant; reads
  /// tolerate dangling references.
  #[error("{kind} {id} not found")]
  NotFound { kind: EntityKind, id: Uuid },

  /// A domain key collided with an existing record of the same kind.
  #[error("duplicate {kind} key {field}: {value}")]
  DuplicateKey {
    kind:  EntityKind,
    field: String,
    value: String,
  },

  /// A strict-mode create or update supplied a reference id that names no
  /// existing record.
  #[error("field {field:?} references nonexistent {target} {id}")]
  DanglingReference {
    field:  String,
    target: EntityKind,
    id:     Uuid,
  },

  /// A restrict-policy delete was blocked by live referrers.
  #[error("cannot delete {kind} {id}: referenced by {} record(s)", referrers.len())]
  ReferentialConflict {
    kind:      EntityKind,
    id:        Uuid,
    referrers: Vec<Referrer>,
  },

  /// A projection spec or filter named a field the schema does not declare
  /// as a reference field of the kind.
  #[error("{kind} has no reference field {field:?}")]
  UnknownField { kind: EntityKind, field: String },

  #[error("validation error: {0}")]
  Validation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Transient storage failure. Idempotent reads may be retried; writes are
  /// surfaced immediately.
  #[error("storage unavailable: {0}")]
  Unavailable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
