//! The record envelope and the filter language accepted by
//! [`RecordStore::find`](crate::store::RecordStore::find).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::schema::EntityKind;

/// A JSON document body: field name to value.
pub type Document = Map<String, Value>;

/// A stored entity record.
///
/// `body` holds the domain fields exactly as written; reference fields store
/// raw ids (strings for scalars, arrays of strings for sequences).
/// Timestamps are store-assigned.
#[derive(Debug, Clone)]
pub struct Record {
  pub id:         Uuid,
  pub kind:       EntityKind,
  pub body:       Document,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Record {
  /// The serialisable document view of the record: body fields beside `id`,
  /// `createdAt` and `updatedAt`, with schema-redacted fields removed.
  pub fn to_document(&self) -> Document {
    let mut out = self.body.clone();
    for field in self.kind.redacted_fields() {
      out.remove(*field);
    }
    out.insert("id".to_owned(), Value::String(self.id.to_string()));
    out.insert(
      "createdAt".to_owned(),
      Value::String(self.created_at.to_rfc3339()),
    );
    out.insert(
      "updatedAt".to_owned(),
      Value::String(self.updated_at.to_rfc3339()),
    );
    out
  }

  /// [`Record::to_document`] as a [`Value`].
  pub fn to_value(&self) -> Value {
    Value::Object(self.to_document())
  }
}

impl Serialize for Record {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    self.to_value().serialize(serializer)
  }
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Filter language for [`RecordStore::find`](crate::store::RecordStore::find).
#[derive(Debug, Clone)]
pub enum Filter {
  /// Every record of the kind.
  All,
  /// Exact scalar equality on a body field.
  Eq { field: String, value: Value },
  /// Case-insensitive substring match on a string body field.
  Contains { field: String, text: String },
  /// Records whose `field` references `id`: scalar equality or sequence
  /// membership.
  References { field: String, id: Uuid },
}
