//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated lowercase
//! strings, bodies as compact JSON, and unique-key values as their
//! canonical JSON encoding (so a numeric key and a string key can never
//! collide).

use chrono::{DateTime, Utc};
use registrar_core::{record::Record, schema::EntityKind};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String {
  id.hyphenated().to_string()
}

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Ok(Uuid::parse_str(s)?)
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── EntityKind ──────────────────────────────────────────────────────────────

pub fn encode_kind(kind: EntityKind) -> String {
  kind.to_string()
}

pub fn decode_kind(s: &str) -> Result<EntityKind> {
  s.parse()
    .map_err(|_| Error::Corrupt(format!("unknown entity kind: {s:?}")))
}

// ─── Unique keys ─────────────────────────────────────────────────────────────

/// Canonical single-column encoding of a unique-key value.
pub fn encode_key_value(value: &Value) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A row from `records` before decoding.
pub struct RawRecord {
  pub record_id:  String,
  pub kind:       String,
  pub body:       String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawRecord {
  pub fn into_record(self) -> Result<Record> {
    let body: Value = serde_json::from_str(&self.body)?;
    let Value::Object(body) = body else {
      return Err(Error::Corrupt(format!(
        "record {} body is not a JSON object",
        self.record_id
      )));
    };
    Ok(Record {
      id:         decode_uuid(&self.record_id)?,
      kind:       decode_kind(&self.kind)?,
      body,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
