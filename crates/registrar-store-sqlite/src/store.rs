//! [`SqliteStore`] — the SQLite implementation of [`RecordStore`].

use std::{collections::HashMap, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params, params_from_iter, types::Value as SqlValue};
use serde_json::Value;
use uuid::Uuid;

use registrar_core::{
  Error as CoreError,
  record::{Document, Filter, Record},
  schema::EntityKind,
  store::RecordStore,
};

use crate::{
  Error, Result,
  encode::{
    RawRecord, encode_dt, encode_key_value, encode_kind, encode_uuid,
  },
  schema::SCHEMA,
};

const SELECT_COLS: &str = "record_id, kind, body, created_at, updated_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A registrar record store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. Every
/// write runs in its own transaction so record rows and unique-key rows
/// move together.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Result of an insert/update transaction, carried out of the connection
/// thread so duplicate-key collisions keep their field name.
enum WriteOutcome<T> {
  Done(T),
  Duplicate { field: String, value: String },
  Corrupt(String),
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_inner(&self, kind: EntityKind, id: Uuid) -> Result<Option<Record>> {
    let kind_str = encode_kind(kind);
    let id_str = encode_uuid(id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SELECT_COLS} FROM records
                 WHERE kind = ?1 AND record_id = ?2"
              ),
              params![kind_str, id_str],
              row_to_raw,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn get_many_inner(
    &self,
    kind: EntityKind,
    ids: &[Uuid],
  ) -> Result<Vec<Record>> {
    if ids.is_empty() {
      return Ok(vec![]);
    }

    let kind_str = encode_kind(kind);
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let placeholders = (0..id_strs.len())
      .map(|i| format!("?{}", i + 2))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "SELECT {SELECT_COLS} FROM records
       WHERE kind = ?1 AND record_id IN ({placeholders})"
    );

    let bind: Vec<String> =
      std::iter::once(kind_str).chain(id_strs).collect();

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(bind.iter()), row_to_raw)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let by_id: HashMap<Uuid, Record> = raws
      .into_iter()
      .map(|raw| raw.into_record().map(|r| (r.id, r)))
      .collect::<Result<_>>()?;

    // Input order preserved; duplicate inputs yield duplicate outputs.
    Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
  }

  async fn find_inner(
    &self,
    kind: EntityKind,
    filter: &Filter,
  ) -> Result<Vec<Record>> {
    let (clause, extra) = compile_filter(filter)?;
    let sql = format!(
      "SELECT {SELECT_COLS} FROM records
       WHERE kind = ?1{clause}
       ORDER BY created_at, record_id"
    );

    let mut bind: Vec<SqlValue> = vec![SqlValue::Text(encode_kind(kind))];
    bind.extend(extra);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(bind.iter()), row_to_raw)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert_inner(
    &self,
    kind: EntityKind,
    body: Document,
  ) -> Result<Record> {
    let now = Utc::now();
    let record = Record {
      id: Uuid::new_v4(),
      kind,
      body,
      created_at: now,
      updated_at: now,
    };

    let kind_str = encode_kind(kind);
    let id_str = encode_uuid(record.id);
    let body_str = serde_json::to_string(&Value::Object(record.body.clone()))?;
    let at_str = encode_dt(now);
    let keys = unique_key_rows(kind, &record.body)?;

    let outcome: WriteOutcome<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO records (record_id, kind, body, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id_str, kind_str, body_str, at_str, at_str],
        )?;

        for (field, value) in &keys {
          let inserted = tx.execute(
            "INSERT INTO unique_keys (kind, field, key_value, record_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![kind_str, field, value, id_str],
          );
          match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
              // Transaction rolls back on drop; the record row goes with it.
              return Ok(WriteOutcome::Duplicate {
                field: field.clone(),
                value: value.clone(),
              });
            }
            Err(e) => return Err(e.into()),
          }
        }

        tx.commit()?;
        Ok(WriteOutcome::Done(()))
      })
      .await?;

    match outcome {
      WriteOutcome::Done(()) => Ok(record),
      WriteOutcome::Duplicate { field, value } => {
        Err(duplicate_key(kind, field, value))
      }
      WriteOutcome::Corrupt(reason) => Err(Error::Corrupt(reason)),
    }
  }

  async fn update_inner(
    &self,
    kind: EntityKind,
    id: Uuid,
    partial: Document,
  ) -> Result<Option<Record>> {
    let now = Utc::now();
    let kind_str = encode_kind(kind);
    let id_str = encode_uuid(id);
    let at_str = encode_dt(now);

    // Unique fields touched by this update: the old key row is dropped and,
    // for a non-null new value, a fresh row is inserted in the same
    // transaction.
    let touched_keys: Vec<(String, Option<String>)> = kind
      .unique_keys()
      .iter()
      .filter_map(|field| {
        partial.get(*field).map(|value| {
          let encoded = if value.is_null() {
            Ok(None)
          } else {
            encode_key_value(value).map(Some)
          };
          encoded.map(|e| ((*field).to_owned(), e))
        })
      })
      .collect::<Result<_>>()?;

    let outcome: WriteOutcome<Option<RawRecord>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<(String, String)> = tx
          .query_row(
            "SELECT body, created_at FROM records
             WHERE kind = ?1 AND record_id = ?2",
            params![kind_str, id_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        let Some((body_str, created_at_str)) = existing else {
          return Ok(WriteOutcome::Done(None));
        };

        let mut body: Document = match serde_json::from_str(&body_str) {
          Ok(Value::Object(map)) => map,
          Ok(_) => {
            return Ok(WriteOutcome::Corrupt(format!(
              "record {id_str} body is not a JSON object"
            )));
          }
          Err(e) => return Ok(WriteOutcome::Corrupt(e.to_string())),
        };

        // Keys present in the partial replace the stored value, explicit
        // nulls included; absent keys are retained. The envelope columns
        // own `id` and the timestamps, so a client echoing a read view back
        // cannot pollute the body with them.
        for (field, value) in partial {
          if matches!(field.as_str(), "id" | "createdAt" | "updatedAt") {
            continue;
          }
          body.insert(field, value);
        }

        for (field, new_value) in &touched_keys {
          tx.execute(
            "DELETE FROM unique_keys
             WHERE kind = ?1 AND field = ?2 AND record_id = ?3",
            params![kind_str, field, id_str],
          )?;
          if let Some(value) = new_value {
            let inserted = tx.execute(
              "INSERT INTO unique_keys (kind, field, key_value, record_id)
               VALUES (?1, ?2, ?3, ?4)",
              params![kind_str, field, value, id_str],
            );
            match inserted {
              Ok(_) => {}
              Err(e) if is_unique_violation(&e) => {
                return Ok(WriteOutcome::Duplicate {
                  field: field.clone(),
                  value: value.clone(),
                });
              }
              Err(e) => return Err(e.into()),
            }
          }
        }

        let new_body_str = match serde_json::to_string(&Value::Object(body)) {
          Ok(s) => s,
          Err(e) => return Ok(WriteOutcome::Corrupt(e.to_string())),
        };

        tx.execute(
          "UPDATE records SET body = ?3, updated_at = ?4
           WHERE kind = ?1 AND record_id = ?2",
          params![kind_str, id_str, new_body_str, at_str],
        )?;
        tx.commit()?;

        Ok(WriteOutcome::Done(Some(RawRecord {
          record_id:  id_str.clone(),
          kind:       kind_str.clone(),
          body:       new_body_str,
          created_at: created_at_str,
          updated_at: at_str.clone(),
        })))
      })
      .await?;

    match outcome {
      WriteOutcome::Done(raw) => raw.map(RawRecord::into_record).transpose(),
      WriteOutcome::Duplicate { field, value } => {
        Err(duplicate_key(kind, field, value))
      }
      WriteOutcome::Corrupt(reason) => Err(Error::Corrupt(reason)),
    }
  }

  async fn delete_inner(&self, kind: EntityKind, id: Uuid) -> Result<bool> {
    let kind_str = encode_kind(kind);
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM unique_keys WHERE kind = ?1 AND record_id = ?2",
          params![kind_str, id_str],
        )?;
        let rows = tx.execute(
          "DELETE FROM records WHERE kind = ?1 AND record_id = ?2",
          params![kind_str, id_str],
        )?;
        tx.commit()?;
        Ok(rows > 0)
      })
      .await?;

    Ok(deleted)
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  async fn get(
    &self,
    kind: EntityKind,
    id: Uuid,
  ) -> Result<Option<Record>, CoreError> {
    self.get_inner(kind, id).await.map_err(Into::into)
  }

  async fn get_many(
    &self,
    kind: EntityKind,
    ids: &[Uuid],
  ) -> Result<Vec<Record>, CoreError> {
    self.get_many_inner(kind, ids).await.map_err(Into::into)
  }

  async fn find(
    &self,
    kind: EntityKind,
    filter: &Filter,
  ) -> Result<Vec<Record>, CoreError> {
    self.find_inner(kind, filter).await.map_err(Into::into)
  }

  async fn insert(
    &self,
    kind: EntityKind,
    body: Document,
  ) -> Result<Record, CoreError> {
    self.insert_inner(kind, body).await.map_err(Into::into)
  }

  async fn update(
    &self,
    kind: EntityKind,
    id: Uuid,
    partial: Document,
  ) -> Result<Option<Record>, CoreError> {
    self.update_inner(kind, id, partial).await.map_err(Into::into)
  }

  async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<bool, CoreError> {
    self.delete_inner(kind, id).await.map_err(Into::into)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
  Ok(RawRecord {
    record_id:  row.get(0)?,
    kind:       row.get(1)?,
    body:       row.get(2)?,
    created_at: row.get(3)?,
    updated_at: row.get(4)?,
  })
}

/// Unique-key rows to register for a new record: one per schema-declared
/// key field that is present and non-null in the body.
fn unique_key_rows(
  kind: EntityKind,
  body: &Document,
) -> Result<Vec<(String, String)>> {
  kind
    .unique_keys()
    .iter()
    .filter_map(|field| {
      body
        .get(*field)
        .filter(|value| !value.is_null())
        .map(|value| {
          encode_key_value(value).map(|e| ((*field).to_owned(), e))
        })
    })
    .collect()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

fn duplicate_key(kind: EntityKind, field: String, value: String) -> Error {
  Error::Core(CoreError::DuplicateKey {
    kind,
    field,
    value: value.trim_matches('"').to_owned(),
  })
}

/// Only plain identifiers may be spliced into a JSON path.
fn checked_field(field: &str) -> Result<&str> {
  let ok = !field.is_empty()
    && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
  if ok {
    Ok(field)
  } else {
    Err(Error::InvalidField(field.to_owned()))
  }
}

fn bind_scalar(value: &Value) -> Result<SqlValue> {
  Ok(match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
    },
    Value::String(s) => SqlValue::Text(s.clone()),
    other => {
      return Err(Error::InvalidFilter(format!(
        "non-scalar comparison value: {other}"
      )));
    }
  })
}

/// Compile a [`Filter`] to a `WHERE` clause fragment (`?1` is the kind).
fn compile_filter(filter: &Filter) -> Result<(String, Vec<SqlValue>)> {
  Ok(match filter {
    Filter::All => (String::new(), vec![]),

    Filter::Eq { field, value } => {
      let field = checked_field(field)?;
      (
        format!(" AND json_extract(body, '$.{field}') = ?2"),
        vec![bind_scalar(value)?],
      )
    }

    // SQLite LIKE is case-insensitive for ASCII, matching the original's
    // case-insensitive regex search.
    Filter::Contains { field, text } => {
      let field = checked_field(field)?;
      (
        format!(" AND json_extract(body, '$.{field}') LIKE ?2"),
        vec![SqlValue::Text(format!("%{text}%"))],
      )
    }

    Filter::References { field, id } => {
      let field = checked_field(field)?;
      (
        format!(
          " AND ((json_type(body, '$.{field}') = 'array'
                  AND EXISTS (SELECT 1 FROM json_each(body, '$.{field}')
                              WHERE json_each.value = ?2))
                 OR json_extract(body, '$.{field}') = ?2)"
        ),
        vec![SqlValue::Text(encode_uuid(*id))],
      )
    }
  })
}
