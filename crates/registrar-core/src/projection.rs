//! Read-time reference projection.
//!
//! Projection replaces reference-field ids on a record with the resolved
//! target objects, following a recursive [`ProjectionSpec`]. A missing
//! target resolves to null (scalar) or is omitted (sequence); only a
//! missing *primary* record is an error. Projection is a view over the
//! store: it never mutates the records it resolves, and two calls with no
//! intervening writes produce identical output.

use std::{collections::HashMap, future::Future, pin::Pin};

use serde_json::Value;
use uuid::Uuid;

use crate::{
  Error, Result,
  record::{Filter, Record},
  schema::{EntityKind, RefArity},
  store::RecordStore,
};

/// Bounded retry count for idempotent reads that fail with
/// [`Error::Unavailable`]. Writes are never retried.
const READ_RETRIES: usize = 2;

// ─── Spec ────────────────────────────────────────────────────────────────────

/// A recursive tree of reference field names to resolve.
#[derive(Debug, Clone, Default)]
pub struct ProjectionSpec {
  pub fields: Vec<FieldSpec>,
}

/// One reference field to resolve, with the spec applied to its target.
#[derive(Debug, Clone)]
pub struct FieldSpec {
  pub name:   &'static str,
  pub nested: ProjectionSpec,
}

impl ProjectionSpec {
  /// Resolve nothing; records pass through unprojected.
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  /// Add a field whose target is embedded unprojected.
  pub fn field(self, name: &'static str) -> Self {
    self.field_with(name, Self::empty())
  }

  /// Add a field whose resolved target is itself projected with `nested`.
  pub fn field_with(mut self, name: &'static str, nested: Self) -> Self {
    self.fields.push(FieldSpec { name, nested });
    self
  }

  /// The full populate chain for `kind`, derived from the schema registry.
  ///
  /// Recurses into target kinds (the reference graph is acyclic), so a
  /// Student spec resolves subjects, yearsems and the user, and the user's
  /// role one level further down.
  pub fn default_for(kind: EntityKind) -> Self {
    let mut spec = Self::empty();
    for rf in kind.reference_fields() {
      spec.fields.push(FieldSpec {
        name:   rf.field,
        nested: Self::default_for(rf.target),
      });
    }
    spec
  }
}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Resolve `spec` against `record`, returning the denormalised JSON view.
///
/// Reference fields named by the spec are replaced in the view; all other
/// fields pass through untouched. The stored record keeps its raw ids.
pub async fn project<S: RecordStore>(
  store:  &S,
  record: &Record,
  spec:   &ProjectionSpec,
) -> Result<Value> {
  let mut view = record.to_document();

  for fs in &spec.fields {
    let rf = record.kind.reference_field(fs.name).ok_or_else(|| {
      Error::UnknownField { kind: record.kind, field: fs.name.to_owned() }
    })?;

    let raw = view.get(fs.name).cloned().unwrap_or(Value::Null);
    let resolved = match rf.arity {
      RefArity::Scalar => {
        resolve_scalar(store, rf.target, &raw, &fs.nested).await?
      }
      RefArity::Sequence => {
        resolve_sequence(store, rf.target, &raw, &fs.nested).await?
      }
    };
    view.insert(fs.name.to_owned(), resolved);
  }

  Ok(Value::Object(view))
}

/// Project a single record fetched by id.
///
/// Fails with [`Error::NotFound`] only if the primary record is absent; a
/// missing referenced record is absorbed per the tolerant-read policy.
pub async fn project_one<S: RecordStore>(
  store: &S,
  kind:  EntityKind,
  id:    Uuid,
  spec:  &ProjectionSpec,
) -> Result<Value> {
  let record = get_with_retry(store, kind, id)
    .await?
    .ok_or(Error::NotFound { kind, id })?;
  project(store, &record, spec).await
}

/// Project every record of `kind` matching `filter`.
pub async fn project_many<S: RecordStore>(
  store:  &S,
  kind:   EntityKind,
  filter: &Filter,
  spec:   &ProjectionSpec,
) -> Result<Vec<Value>> {
  let records = find_with_retry(store, kind, filter).await?;
  let mut out = Vec::with_capacity(records.len());
  for record in &records {
    out.push(project(store, record, spec).await?);
  }
  Ok(out)
}

// ─── Field resolution ────────────────────────────────────────────────────────

async fn resolve_scalar<S: RecordStore>(
  store:  &S,
  target: EntityKind,
  raw:    &Value,
  nested: &ProjectionSpec,
) -> Result<Value> {
  let Some(id) = ref_id(raw)? else {
    return Ok(Value::Null);
  };
  match get_with_retry(store, target, id).await? {
    Some(record) => embed(store, &record, nested).await,
    // Dangling reference: tolerated on read, resolved to null.
    None => Ok(Value::Null),
  }
}

async fn resolve_sequence<S: RecordStore>(
  store:  &S,
  target: EntityKind,
  raw:    &Value,
  nested: &ProjectionSpec,
) -> Result<Value> {
  let ids = ref_ids(raw)?;
  if ids.is_empty() {
    return Ok(Value::Array(vec![]));
  }

  // One batched fetch per sequence field, not one round trip per element.
  let fetched = get_many_with_retry(store, target, &ids).await?;
  let by_id: HashMap<Uuid, Record> =
    fetched.into_iter().map(|r| (r.id, r)).collect();

  // Input order preserved, duplicates included, missing entries omitted.
  let mut out = Vec::with_capacity(ids.len());
  for id in &ids {
    if let Some(record) = by_id.get(id) {
      out.push(embed(store, record, nested).await?);
    }
  }
  Ok(Value::Array(out))
}

/// Embed a resolved target, recursively applying `nested`.
///
/// Boxed to break the `project` → `resolve_*` → `embed` future cycle.
fn embed<'a, S: RecordStore>(
  store:  &'a S,
  record: &'a Record,
  nested: &'a ProjectionSpec,
) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
  Box::pin(async move {
    if nested.is_empty() {
      Ok(record.to_value())
    } else {
      project(store, record, nested).await
    }
  })
}

// ─── Reference id parsing ────────────────────────────────────────────────────

/// Parse a scalar reference value: null or absent is `None`; a uuid string
/// is the id; anything else is malformed.
pub(crate) fn ref_id(raw: &Value) -> Result<Option<Uuid>> {
  match raw {
    Value::Null => Ok(None),
    Value::String(s) => Uuid::parse_str(s).map(Some).map_err(|_| {
      Error::Validation(format!("malformed reference id: {s:?}"))
    }),
    other => Err(Error::Validation(format!(
      "expected a reference id string, got {other}"
    ))),
  }
}

/// Parse a sequence reference value; null entries are rejected.
pub(crate) fn ref_ids(raw: &Value) -> Result<Vec<Uuid>> {
  match raw {
    Value::Null => Ok(vec![]),
    Value::Array(items) => items
      .iter()
      .map(|item| {
        ref_id(item)?.ok_or_else(|| {
          Error::Validation("null entry in reference sequence".to_owned())
        })
      })
      .collect(),
    other => Err(Error::Validation(format!(
      "expected a reference id sequence, got {other}"
    ))),
  }
}

// ─── Read retries ────────────────────────────────────────────────────────────

// Reads are idempotent, so a transient failure is retried in place a
// bounded number of times. Writes never pass through these helpers.

async fn get_with_retry<S: RecordStore>(
  store: &S,
  kind:  EntityKind,
  id:    Uuid,
) -> Result<Option<Record>> {
  let mut attempt = 0;
  loop {
    match store.get(kind, id).await {
      Err(Error::Unavailable(_)) if attempt < READ_RETRIES => attempt += 1,
      other => return other,
    }
  }
}

async fn get_many_with_retry<S: RecordStore>(
  store: &S,
  kind:  EntityKind,
  ids:   &[Uuid],
) -> Result<Vec<Record>> {
  let mut attempt = 0;
  loop {
    match store.get_many(kind, ids).await {
      Err(Error::Unavailable(_)) if attempt < READ_RETRIES => attempt += 1,
      other => return other,
    }
  }
}

async fn find_with_retry<S: RecordStore>(
  store:  &S,
  kind:   EntityKind,
  filter: &Filter,
) -> Result<Vec<Record>> {
  let mut attempt = 0;
  loop {
    match store.find(kind, filter).await {
      Err(Error::Unavailable(_)) if attempt < READ_RETRIES => attempt += 1,
      other => return other,
    }
  }
}
