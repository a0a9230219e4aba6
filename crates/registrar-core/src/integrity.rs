//! Write-side referential integrity.
//!
//! Two enforcement points: reference validation on create/update
//! ([`check_on_create`]) and policy-driven delete protection
//! ([`delete_with_integrity`]). Both are driven by the schema registry, so
//! adding a reference field to the schema extends enforcement without any
//! per-route code.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoEnumIterator as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  error::Referrer,
  projection::{ref_id, ref_ids},
  record::{Document, Filter},
  schema::{EntityKind, RefArity, ReferenceField},
  store::RecordStore,
};

// ─── Policies ────────────────────────────────────────────────────────────────

/// What to do when a delete target is still referenced elsewhere.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
  /// Reject the delete with [`Error::ReferentialConflict`], naming the
  /// referrers so the caller can resolve them.
  #[default]
  Restrict,
  /// Delete, then strip the id from every referrer: scalar fields set to
  /// null, sequence fields filtered.
  CascadeNull,
}

/// Whether reference ids supplied on create/update must name existing
/// records.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
  /// Historical behavior: arbitrary well-formed ids are accepted.
  #[default]
  Permissive,
  /// Every supplied reference id must name an existing record.
  Strict,
}

/// Integrity configuration threaded through the write path.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct IntegrityConfig {
  #[serde(default)]
  pub delete_policy:    DeletePolicy,
  #[serde(default)]
  pub reference_policy: ReferencePolicy,
}

// ─── Create-time validation ──────────────────────────────────────────────────

/// Validate the reference fields of a create or update payload.
///
/// Malformed id values are rejected under both policies. Under
/// [`ReferencePolicy::Strict`], each supplied id must also name an existing
/// record; the first miss fails with [`Error::DanglingReference`] naming
/// the offending field and id. Existence is checked with one batched fetch
/// per field.
pub async fn check_on_create<S: RecordStore>(
  store:  &S,
  kind:   EntityKind,
  doc:    &Document,
  policy: ReferencePolicy,
) -> Result<()> {
  for rf in kind.reference_fields() {
    let Some(raw) = doc.get(rf.field) else { continue };

    let ids: Vec<Uuid> = match rf.arity {
      RefArity::Scalar => ref_id(raw)?.into_iter().collect(),
      RefArity::Sequence => ref_ids(raw)?,
    };

    if policy == ReferencePolicy::Permissive || ids.is_empty() {
      continue;
    }

    let found: HashSet<Uuid> = store
      .get_many(rf.target, &ids)
      .await?
      .iter()
      .map(|r| r.id)
      .collect();

    if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
      return Err(Error::DanglingReference {
        field:  rf.field.to_owned(),
        target: rf.target,
        id:     *missing,
      });
    }
  }
  Ok(())
}

// ─── Delete protection ───────────────────────────────────────────────────────

/// Outcome of an integrity-checked delete.
///
/// Under restrict the report is always empty. Under cascade-null, `cleaned`
/// lists the referrers that were stripped and `failed` the cleanup updates
/// that did not go through. A non-empty `failed` list is a *degraded*
/// success: the target is gone but some references still dangle, and the
/// caller must surface that rather than swallow it.
#[derive(Debug, Default)]
pub struct DeleteReport {
  pub cleaned: Vec<Referrer>,
  pub failed:  Vec<(Referrer, Error)>,
}

impl DeleteReport {
  pub fn is_degraded(&self) -> bool {
    !self.failed.is_empty()
  }
}

/// Every (kind, field) pair in the schema that references `target`.
fn referencing_fields(
  target: EntityKind,
) -> Vec<(EntityKind, &'static ReferenceField)> {
  EntityKind::iter()
    .flat_map(|kind| kind.reference_fields().iter().map(move |rf| (kind, rf)))
    .filter(|(_, rf)| rf.target == target)
    .collect()
}

/// Scan the store for records whose reference fields contain `id`.
pub async fn find_referrers<S: RecordStore>(
  store: &S,
  kind:  EntityKind,
  id:    Uuid,
) -> Result<Vec<Referrer>> {
  let mut referrers = Vec::new();
  for (ref_kind, rf) in referencing_fields(kind) {
    let filter = Filter::References { field: rf.field.to_owned(), id };
    for record in store.find(ref_kind, &filter).await? {
      referrers.push(Referrer { kind: ref_kind, id: record.id, field: rf.field });
    }
  }
  Ok(referrers)
}

/// Delete `(kind, id)` under `policy`.
///
/// Restrict scans for referrers first; any hit rejects the delete and the
/// target survives. The scan and the delete are separate atomic operations
/// (no multi-record transaction exists), so a referrer created between them
/// can still be orphaned; that window is accepted and documented.
///
/// Cascade-null deletes first, then strips each referrer with a
/// read-modify-write update, sequential and best-effort. Cleanup failures
/// land in the [`DeleteReport`] instead of failing the call.
///
/// Deleting an id that no longer exists is [`Error::NotFound`] under either
/// policy: delete-twice succeeds once and reports not-found the second time.
pub async fn delete_with_integrity<S: RecordStore>(
  store:  &S,
  kind:   EntityKind,
  id:     Uuid,
  policy: DeletePolicy,
) -> Result<DeleteReport> {
  match policy {
    DeletePolicy::Restrict => {
      let referrers = find_referrers(store, kind, id).await?;
      if !referrers.is_empty() {
        return Err(Error::ReferentialConflict { kind, id, referrers });
      }
      if !store.delete(kind, id).await? {
        return Err(Error::NotFound { kind, id });
      }
      Ok(DeleteReport::default())
    }

    DeletePolicy::CascadeNull => {
      if !store.delete(kind, id).await? {
        return Err(Error::NotFound { kind, id });
      }
      let mut report = DeleteReport::default();
      for referrer in find_referrers(store, kind, id).await? {
        match strip_reference(store, &referrer, id).await {
          Ok(()) => report.cleaned.push(referrer),
          Err(e) => report.failed.push((referrer, e)),
        }
      }
      Ok(report)
    }
  }
}

/// Remove `id` from one referrer's reference field.
async fn strip_reference<S: RecordStore>(
  store:    &S,
  referrer: &Referrer,
  id:       Uuid,
) -> Result<()> {
  let Some(record) = store.get(referrer.kind, referrer.id).await? else {
    // Referrer deleted concurrently; nothing left to clean.
    return Ok(());
  };

  let rf = referrer
    .kind
    .reference_field(referrer.field)
    .ok_or_else(|| Error::UnknownField {
      kind:  referrer.kind,
      field: referrer.field.to_owned(),
    })?;

  let id_str = id.to_string();
  let raw = record.body.get(referrer.field).cloned().unwrap_or(Value::Null);
  let replacement = match rf.arity {
    RefArity::Scalar => Value::Null,
    RefArity::Sequence => {
      let kept = match raw {
        Value::Array(items) => items
          .into_iter()
          .filter(|item| item.as_str() != Some(id_str.as_str()))
          .collect(),
        _ => vec![],
      };
      Value::Array(kept)
    }
  };

  let mut partial = Document::new();
  partial.insert(referrer.field.to_owned(), replacement);
  store.update(referrer.kind, referrer.id, partial).await?;
  Ok(())
}
