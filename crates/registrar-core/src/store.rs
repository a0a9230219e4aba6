//! The `RecordStore` trait — the storage capability consumed by the
//! projection and integrity layers.
//!
//! The trait is implemented by storage backends (e.g.
//! `registrar-store-sqlite`). Higher layers depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Error,
  record::{Document, Filter, Record},
  schema::EntityKind,
};

/// Abstraction over a registrar record store backend.
///
/// Each method is independently atomic; no multi-record transaction is
/// assumed, and callers must treat sequences of calls as such. Absence is
/// structural (`Option` / `bool`). Methods fail with the shared error
/// taxonomy so callers can distinguish [`Error::DuplicateKey`] and
/// [`Error::Unavailable`] without knowing the backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  /// Fetch one record by kind and id. Returns `None` if not found.
  fn get(
    &self,
    kind: EntityKind,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Record>, Error>> + Send + '_;

  /// Batch-fetch records by id in one round trip.
  ///
  /// Output preserves input order; missing ids are silently omitted;
  /// duplicate inputs yield duplicate outputs.
  fn get_many<'a>(
    &'a self,
    kind: EntityKind,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<Record>, Error>> + Send + 'a;

  /// All records of `kind` matching `filter`.
  fn find<'a>(
    &'a self,
    kind: EntityKind,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Vec<Record>, Error>> + Send + 'a;

  /// Insert a new record with a store-assigned id.
  ///
  /// Domain-key uniqueness is enforced atomically with the insert (a
  /// storage-level constraint, never a read-then-write check); a collision
  /// fails with [`Error::DuplicateKey`] naming the field.
  fn insert(
    &self,
    kind: EntityKind,
    body: Document,
  ) -> impl Future<Output = Result<Record, Error>> + Send + '_;

  /// Partial-field update: keys present in `partial` replace the stored
  /// value (including explicit nulls), absent keys retain their prior
  /// value. Unique-key re-registration is atomic with the update. Returns
  /// `None` if the record does not exist.
  fn update(
    &self,
    kind: EntityKind,
    id: Uuid,
    partial: Document,
  ) -> impl Future<Output = Result<Option<Record>, Error>> + Send + '_;

  /// Delete a record. Returns `false` when the id was already absent.
  fn delete(
    &self,
    kind: EntityKind,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Error>> + Send + '_;
}
