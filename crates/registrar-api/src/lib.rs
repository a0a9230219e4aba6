//! JSON REST API for the registrar backend.
//!
//! Exposes an axum [`Router`] backed by any
//! [`registrar_core::store::RecordStore`]. TLS and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = registrar_api::api_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod admins;
pub mod auth;
pub mod error;
pub mod roles;
pub mod students;
pub mod subjects;
pub mod teachers;
pub mod yearsems;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use registrar_core::{
  integrity::{IntegrityConfig, delete_with_integrity},
  record::Record,
  schema::EntityKind,
  store::RecordStore,
};
use uuid::Uuid;

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:     Arc<S>,
  pub auth:      Arc<AuthConfig>,
  pub integrity: IntegrityConfig,
}

// Manual impl: cloning the state must not require `S: Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      auth:      self.auth.clone(),
      integrity: self.integrity,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// Routes and response shapes follow the historical system: students are
/// addressed by roll number, everything else by record id.
pub fn api_router<S>(state: AppState<S>) -> Router
where
  S: RecordStore + 'static,
{
  Router::new()
    // Auth
    .route("/register", post(auth::register::<S>))
    .route("/login", post(auth::login::<S>))
    // Students — keyed by roll number
    .route(
      "/students",
      get(students::list::<S>).post(students::create::<S>),
    )
    .route("/students/search", get(students::search::<S>))
    .route(
      "/students/{roll_no}",
      get(students::get_one::<S>)
        .put(students::update::<S>)
        .delete(students::remove::<S>),
    )
    .route(
      "/students/{roll_no}/subjects",
      post(students::add_subject::<S>),
    )
    // Teachers
    .route(
      "/teachers",
      get(teachers::list::<S>).post(teachers::create::<S>),
    )
    .route(
      "/teachers/{id}",
      get(teachers::get_one::<S>)
        .put(teachers::update::<S>)
        .delete(teachers::remove::<S>),
    )
    // Admins
    .route("/admins", get(admins::list::<S>).post(admins::create::<S>))
    .route(
      "/admins/{id}",
      get(admins::get_one::<S>)
        .put(admins::update::<S>)
        .delete(admins::remove::<S>),
    )
    // Subjects
    .route(
      "/subjects",
      get(subjects::list::<S>).post(subjects::create::<S>),
    )
    .route(
      "/subjects/{id}",
      get(subjects::get_one::<S>)
        .put(subjects::update::<S>)
        .delete(subjects::remove::<S>),
    )
    // Year-semester terms
    .route(
      "/yearsem",
      get(yearsems::list::<S>).post(yearsems::create::<S>),
    )
    .route(
      "/yearsem/{id}",
      get(yearsems::get_one::<S>)
        .put(yearsems::update::<S>)
        .delete(yearsems::remove::<S>),
    )
    // Roles
    .route("/roles", get(roles::list::<S>).post(roles::create::<S>))
    .route(
      "/roles/{id}",
      get(roles::get_one::<S>)
        .put(roles::update::<S>)
        .delete(roles::remove::<S>),
    )
    .with_state(state)
}

// ─── Shared handler helpers ──────────────────────────────────────────────────

/// Fetch a record by id, mapping absence to a 404.
pub(crate) async fn fetch_by_id<S: RecordStore>(
  store: &S,
  kind: EntityKind,
  id: Uuid,
) -> Result<Record, ApiError> {
  store
    .get(kind, id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("{kind} {id} not found")))
}

/// Run an integrity-checked delete and log any degraded cascade cleanup.
pub(crate) async fn delete_and_log<S: RecordStore>(
  store: &S,
  integrity: IntegrityConfig,
  kind: EntityKind,
  id: Uuid,
) -> Result<(), ApiError> {
  let report =
    delete_with_integrity(store, kind, id, integrity.delete_policy).await?;
  for (referrer, err) in &report.failed {
    tracing::warn!(
      kind = %referrer.kind,
      id = %referrer.id,
      field = referrer.field,
      error = %err,
      "reference cleanup failed after delete; reference left dangling"
    );
  }
  Ok(())
}
