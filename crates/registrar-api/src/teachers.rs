//! Handlers for `/teachers` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/teachers` | Body: [`Teacher`]; returns 201 + the raw record |
//! | `GET`    | `/teachers` | Projected (subjects, user → role) |
//! | `GET`    | `/teachers/:id` | Projected; 404 if not found |
//! | `PUT`    | `/teachers/:id` | Partial update; returns the projected result |
//! | `DELETE` | `/teachers/:id` | Integrity-checked; returns the deleted record |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use registrar_core::{
  integrity::check_on_create,
  models::{EntityModel as _, Teacher},
  projection::{ProjectionSpec, project, project_many, project_one},
  record::{Document, Filter},
  schema::EntityKind,
  store::RecordStore,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{AppState, delete_and_log, error::ApiError, fetch_by_id};

const KIND: EntityKind = EntityKind::Teacher;

/// `POST /teachers`
pub async fn create<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<Teacher>,
) -> Result<impl IntoResponse, ApiError> {
  let doc = body.into_document()?;
  check_on_create(state.store.as_ref(), KIND, &doc, state.integrity.reference_policy)
    .await?;
  let record = state.store.insert(KIND, doc).await?;
  Ok((StatusCode::CREATED, Json(record.to_value())))
}

/// `GET /teachers`
pub async fn list<S: RecordStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Value>>, ApiError> {
  let spec = ProjectionSpec::default_for(KIND);
  let teachers =
    project_many(state.store.as_ref(), KIND, &Filter::All, &spec).await?;
  Ok(Json(teachers))
}

/// `GET /teachers/:id`
pub async fn get_one<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let spec = ProjectionSpec::default_for(KIND);
  Ok(Json(project_one(state.store.as_ref(), KIND, id, &spec).await?))
}

/// `PUT /teachers/:id`
pub async fn update<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(partial): Json<Document>,
) -> Result<Json<Value>, ApiError> {
  check_on_create(
    state.store.as_ref(),
    KIND,
    &partial,
    state.integrity.reference_policy,
  )
  .await?;

  let updated = state
    .store
    .update(KIND, id, partial)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("teacher {id} not found")))?;

  let spec = ProjectionSpec::default_for(KIND);
  Ok(Json(project(state.store.as_ref(), &updated, &spec).await?))
}

/// `DELETE /teachers/:id`
pub async fn remove<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let record = fetch_by_id(state.store.as_ref(), KIND, id).await?;
  delete_and_log(state.store.as_ref(), state.integrity, KIND, id).await?;
  Ok(Json(record.to_value()))
}
