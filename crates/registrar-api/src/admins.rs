//! Handlers for `/admins` endpoints.
//!
//! Same shape as `/teachers`; reads resolve the admin's user and, one level
//! down, the user's role.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use registrar_core::{
  integrity::check_on_create,
  models::{Admin, EntityModel as _},
  projection::{ProjectionSpec, project, project_many, project_one},
  record::{Document, Filter},
  schema::EntityKind,
  store::RecordStore,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{AppState, delete_and_log, error::ApiError, fetch_by_id};

const KIND: EntityKind = EntityKind::Admin;

/// `POST /admins`
pub async fn create<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<Admin>,
) -> Result<impl IntoResponse, ApiError> {
  let doc = body.into_document()?;
  check_on_create(state.store.as_ref(), KIND, &doc, state.integrity.reference_policy)
    .await?;
  let record = state.store.insert(KIND, doc).await?;
  Ok((StatusCode::CREATED, Json(record.to_value())))
}

/// `GET /admins`
pub async fn list<S: RecordStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Value>>, ApiError> {
  let spec = ProjectionSpec::default_for(KIND);
  let admins =
    project_many(state.store.as_ref(), KIND, &Filter::All, &spec).await?;
  Ok(Json(admins))
}

/// `GET /admins/:id`
pub async fn get_one<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let spec = ProjectionSpec::default_for(KIND);
  Ok(Json(project_one(state.store.as_ref(), KIND, id, &spec).await?))
}

/// `PUT /admins/:id`
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
    .ok_or_else(|| ApiError::NotFound(format!("admin {id} not found")))?;

  let spec = ProjectionSpec::default_for(KIND);
  Ok(Json(project(state.store.as_ref(), &updated, &spec).await?))
}

/// `DELETE /admins/:id`
pub async fn remove<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let record = fetch_by_id(state.store.as_ref(), KIND, id).await?;
  delete_and_log(state.store.as_ref(), state.integrity, KIND, id).await?;
  Ok(Json(record.to_value()))
}
