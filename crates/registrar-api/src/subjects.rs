//! Handlers for `/subjects` endpoints.
//!
//! Subjects are a leaf kind: nothing to project on read, but deletes are
//! integrity-checked because students and teachers reference them.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use registrar_core::{
  models::{EntityModel as _, Subject},
  record::{Document, Filter, Record},
  schema::EntityKind,
  store::RecordStore,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{AppState, delete_and_log, error::ApiError, fetch_by_id};

const KIND: EntityKind = EntityKind::Subject;

/// `POST /subjects`
pub async fn create<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<Subject>,
) -> Result<impl IntoResponse, ApiError> {
  let record = state.store.insert(KIND, body.into_document()?).await?;
  Ok((StatusCode::CREATED, Json(record.to_value())))
}

/// `GET /subjects`
pub async fn list<S: RecordStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Record>>, ApiError> {
  Ok(Json(state.store.find(KIND, &Filter::All).await?))
}

/// `GET /subjects/:id`
pub async fn get_one<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let record = fetch_by_id(state.store.as_ref(), KIND, id).await?;
  Ok(Json(record.to_value()))
}

/// `PUT /subjects/:id`
pub async fn update<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(partial): Json<Document>,
) -> Result<Json<Value>, ApiError> {
  let updated = state
    .store
    .update(KIND, id, partial)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;
  Ok(Json(updated.to_value()))
}

/// `DELETE /subjects/:id`
pub async fn remove<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let record = fetch_by_id(state.store.as_ref(), KIND, id).await?;
  delete_and_log(state.store.as_ref(), state.integrity, KIND, id).await?;
  Ok(Json(record.to_value()))
}
