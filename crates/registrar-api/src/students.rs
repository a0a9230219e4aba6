//! Handlers for `/students` endpoints.
//!
//! Students are addressed by roll number in the path, as the historical
//! system did, not by record id.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/students` | Body: [`Student`]; returns 201 + the raw record |
//! | `GET`    | `/students` | Fully projected (subjects, yearsems, user → role) |
//! | `GET`    | `/students/search` | `?searchField=rollNo\|name\|percentage&searchTerm=...` |
//! | `GET`    | `/students/:rollNo` | Projected; 404 if not found |
//! | `PUT`    | `/students/:rollNo` | Partial update; returns the projected result |
//! | `DELETE` | `/students/:rollNo` | Integrity-checked; returns the deleted record |
//! | `POST`   | `/students/:rollNo/subjects` | Body: `{"subjectId": ...}`; appends |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use registrar_core::{
  integrity::check_on_create,
  models::{EntityModel as _, Student},
  projection::{ProjectionSpec, project, project_many},
  record::{Document, Filter, Record},
  schema::EntityKind,
  store::RecordStore,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{AppState, delete_and_log, error::ApiError};

const KIND: EntityKind = EntityKind::Student;

/// Find a student record by roll number.
async fn by_roll_no<S: RecordStore>(
  store: &S,
  roll_no: i64,
) -> Result<Record, ApiError> {
  let filter = Filter::Eq { field: "rollNo".to_owned(), value: roll_no.into() };
  store
    .find(KIND, &filter)
    .await?
    .into_iter()
    .next()
    .ok_or_else(|| {
      ApiError::NotFound(format!("student with rollNo {roll_no} not found"))
    })
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /students`
///
/// The typed [`Student`] body applies the bio/curriculum defaults at
/// construction; the response is the raw stored record, unprojected.
pub async fn create<S: RecordStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<Student>,
) -> Result<impl IntoResponse, ApiError> {
  let doc = body.into_document()?;
  check_on_create(state.store.as_ref(), KIND, &doc, state.integrity.reference_policy)
    .await?;
  let record = state.store.insert(KIND, doc).await?;
  Ok((StatusCode::CREATED, Json(record.to_value())))
}

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /students` — every student, fully projected.
pub async fn list<S: RecordStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Value>>, ApiError> {
  let spec = ProjectionSpec::default_for(KIND);
  let students =
    project_many(state.store.as_ref(), KIND, &Filter::All, &spec).await?;
  Ok(Json(students))
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
  pub search_field: String,
  pub search_term:  String,
}

/// `GET /students/search?searchField=...&searchTerm=...`
///
/// Results are unprojected, matching the historical endpoint.
pub async fn search<S: RecordStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
  let filter = match params.search_field.as_str() {
    "rollNo" => Filter::Eq {
      field: "rollNo".to_owned(),
      value: params
        .search_term
        .parse::<i64>()
        .map_err(|_| {
          ApiError::BadRequest(format!(
            "rollNo must be a number, got {:?}",
            params.search_term
          ))
        })?
        .into(),
    },
    "name" => Filter::Contains {
      field: "name".to_owned(),
      text:  params.search_term,
    },
    "percentage" => Filter::Eq {
      field: "percentage".to_owned(),
      value: params
        .search_term
        .parse::<f64>()
        .map_err(|_| {
          ApiError::BadRequest(format!(
            "percentage must be a number, got {:?}",
            params.search_term
          ))
        })?
        .into(),
    },
    other => {
      return Err(ApiError::BadRequest(format!("invalid search field: {other:?}")));
    }
  };

  Ok(Json(state.store.find(KIND, &filter).await?))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /students/:rollNo`
pub async fn get_one<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(roll_no): Path<i64>,
) -> Result<Json<Value>, ApiError> {
  let record = by_roll_no(state.store.as_ref(), roll_no).await?;
  let spec = ProjectionSpec::default_for(KIND);
  Ok(Json(project(state.store.as_ref(), &record, &spec).await?))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PUT /students/:rollNo` — partial update; unspecified fields keep their
/// stored value. Returns the projected result.
pub async fn update<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(roll_no): Path<i64>,
  Json(partial): Json<Document>,
) -> Result<Json<Value>, ApiError> {
  let record = by_roll_no(state.store.as_ref(), roll_no).await?;
  check_on_create(
    state.store.as_ref(),
    KIND,
    &partial,
    state.integrity.reference_policy,
  )
  .await?;

  let updated = state
    .store
    .update(KIND, record.id, partial)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("student with rollNo {roll_no} not found"))
    })?;

  let spec = ProjectionSpec::default_for(KIND);
  Ok(Json(project(state.store.as_ref(), &updated, &spec).await?))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /students/:rollNo` — integrity-checked; returns the deleted
/// record.
pub async fn remove<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(roll_no): Path<i64>,
) -> Result<Json<Value>, ApiError> {
  let record = by_roll_no(state.store.as_ref(), roll_no).await?;
  delete_and_log(state.store.as_ref(), state.integrity, KIND, record.id).await?;
  Ok(Json(record.to_value()))
}

// ─── Add subject ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubjectBody {
  pub subject_id: Uuid,
}

/// `POST /students/:rollNo/subjects` — append one subject reference.
/// Duplicates are allowed; insertion order is preserved.
pub async fn add_subject<S: RecordStore>(
  State(state): State<AppState<S>>,
  Path(roll_no): Path<i64>,
  Json(body): Json<AddSubjectBody>,
) -> Result<Json<Value>, ApiError> {
  let record = by_roll_no(state.store.as_ref(), roll_no).await?;

  let mut ids = match record.body.get("subjectIds") {
    Some(Value::Array(items)) => items.clone(),
    _ => vec![],
  };
  ids.push(Value::String(body.subject_id.to_string()));

  let mut partial = Document::new();
  partial.insert("subjectIds".to_owned(), Value::Array(ids));
  check_on_create(
    state.store.as_ref(),
    KIND,
    &partial,
    state.integrity.reference_policy,
  )
  .await?;

  let updated = state
    .store
    .update(KIND, record.id, partial)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("student with rollNo {roll_no} not found"))
    })?;

  Ok(Json(updated.to_value()))
}
