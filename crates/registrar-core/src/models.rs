//! Typed record definitions for the seven entity kinds.
//!
//! Field names mirror the historical wire format exactly, mixed casing
//! included (`rollNo`, `teacherID`, `user_id`). These structs validate
//! create payloads and establish defaults; stored bodies are their JSON
//! serialisations. Reference fields serialise as plain uuid strings, which
//! is the raw-id form the store and the projection engine expect.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result, record::Document, schema::EntityKind};

/// A typed create payload that serialises to a stored document body.
pub trait EntityModel: Serialize + Sized {
  const KIND: EntityKind;

  fn into_document(self) -> Result<Document> {
    match serde_json::to_value(&self)? {
      Value::Object(map) => Ok(map),
      _ => Err(Error::Validation("record body must be a JSON object".into())),
    }
  }
}

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
  pub role_id:   i64,
  #[serde(rename = "roleName")]
  pub role_name: String,
}

impl EntityModel for Role {
  const KIND: EntityKind = EntityKind::Role;
}

// ─── User ────────────────────────────────────────────────────────────────────

/// The credential holder. `password` is an argon2 PHC string by the time it
/// reaches the store; the schema redacts it from every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub email:    String,
  pub password: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role_id:  Option<Uuid>,
}

impl User {
  /// Mirrors the historical format check: no whitespace, one `@`, and a
  /// dot-separated domain part.
  pub fn is_valid_email(s: &str) -> bool {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
      return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
      return false;
    };
    !local.is_empty()
      && !domain.contains('@')
      && domain
        .split_once('.')
        .is_some_and(|(head, tail)| !head.is_empty() && !tail.is_empty())
  }
}

impl EntityModel for User {
  const KIND: EntityKind = EntityKind::User;
}

// ─── Admin ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
  pub admin_id:   i64,
  #[serde(rename = "adminName")]
  pub admin_name: String,
  #[serde(alias = "userId")]
  pub user_id:    Uuid,
}

impl EntityModel for Admin {
  const KIND: EntityKind = EntityKind::Admin;
}

// ─── Teacher ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
  #[serde(rename = "teacherID")]
  pub teacher_id:   String,
  #[serde(rename = "teacherName")]
  pub teacher_name: String,
  #[serde(rename = "subjectIds")]
  pub subject_ids:  Vec<Uuid>,
  #[serde(alias = "userId")]
  pub user_id:      Uuid,
}

impl EntityModel for Teacher {
  const KIND: EntityKind = EntityKind::Teacher;
}

// ─── Subject ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  #[serde(rename = "subID")]
  pub sub_id:      String,
  pub name:        String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub topics:      Vec<String>,
}

impl EntityModel for Subject {
  const KIND: EntityKind = EntityKind::Subject;
}

// ─── YearSem ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum YearSemStatus {
  #[default]
  Active,
  Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearSem {
  pub year:   i64,
  pub sem:    String,
  #[serde(default)]
  pub status: YearSemStatus,
}

impl EntityModel for YearSem {
  const KIND: EntityKind = EntityKind::YearSem;
}

// ─── Student ─────────────────────────────────────────────────────────────────

/// Enrollment biography sub-document: flat key-value, no references.
/// Defaults match the historical backfill values and are applied at
/// construction, not at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentBio {
  pub level:               String,
  pub class:               String,
  pub status:              String,
  pub student_type:        String,
  pub residency:           String,
  pub campus:              String,
  pub first_term_attended: String,
  pub matriculated_term:   String,
  pub last_term_attended:  String,
  pub leave_of_absence:    String,
}

impl Default for StudentBio {
  fn default() -> Self {
    Self {
      level:               "Graduate".to_owned(),
      class:               "Not Provided".to_owned(),
      status:              "Active".to_owned(),
      student_type:        "Masters - Graduate".to_owned(),
      residency:           "International".to_owned(),
      campus:              "Not Provided".to_owned(),
      first_term_attended: "Fall 2021".to_owned(),
      matriculated_term:   "Not Provided".to_owned(),
      last_term_attended:  "Fall 2022".to_owned(),
      leave_of_absence:    "Not Provided".to_owned(),
    }
  }
}

/// Primary curriculum sub-document: flat key-value, no references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurriculumPrimary {
  pub degree:        String,
  pub study_path:    String,
  pub level:         String,
  pub program:       String,
  pub college:       String,
  pub major:         String,
  pub department:    String,
  pub concentration: String,
  pub minor:         String,
  pub admit_type:    String,
  pub admit_term:    String,
  pub catalog_term:  String,
}

impl Default for CurriculumPrimary {
  fn default() -> Self {
    Self {
      degree:        "Master of Science".to_owned(),
      study_path:    "Not Provided".to_owned(),
      level:         "Graduate".to_owned(),
      program:       "MS Computer Science".to_owned(),
      college:       "Health, Science and Technology".to_owned(),
      major:         "Computer Science".to_owned(),
      department:    "Computer Science".to_owned(),
      concentration: "Not Provided".to_owned(),
      minor:         "Not Provided".to_owned(),
      admit_type:    "Standard".to_owned(),
      admit_term:    "Fall 2021".to_owned(),
      catalog_term:  "Fall 2021".to_owned(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
  #[serde(rename = "rollNo")]
  pub roll_no:      i64,
  pub name:         String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub percentage:   Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch:       Option<String>,
  #[serde(rename = "subjectIds", default)]
  pub subject_ids:  Vec<Uuid>,
  #[serde(rename = "yearSemIds", default)]
  pub year_sem_ids: Vec<Uuid>,
  #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
  pub user_id:      Option<Uuid>,
  #[serde(
    rename = "imageUrl",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub image_url:    Option<String>,
  #[serde(rename = "studentBioDetails", default)]
  pub bio:          StudentBio,
  #[serde(rename = "curriculumPrimary", default)]
  pub curriculum:   CurriculumPrimary,
}

impl EntityModel for Student {
  const KIND: EntityKind = EntityKind::Student;
}
