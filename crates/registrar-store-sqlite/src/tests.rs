//! Integration tests for `SqliteStore` against an in-memory database,
//! including the projection and integrity layers running on top of it.

use std::sync::{
  Mutex,
  atomic::{AtomicUsize, Ordering},
};

use registrar_core::{
  Error as CoreError,
  integrity::{
    DeletePolicy, ReferencePolicy, check_on_create, delete_with_integrity,
  },
  models::{EntityModel as _, Role, Student, Subject, User, YearSem},
  projection::{ProjectionSpec, project, project_one},
  record::{Document, Filter, Record},
  schema::EntityKind,
  store::RecordStore,
};
use serde_json::Value;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

// ─── Document builders ───────────────────────────────────────────────────────

fn subject_doc(sub_id: &str, name: &str) -> Document {
  Subject {
    sub_id:      sub_id.to_owned(),
    name:        name.to_owned(),
    description: None,
    topics:      vec![],
  }
  .into_document()
  .unwrap()
}

fn student_doc(
  roll_no: i64,
  name: &str,
  subject_ids: Vec<Uuid>,
  year_sem_ids: Vec<Uuid>,
  user_id: Option<Uuid>,
) -> Document {
  Student {
    roll_no,
    name: name.to_owned(),
    percentage: None,
    branch: None,
    subject_ids,
    year_sem_ids,
    user_id,
    image_url: None,
    bio: Default::default(),
    curriculum: Default::default(),
  }
  .into_document()
  .unwrap()
}

fn role_doc(role_id: i64, name: &str) -> Document {
  Role { role_id, role_name: name.to_owned() }
    .into_document()
    .unwrap()
}

fn user_doc(email: &str, role_id: Option<Uuid>) -> Document {
  User {
    email:    email.to_owned(),
    password: "$argon2id$v=19$placeholder".to_owned(),
    role_id,
  }
  .into_document()
  .unwrap()
}

fn yearsem_doc(year: i64, sem: &str) -> Document {
  YearSem { year, sem: sem.to_owned(), status: Default::default() }
    .into_document()
    .unwrap()
}

// ─── Basic store operations ──────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_record() {
  let s = store().await;

  let subject = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();

  let fetched = s.get(EntityKind::Subject, subject.id).await.unwrap();
  let fetched = fetched.expect("subject present");
  assert_eq!(fetched.id, subject.id);
  assert_eq!(fetched.body["subID"], "CS101");
  assert_eq!(fetched.body["name"], "Intro");
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  let result = s.get(EntityKind::Subject, Uuid::new_v4()).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn get_is_kind_scoped() {
  let s = store().await;
  let subject = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();

  // The same id under a different kind is not found.
  let result = s.get(EntityKind::Student, subject.id).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn get_many_preserves_order_and_omits_missing() {
  let s = store().await;
  let a = s.insert(EntityKind::Subject, subject_doc("A", "A")).await.unwrap();
  let b = s.insert(EntityKind::Subject, subject_doc("B", "B")).await.unwrap();
  let c = s.insert(EntityKind::Subject, subject_doc("C", "C")).await.unwrap();

  let missing = Uuid::new_v4();
  let fetched = s
    .get_many(EntityKind::Subject, &[c.id, missing, a.id, b.id])
    .await
    .unwrap();

  let ids: Vec<Uuid> = fetched.iter().map(|r| r.id).collect();
  assert_eq!(ids, vec![c.id, a.id, b.id]);
}

#[tokio::test]
async fn get_many_repeats_duplicate_inputs() {
  let s = store().await;
  let a = s.insert(EntityKind::Subject, subject_doc("A", "A")).await.unwrap();

  let fetched = s
    .get_many(EntityKind::Subject, &[a.id, a.id])
    .await
    .unwrap();
  assert_eq!(fetched.len(), 2);
}

#[tokio::test]
async fn student_defaults_applied_at_construction() {
  let s = store().await;
  let student = s
    .insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None))
    .await
    .unwrap();

  // The backfill defaults are part of the stored document, not computed at
  // read time.
  assert_eq!(student.body["studentBioDetails"]["level"], "Graduate");
  assert_eq!(student.body["curriculumPrimary"]["degree"], "Master of Science");
}

// ─── Find filters ────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_eq_on_number_field() {
  let s = store().await;
  s.insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None))
    .await
    .unwrap();
  s.insert(EntityKind::Student, student_doc(8, "Bob", vec![], vec![], None))
    .await
    .unwrap();

  let filter = Filter::Eq { field: "rollNo".to_owned(), value: 7.into() };
  let found = s.find(EntityKind::Student, &filter).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].body["name"], "Ann");
}

#[tokio::test]
async fn find_contains_is_case_insensitive() {
  let s = store().await;
  s.insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None))
    .await
    .unwrap();
  s.insert(EntityKind::Student, student_doc(8, "Anna", vec![], vec![], None))
    .await
    .unwrap();
  s.insert(EntityKind::Student, student_doc(9, "Bob", vec![], vec![], None))
    .await
    .unwrap();

  let filter =
    Filter::Contains { field: "name".to_owned(), text: "ann".to_owned() };
  let found = s.find(EntityKind::Student, &filter).await.unwrap();
  assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn find_references_matches_scalar_and_sequence() {
  let s = store().await;
  let role = s.insert(EntityKind::Role, role_doc(1, "staff")).await.unwrap();
  let user = s
    .insert(EntityKind::User, user_doc("ann@example.com", Some(role.id)))
    .await
    .unwrap();
  let subject = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();
  s.insert(
    EntityKind::Student,
    student_doc(7, "Ann", vec![subject.id], vec![], Some(user.id)),
  )
  .await
  .unwrap();

  // Scalar reference: users pointing at the role.
  let filter = Filter::References { field: "role_id".to_owned(), id: role.id };
  let found = s.find(EntityKind::User, &filter).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].id, user.id);

  // Sequence reference: students listing the subject.
  let filter =
    Filter::References { field: "subjectIds".to_owned(), id: subject.id };
  let found = s.find(EntityKind::Student, &filter).await.unwrap();
  assert_eq!(found.len(), 1);

  // No match for an unreferenced id.
  let filter =
    Filter::References { field: "subjectIds".to_owned(), id: Uuid::new_v4() };
  let found = s.find(EntityKind::Student, &filter).await.unwrap();
  assert!(found.is_empty());
}

// ─── Uniqueness ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_roll_no_rejected_naming_field() {
  let s = store().await;
  s.insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None))
    .await
    .unwrap();

  let err = s
    .insert(EntityKind::Student, student_doc(7, "Bob", vec![], vec![], None))
    .await
    .unwrap_err();

  match err {
    CoreError::DuplicateKey { field, .. } => assert_eq!(field, "rollNo"),
    other => panic!("expected DuplicateKey, got {other:?}"),
  }

  // The colliding record must not have been half-inserted.
  let all = s.find(EntityKind::Student, &Filter::All).await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn concurrent_duplicate_creates_exactly_one_wins() {
  let s = store().await;

  let (a, b) = tokio::join!(
    s.insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None)),
    s.insert(EntityKind::Student, student_doc(7, "Bob", vec![], vec![], None)),
  );

  let ok_count = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
  assert_eq!(ok_count, 1, "exactly one create must win");

  let err = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
  assert!(matches!(err, CoreError::DuplicateKey { .. }));
}

#[tokio::test]
async fn update_reregisters_unique_key() {
  let s = store().await;
  let ann = s
    .insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None))
    .await
    .unwrap();
  s.insert(EntityKind::Student, student_doc(8, "Bob", vec![], vec![], None))
    .await
    .unwrap();

  // Moving onto a taken key fails.
  let mut partial = Document::new();
  partial.insert("rollNo".to_owned(), 8.into());
  let err = s
    .update(EntityKind::Student, ann.id, partial)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::DuplicateKey { .. }));

  // Moving onto a free key succeeds and releases the old one.
  let mut partial = Document::new();
  partial.insert("rollNo".to_owned(), 9.into());
  let updated = s
    .update(EntityKind::Student, ann.id, partial)
    .await
    .unwrap()
    .expect("ann exists");
  assert_eq!(updated.body["rollNo"], 9);

  s.insert(EntityKind::Student, student_doc(7, "Cid", vec![], vec![], None))
    .await
    .expect("old roll number is free again");
}

// ─── Updates and deletes ─────────────────────────────────────────────────────

#[tokio::test]
async fn update_retains_unspecified_fields() {
  let s = store().await;
  let ann = s
    .insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None))
    .await
    .unwrap();

  let mut partial = Document::new();
  partial.insert("branch".to_owned(), "Mech".into());
  let updated = s
    .update(EntityKind::Student, ann.id, partial)
    .await
    .unwrap()
    .expect("ann exists");

  assert_eq!(updated.body["branch"], "Mech");
  assert_eq!(updated.body["name"], "Ann");
  assert_eq!(updated.body["rollNo"], 7);
}

#[tokio::test]
async fn update_missing_returns_none() {
  let s = store().await;
  let result = s
    .update(EntityKind::Student, Uuid::new_v4(), Document::new())
    .await
    .unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn delete_twice_second_reports_absent() {
  let s = store().await;
  let subject = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();

  assert!(s.delete(EntityKind::Subject, subject.id).await.unwrap());
  assert!(!s.delete(EntityKind::Subject, subject.id).await.unwrap());
}

// ─── Projection ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn scalar_projection_embeds_target_and_keeps_raw_id() {
  let s = store().await;
  let role = s.insert(EntityKind::Role, role_doc(1, "staff")).await.unwrap();
  let user = s
    .insert(EntityKind::User, user_doc("ann@example.com", Some(role.id)))
    .await
    .unwrap();

  let spec = ProjectionSpec::default_for(EntityKind::User);
  let view = project(&s, &user, &spec).await.unwrap();

  assert_eq!(view["role_id"]["roleName"], "staff");
  assert_eq!(view["role_id"]["id"], role.id.to_string());

  // The projection is a view: the stored record still holds the raw id.
  let raw = s.get(EntityKind::User, user.id).await.unwrap().unwrap();
  assert_eq!(raw.body["role_id"], role.id.to_string());
}

#[tokio::test]
async fn scalar_projection_of_dangling_reference_is_null() {
  let s = store().await;
  let role = s.insert(EntityKind::Role, role_doc(1, "staff")).await.unwrap();
  let user = s
    .insert(EntityKind::User, user_doc("ann@example.com", Some(role.id)))
    .await
    .unwrap();

  s.delete(EntityKind::Role, role.id).await.unwrap();

  let spec = ProjectionSpec::default_for(EntityKind::User);
  let view = project(&s, &user, &spec).await.unwrap();
  assert!(view["role_id"].is_null());
}

#[tokio::test]
async fn sequence_projection_preserves_order_and_omits_missing() {
  let s = store().await;
  let a = s.insert(EntityKind::Subject, subject_doc("A", "A")).await.unwrap();
  let b = s.insert(EntityKind::Subject, subject_doc("B", "B")).await.unwrap();
  let c = s.insert(EntityKind::Subject, subject_doc("C", "C")).await.unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![a.id, b.id, c.id], vec![], None),
    )
    .await
    .unwrap();

  s.delete(EntityKind::Subject, b.id).await.unwrap();

  let spec = ProjectionSpec::empty().field("subjectIds");
  let view = project(&s, &ann, &spec).await.unwrap();

  let subjects = view["subjectIds"].as_array().unwrap();
  assert_eq!(subjects.len(), 2);
  assert_eq!(subjects[0]["subID"], "A");
  assert_eq!(subjects[1]["subID"], "C");
}

#[tokio::test]
async fn sequence_projection_keeps_duplicates() {
  let s = store().await;
  let a = s.insert(EntityKind::Subject, subject_doc("A", "A")).await.unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![a.id, a.id], vec![], None),
    )
    .await
    .unwrap();

  let spec = ProjectionSpec::empty().field("subjectIds");
  let view = project(&s, &ann, &spec).await.unwrap();
  assert_eq!(view["subjectIds"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn nested_projection_resolves_user_then_role() {
  let s = store().await;
  let role = s.insert(EntityKind::Role, role_doc(1, "student")).await.unwrap();
  let user = s
    .insert(EntityKind::User, user_doc("ann@example.com", Some(role.id)))
    .await
    .unwrap();
  let term = s.insert(EntityKind::YearSem, yearsem_doc(2024, "Fall")).await.unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![], vec![term.id], Some(user.id)),
    )
    .await
    .unwrap();

  let spec = ProjectionSpec::default_for(EntityKind::Student);
  let view = project(&s, &ann, &spec).await.unwrap();

  assert_eq!(view["user_id"]["email"], "ann@example.com");
  assert_eq!(view["user_id"]["role_id"]["roleName"], "student");
  assert_eq!(view["yearSemIds"][0]["sem"], "Fall");
}

#[tokio::test]
async fn projection_redacts_embedded_password() {
  let s = store().await;
  let user = s
    .insert(EntityKind::User, user_doc("ann@example.com", None))
    .await
    .unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![], vec![], Some(user.id)),
    )
    .await
    .unwrap();

  let spec = ProjectionSpec::default_for(EntityKind::Student);
  let view = project(&s, &ann, &spec).await.unwrap();

  assert_eq!(view["user_id"]["email"], "ann@example.com");
  assert!(view["user_id"].get("password").is_none());
}

#[tokio::test]
async fn projection_is_idempotent() {
  let s = store().await;
  let a = s.insert(EntityKind::Subject, subject_doc("A", "A")).await.unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![a.id], vec![], None),
    )
    .await
    .unwrap();

  let spec = ProjectionSpec::default_for(EntityKind::Student);
  let first = project(&s, &ann, &spec).await.unwrap();
  let second = project(&s, &ann, &spec).await.unwrap();
  assert_eq!(first, second);
}

#[tokio::test]
async fn project_one_missing_primary_is_not_found() {
  let s = store().await;
  let spec = ProjectionSpec::default_for(EntityKind::Student);
  let err = project_one(&s, EntityKind::Student, Uuid::new_v4(), &spec)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn projection_rejects_undeclared_field() {
  let s = store().await;
  let ann = s
    .insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None))
    .await
    .unwrap();

  let spec = ProjectionSpec::empty().field("branch");
  let err = project(&s, &ann, &spec).await.unwrap_err();
  assert!(matches!(err, CoreError::UnknownField { .. }));
}

#[tokio::test]
async fn end_to_end_student_with_subject() {
  let s = store().await;
  let cs101 = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![cs101.id], vec![], None),
    )
    .await
    .unwrap();

  let spec = ProjectionSpec::empty().field("subjectIds");
  let view = project_one(&s, EntityKind::Student, ann.id, &spec)
    .await
    .unwrap();

  assert_eq!(view["rollNo"], 7);
  assert_eq!(view["name"], "Ann");
  let subjects = view["subjectIds"].as_array().unwrap();
  assert_eq!(subjects.len(), 1);
  assert_eq!(subjects[0]["subID"], "CS101");
  assert_eq!(subjects[0]["name"], "Intro");
  assert_eq!(subjects[0]["id"], cs101.id.to_string());
}

// ─── Create-time integrity ───────────────────────────────────────────────────

#[tokio::test]
async fn strict_create_rejects_dangling_reference() {
  let s = store().await;
  let bogus = Uuid::new_v4();
  let doc = student_doc(7, "Ann", vec![bogus], vec![], None);

  let err = check_on_create(&s, EntityKind::Student, &doc, ReferencePolicy::Strict)
    .await
    .unwrap_err();

  match err {
    CoreError::DanglingReference { field, id, .. } => {
      assert_eq!(field, "subjectIds");
      assert_eq!(id, bogus);
    }
    other => panic!("expected DanglingReference, got {other:?}"),
  }
}

#[tokio::test]
async fn permissive_create_accepts_dangling_reference() {
  let s = store().await;
  let doc = student_doc(7, "Ann", vec![Uuid::new_v4()], vec![], None);

  check_on_create(&s, EntityKind::Student, &doc, ReferencePolicy::Permissive)
    .await
    .expect("historical behavior accepts arbitrary ids");
  s.insert(EntityKind::Student, doc).await.unwrap();
}

#[tokio::test]
async fn malformed_reference_id_rejected_in_both_modes() {
  let s = store().await;
  let mut doc = student_doc(7, "Ann", vec![], vec![], None);
  doc.insert(
    "subjectIds".to_owned(),
    Value::Array(vec![Value::String("not-a-uuid".to_owned())]),
  );

  for policy in [ReferencePolicy::Permissive, ReferencePolicy::Strict] {
    let err = check_on_create(&s, EntityKind::Student, &doc, policy)
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
  }
}

// ─── Delete-time integrity ───────────────────────────────────────────────────

#[tokio::test]
async fn restrict_delete_blocked_by_referrer() {
  let s = store().await;
  let cs101 = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![cs101.id], vec![], None),
    )
    .await
    .unwrap();

  let err = delete_with_integrity(
    &s,
    EntityKind::Subject,
    cs101.id,
    DeletePolicy::Restrict,
  )
  .await
  .unwrap_err();

  match err {
    CoreError::ReferentialConflict { referrers, .. } => {
      assert_eq!(referrers.len(), 1);
      assert_eq!(referrers[0].id, ann.id);
      assert_eq!(referrers[0].kind, EntityKind::Student);
      assert_eq!(referrers[0].field, "subjectIds");
    }
    other => panic!("expected ReferentialConflict, got {other:?}"),
  }

  // The target survives a rejected delete.
  assert!(s.get(EntityKind::Subject, cs101.id).await.unwrap().is_some());
}

#[tokio::test]
async fn restrict_delete_of_unreferenced_record_succeeds() {
  let s = store().await;
  let cs101 = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();

  let report = delete_with_integrity(
    &s,
    EntityKind::Subject,
    cs101.id,
    DeletePolicy::Restrict,
  )
  .await
  .unwrap();
  assert!(!report.is_degraded());
  assert!(s.get(EntityKind::Subject, cs101.id).await.unwrap().is_none());
}

#[tokio::test]
async fn cascade_null_delete_strips_sequence_references() {
  let s = store().await;
  let cs101 = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();
  let other = s
    .insert(EntityKind::Subject, subject_doc("CS102", "Data"))
    .await
    .unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![cs101.id, other.id], vec![], None),
    )
    .await
    .unwrap();

  let report = delete_with_integrity(
    &s,
    EntityKind::Subject,
    cs101.id,
    DeletePolicy::CascadeNull,
  )
  .await
  .unwrap();
  assert_eq!(report.cleaned.len(), 1);
  assert!(!report.is_degraded());

  // The stored sequence is stripped, keeping the surviving reference.
  let raw = s.get(EntityKind::Student, ann.id).await.unwrap().unwrap();
  assert_eq!(
    raw.body["subjectIds"],
    Value::Array(vec![Value::String(other.id.to_string())])
  );

  let spec = ProjectionSpec::empty().field("subjectIds");
  let view = project_one(&s, EntityKind::Student, ann.id, &spec)
    .await
    .unwrap();
  assert_eq!(view["subjectIds"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cascade_null_delete_nulls_scalar_references() {
  let s = store().await;
  let user = s
    .insert(EntityKind::User, user_doc("ann@example.com", None))
    .await
    .unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![], vec![], Some(user.id)),
    )
    .await
    .unwrap();

  delete_with_integrity(&s, EntityKind::User, user.id, DeletePolicy::CascadeNull)
    .await
    .unwrap();

  let raw = s.get(EntityKind::Student, ann.id).await.unwrap().unwrap();
  assert_eq!(raw.body["user_id"], Value::Null);
}

#[tokio::test]
async fn cascade_null_projects_empty_sequence_afterwards() {
  let s = store().await;
  let cs101 = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();
  let ann = s
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![cs101.id], vec![], None),
    )
    .await
    .unwrap();

  delete_with_integrity(
    &s,
    EntityKind::Subject,
    cs101.id,
    DeletePolicy::CascadeNull,
  )
  .await
  .unwrap();

  let spec = ProjectionSpec::empty().field("subjectIds");
  let view = project_one(&s, EntityKind::Student, ann.id, &spec)
    .await
    .unwrap();
  assert_eq!(view["subjectIds"], Value::Array(vec![]));
}

#[tokio::test]
async fn integrity_delete_twice_second_is_not_found() {
  let s = store().await;
  let cs101 = s
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();

  for policy in [DeletePolicy::Restrict, DeletePolicy::CascadeNull] {
    let first = s
      .insert(EntityKind::Subject, subject_doc("X", "X"))
      .await
      .unwrap();
    delete_with_integrity(&s, EntityKind::Subject, first.id, policy)
      .await
      .unwrap();
    let err = delete_with_integrity(&s, EntityKind::Subject, first.id, policy)
      .await
      .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
  }

  // Untouched record is still there.
  assert!(s.get(EntityKind::Subject, cs101.id).await.unwrap().is_some());
}

// ─── Resilience ──────────────────────────────────────────────────────────────

/// Delegating wrapper that injects transient failures: the next
/// `fail_gets` calls to `get` return `Unavailable`, and updates to
/// `fail_update_for` always do.
struct FlakyStore {
  inner:           SqliteStore,
  fail_gets:       AtomicUsize,
  fail_update_for: Mutex<Option<Uuid>>,
}

impl FlakyStore {
  fn new(inner: SqliteStore) -> Self {
    Self {
      inner,
      fail_gets: AtomicUsize::new(0),
      fail_update_for: Mutex::new(None),
    }
  }
}

impl RecordStore for FlakyStore {
  async fn get(
    &self,
    kind: EntityKind,
    id: Uuid,
  ) -> Result<Option<Record>, CoreError> {
    if self.fail_gets.load(Ordering::SeqCst) > 0 {
      self.fail_gets.fetch_sub(1, Ordering::SeqCst);
      return Err(CoreError::Unavailable("injected".to_owned()));
    }
    self.inner.get(kind, id).await
  }

  async fn get_many(
    &self,
    kind: EntityKind,
    ids: &[Uuid],
  ) -> Result<Vec<Record>, CoreError> {
    self.inner.get_many(kind, ids).await
  }

  async fn find(
    &self,
    kind: EntityKind,
    filter: &Filter,
  ) -> Result<Vec<Record>, CoreError> {
    self.inner.find(kind, filter).await
  }

  async fn insert(
    &self,
    kind: EntityKind,
    body: Document,
  ) -> Result<Record, CoreError> {
    self.inner.insert(kind, body).await
  }

  async fn update(
    &self,
    kind: EntityKind,
    id: Uuid,
    partial: Document,
  ) -> Result<Option<Record>, CoreError> {
    if *self.fail_update_for.lock().unwrap() == Some(id) {
      return Err(CoreError::Unavailable("injected".to_owned()));
    }
    self.inner.update(kind, id, partial).await
  }

  async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<bool, CoreError> {
    self.inner.delete(kind, id).await
  }
}

#[tokio::test]
async fn transient_read_failure_is_retried() {
  let inner = store().await;
  let ann = inner
    .insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None))
    .await
    .unwrap();

  let flaky = FlakyStore::new(inner);
  flaky.fail_gets.store(1, Ordering::SeqCst);

  let spec = ProjectionSpec::empty();
  let view = project_one(&flaky, EntityKind::Student, ann.id, &spec)
    .await
    .expect("one transient failure is absorbed");
  assert_eq!(view["name"], "Ann");
}

#[tokio::test]
async fn persistent_read_failure_surfaces_unavailable() {
  let inner = store().await;
  let ann = inner
    .insert(EntityKind::Student, student_doc(7, "Ann", vec![], vec![], None))
    .await
    .unwrap();

  let flaky = FlakyStore::new(inner);
  // More failures than the initial attempt plus its bounded retries.
  flaky.fail_gets.store(10, Ordering::SeqCst);

  let spec = ProjectionSpec::empty();
  let err = project_one(&flaky, EntityKind::Student, ann.id, &spec)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Unavailable(_)));
}

#[tokio::test]
async fn cascade_cleanup_failure_is_a_degraded_success() {
  let inner = store().await;
  let cs101 = inner
    .insert(EntityKind::Subject, subject_doc("CS101", "Intro"))
    .await
    .unwrap();
  let ann = inner
    .insert(
      EntityKind::Student,
      student_doc(7, "Ann", vec![cs101.id], vec![], None),
    )
    .await
    .unwrap();
  let bob = inner
    .insert(
      EntityKind::Student,
      student_doc(8, "Bob", vec![cs101.id], vec![], None),
    )
    .await
    .unwrap();

  let flaky = FlakyStore::new(inner);
  *flaky.fail_update_for.lock().unwrap() = Some(ann.id);

  let report = delete_with_integrity(
    &flaky,
    EntityKind::Subject,
    cs101.id,
    DeletePolicy::CascadeNull,
  )
  .await
  .expect("the delete itself succeeds");

  // Degraded: the target is gone, one referrer cleaned, one still dangling.
  assert!(report.is_degraded());
  assert_eq!(report.cleaned.len(), 1);
  assert_eq!(report.cleaned[0].id, bob.id);
  assert_eq!(report.failed.len(), 1);
  assert_eq!(report.failed[0].0.id, ann.id);

  assert!(
    flaky
      .inner
      .get(EntityKind::Subject, cs101.id)
      .await
      .unwrap()
      .is_none()
  );
  let dangling = flaky
    .inner
    .get(EntityKind::Student, ann.id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(dangling.body["subjectIds"][0], cs101.id.to_string());
}
