//! Entity kinds and the static schema registry.
//!
//! The registry replaces the original system's process-wide model registry
//! with explicit declarations: which fields of each kind reference which
//! other kind, which fields are unique domain keys, and which fields are
//! redacted on read. Projection and integrity enforcement are both driven
//! from these tables, never from per-route knowledge.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The seven entity types of the records system.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
  EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
  Role,
  User,
  Admin,
  Teacher,
  Subject,
  YearSem,
  Student,
}

/// Whether a reference field holds one id or an ordered sequence of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefArity {
  Scalar,
  Sequence,
}

/// A schema-declared reference field: `field` on the owning kind holds the
/// id(s) of `target` record(s).
#[derive(Debug, Clone, Copy)]
pub struct ReferenceField {
  pub field:  &'static str,
  pub target: EntityKind,
  pub arity:  RefArity,
}

impl EntityKind {
  /// Reference fields declared for this kind, in the order the historical
  /// populate chains resolved them.
  ///
  /// The reference graph is acyclic: Student/Teacher/Admin point at leaf
  /// kinds and at User, which points only at Role.
  pub const fn reference_fields(self) -> &'static [ReferenceField] {
    match self {
      Self::User => &[ReferenceField {
        field:  "role_id",
        target: Self::Role,
        arity:  RefArity::Scalar,
      }],
      Self::Admin => &[ReferenceField {
        field:  "user_id",
        target: Self::User,
        arity:  RefArity::Scalar,
      }],
      Self::Teacher => &[
        ReferenceField {
          field:  "subjectIds",
          target: Self::Subject,
          arity:  RefArity::Sequence,
        },
        ReferenceField {
          field:  "user_id",
          target: Self::User,
          arity:  RefArity::Scalar,
        },
      ],
      Self::Student => &[
        ReferenceField {
          field:  "subjectIds",
          target: Self::Subject,
          arity:  RefArity::Sequence,
        },
        ReferenceField {
          field:  "yearSemIds",
          target: Self::YearSem,
          arity:  RefArity::Sequence,
        },
        ReferenceField {
          field:  "user_id",
          target: Self::User,
          arity:  RefArity::Scalar,
        },
      ],
      Self::Role | Self::Subject | Self::YearSem => &[],
    }
  }

  /// Unique domain keys, enforced by the store atomically with each insert
  /// and update. The record id itself is always unique and is not listed.
  pub const fn unique_keys(self) -> &'static [&'static str] {
    match self {
      Self::Role => &["role_id"],
      Self::User => &["email"],
      Self::Admin => &["admin_id"],
      Self::Teacher => &["teacherID"],
      Self::Subject => &["subID"],
      Self::Student => &["rollNo"],
      Self::YearSem => &[],
    }
  }

  /// Fields stripped from every serialised read, including records embedded
  /// by projection.
  pub const fn redacted_fields(self) -> &'static [&'static str] {
    match self {
      Self::User => &["password"],
      _ => &[],
    }
  }

  /// Look up a declared reference field by name.
  pub fn reference_field(self, name: &str) -> Option<&'static ReferenceField> {
    self.reference_fields().iter().find(|rf| rf.field == name)
  }
}
