//! Core types and trait definitions for the registrar records backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! defines the entity schema, the storage capability trait, the reference
//! projection engine and the referential-integrity rules; backends and the
//! API layer depend on it, not on each other.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod integrity;
pub mod models;
pub mod projection;
pub mod record;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
