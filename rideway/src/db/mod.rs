//! Database layer for data persistence and access.
//!
//! ```text
//! handlers (axum) ──► db::handlers (repositories) ──► db::models (rows) ──► SQLite
//! ```
//!
//! - [`handlers`]: repositories, one per table
//! - [`models`]: row and request structures matching the schema
//! - [`errors`]: database error taxonomy, mapped from SQLite constraint failures
//!
//! Migrations live in `migrations/` and are embedded by [`crate::migrator`].
//!
//! Ids are UUID blobs. Timestamps are RFC 3339 text written from Rust, so lexical order matches
//! chronological order and range filters can bind `DateTime<Utc>` directly.

pub mod errors;
pub mod handlers;
pub mod models;
