//! API request and response data models.
//!
//! These are distinct from the database models in [`crate::db::models`], so the wire format can
//! evolve independently of storage. The wire format follows the SPA client: camelCase field names,
//! and entity ids serialized as `_id`.
//!
//! Request bodies deserialize leniently (missing fields take defaults) and are then checked by a
//! `validate` method, so a malformed request gets a 400 listing every bad field via
//! [`validation::Validator`] rather than a bare deserialization error.

pub mod accounts;
pub mod admin;
pub mod captains;
pub mod maps;
pub mod pagination;
pub mod payments;
pub mod ratings;
pub mod rides;
pub mod users;
pub mod validation;
