//! Database record structures matching table schemas.
//!
//! Each module holds the row type read back from a table (`...DBResponse`) and the request types
//! the matching repository in [`crate::db::handlers`] accepts.

pub mod captains;
pub mod password_reset_tokens;
pub mod payments;
pub mod ratings;
pub mod rides;
pub mod users;
