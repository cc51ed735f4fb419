//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `SqliteConnection` (a pooled connection or a transaction), so
//! the caller owns the transactional scope:
//!
//! ```ignore
//! use rideway::db::handlers::{Repository, Users};
//!
//! async fn example(pool: &sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = Users::new(&mut tx);
//!     let user = repo.get_by_email("rider@example.com").await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! - [`Users`] and [`Captains`] implement the generic [`Repository`] CRUD trait.
//! - [`Rides`] owns the conditional status updates that make the lifecycle race-free.
//! - [`Ratings`] submits a rating and updates the captain aggregate in one transaction.
//! - [`analytics`] holds the dashboard and captain stats aggregates.

pub mod analytics;
pub mod blacklisted_tokens;
pub mod captains;
pub mod password_reset_tokens;
pub mod payments;
pub mod ratings;
pub mod repository;
pub mod rides;
pub mod users;

pub use analytics::Analytics;
pub use blacklisted_tokens::BlacklistedTokens;
pub use captains::Captains;
pub use password_reset_tokens::PasswordResetTokens;
pub use payments::Payments;
pub use ratings::Ratings;
pub use repository::Repository;
pub use rides::Rides;
pub use users::Users;
