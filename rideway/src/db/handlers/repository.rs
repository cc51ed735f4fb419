//! Base repository trait for database operations.

use std::collections::HashMap;

use crate::db::errors::Result;

/// A repository is the data access layer for one table.
///
/// Implementations wrap a borrowed `SqliteConnection` (or a transaction dereferencing to one), so
/// the caller decides the transactional scope. Each has separate associated types for create
/// requests, update requests, and the row it returns.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The request type for updating entities
    type UpdateRequest;

    /// The row type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Insert a new row
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Fetch a row by ID
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Fetch many rows by ID, keyed by ID. Unknown IDs are absent from the map.
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    /// List rows, newest first
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Delete a row by ID, returning whether it existed
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Apply a partial update, failing with `DbError::NotFound` for unknown IDs
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
