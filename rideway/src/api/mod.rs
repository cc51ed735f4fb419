//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Riders** (`/user/*`): Accounts, ride history and ratings
//! - **Captains** (`/captain/*`): Accounts, stats and ride history
//! - **Rides** (`/ride/*`): Fares, booking and lifecycle transitions
//! - **Maps** (`/map/*`): Coordinates, distance and suggestions
//! - **Ratings** (`/rating/*`) and **Payments** (`/payment/*`)
//! - **Admin** (`/admin/*`): Dashboard and account management
//! - **Realtime** (`/ws`): Ride events and chat
//!
//! All endpoints are documented with `utoipa`. The rendered reference is served at `/docs`.

pub mod handlers;
pub mod models;
