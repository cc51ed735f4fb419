//! HTTP request handlers for all API endpoints.
//!
//! Handlers validate the request, check who is calling via the extractors in
//! [`crate::auth::current_user`], run the work through the database repositories or the ride
//! service, and serialize the response. Errors are returned as [`crate::errors::Error`], which
//! renders the status code and JSON body.
//!
//! # Handler Modules
//!
//! - [`accounts`]: Registration, login and password reset shared by riders and captains
//! - [`admin`]: Administrator login, dashboard, listings and account blocking
//! - [`captains`]: Captain accounts, stats and ride history
//! - [`maps`]: Geocoding, route estimates and place suggestions
//! - [`payments`]: Checkout orders and signature verification
//! - [`ratings`]: Rating completed rides
//! - [`rides`]: Fares, booking and the ride lifecycle
//! - [`socket`]: The realtime WebSocket upgrade
//! - [`users`]: Rider accounts and ride history

pub mod accounts;
pub mod admin;
pub mod captains;
pub mod maps;
pub mod payments;
pub mod ratings;
pub mod rides;
pub mod socket;
pub mod users;
