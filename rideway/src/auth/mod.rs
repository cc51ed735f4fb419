//! Authentication for riders, captains and the administrator.
//!
//! Sessions are stateless HS256 JWTs. Logging out records a fingerprint of the token in the
//! blacklist until it would have expired anyway.
//!
//! - [`current_user`]: axum extractors ([`current_user::CurrentUser`],
//!   [`current_user::CurrentCaptain`], [`current_user::AdminSession`], [`current_user::Principal`],
//!   and [`current_user::SocketPrincipal`] for the `/ws` upgrade)
//! - [`password`]: argon2 hashing, reset tokens and OTPs
//! - [`session`]: token issue and verification, session cookies
//!
//! ```ignore
//! use rideway::auth::current_user::CurrentUser;
//!
//! async fn profile(current: CurrentUser) -> String {
//!     current.user.email
//! }
//! ```

pub mod admin;
pub mod current_user;
pub mod password;
pub mod session;
