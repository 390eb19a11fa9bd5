//! Credential and session lifecycle service
//!
//! Accounts register with an email address and/or a username and a password.
//! A successful register or login opens one session per account: a signed
//! access token plus an opaque refresh token. Refreshing consumes the refresh
//! token and hands out a new pair.

pub mod error;
pub mod jwt;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod state;
pub mod validation;

pub use error::AuthError;
pub use service::{AuthService, SessionConfig};
pub use state::AppState;
