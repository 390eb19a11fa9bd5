//! Authentication service models

pub mod account;
pub mod credentials;
pub mod session;

// Re-export for convenience
pub use account::{Account, NewAccount};
pub use credentials::{CredentialsRequest, RefreshRequest, TokenBundle};
pub use session::Session;
