//! Password hashing and federated-login support.
//!
//! Local JWT issuance lives in [`crate::middleware::jwt`] and the
//! `identity` service module; this module covers the two pieces those
//! don't: Argon2id password hashing and the Google OAuth provider used
//! by `loginFederated`.

pub mod oauth;
pub mod password;

pub use oauth::{generate_state, GoogleProvider, OAuthProvider, OAuthStateManager, OAuthTokens, OAuthUserInfo, StateData};
pub use password::PasswordHasher;
