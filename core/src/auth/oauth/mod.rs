//! Federated login (Google OIDC) for `loginFederated`.

pub mod provider;
pub mod providers;
pub mod state;

pub use provider::{OAuthProvider, OAuthTokens, OAuthUserInfo};
pub use providers::GoogleProvider;
pub use state::{generate_state, OAuthStateManager, RedisOAuthStateManager, StateData};
