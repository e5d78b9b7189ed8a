//! Account lifecycle: signup, login (local and federated), token renewal,
//! and profile management.

pub mod dto;
pub mod service;

pub use dto::{
    AuthTokens, LoginFederatedRequest, LoginRequest, ProfileResponse, RenewRequest, SignupRequest,
    SignupResponse, UpdateProfileRequest,
};
pub use service::IdentityService;
