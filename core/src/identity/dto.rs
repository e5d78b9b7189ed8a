//! Request/response bodies for the identity surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{SubscriptionTier, UserProfile};
use crate::validation::{self, Validate};

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub nickname: String,
}

impl Validate for SignupRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        let mut errors = Vec::new();
        if let Some(e) = validation::email("email", &self.email) {
            errors.push(e);
        }
        if let Some(e) = validation::non_empty_text("nickname", &self.nickname, 60) {
            errors.push(e);
        }
        if self.password.len() < 8 {
            errors.push("password must be at least 8 characters".to_string());
        }
        validation::collect(errors)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        let mut errors = Vec::new();
        if let Some(e) = validation::email("email", &self.email) {
            errors.push(e);
        }
        if self.password.is_empty() {
            errors.push("password must not be empty".to_string());
        }
        validation::collect(errors)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginFederatedRequest {
    /// Authorization code returned by Google's OAuth redirect.
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenewRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        let mut errors = Vec::new();
        if let Some(nickname) = &self.nickname {
            if let Some(e) = validation::non_empty_text("nickname", nickname, 60) {
                errors.push(e);
            }
        }
        if let Some(url) = &self.avatar_url {
            if url.chars().count() > 2048 {
                errors.push("avatarUrl must be at most 2048 characters".to_string());
            }
        }
        validation::collect(errors)
    }
}

/// Public-facing profile view: no password hash, no federated subject.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub tier: SubscriptionTier,
    pub xp: i64,
    pub level: i32,
    pub badges: Vec<String>,
    pub version: i64,
}

impl From<(&UserProfile, i64)> for ProfileResponse {
    fn from((profile, version): (&UserProfile, i64)) -> Self {
        Self {
            id: profile.user_id,
            email: profile.email.clone(),
            nickname: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            email_verified: profile.email_verified,
            tier: profile.tier,
            xp: profile.xp,
            level: profile.level,
            badges: profile.badges.clone(),
            version,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupResponse {
    pub id: Uuid,
    pub verification_token: String,
}
