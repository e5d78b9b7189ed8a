//! Identity service: the one place account state, local credentials, and
//! federated login converge on a single `UserProfile` row.

use std::sync::Arc;

use chrono::Utc;
use deadpool_redis::Pool as RedisPool;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::oauth::{GoogleProvider, OAuthProvider};
use crate::auth::password::PasswordHasher;
use crate::config::Config;
use crate::domain::{keys, EntityType, SubscriptionTier, UserProfile};
use crate::error::{Error, Result};
use crate::lockout::{LockoutConfig, LoginLockout};
use crate::middleware::jwt::{Claims, JwtAuth, TokenRevocation};
use crate::store::{CoreStore, StoreItem};
use crate::validation::Validate;

use super::dto::{
    AuthTokens, LoginFederatedRequest, LoginRequest, ProfileResponse, RenewRequest, SignupRequest,
    SignupResponse, UpdateProfileRequest,
};

const ACCESS_PURPOSE: &str = "access";
const REFRESH_PURPOSE: &str = "refresh";

/// Maps a `put_if_absent` conflict into the public `conflict.state` code,
/// passing through any other error (pool exhaustion, etc.) unchanged.
fn email_taken_on_conflict(err: Error) -> Error {
    if err.code() == "conflict.version" {
        Error::ConflictState("email is already registered".to_string())
    } else {
        err
    }
}

/// Account lifecycle operations: `signup`, `verifyEmail`, `login`,
/// `loginFederated`, `renew`, `logout`, `getProfile`, `updateProfile`.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn CoreStore>,
    jwt: JwtAuth,
    revocation: TokenRevocation,
    encoding_key: Arc<EncodingKey>,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    password_hasher: PasswordHasher,
    lockout: LoginLockout,
    google: Option<Arc<GoogleProvider>>,
}

impl IdentityService {
    pub fn new(config: &Config, store: Arc<dyn CoreStore>, redis: RedisPool) -> Result<Self> {
        let jwt = JwtAuth::new(config, redis.clone())?;
        let algorithm = match config.jwt.algorithm.to_uppercase().as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => return Err(Error::Internal(format!("unsupported jwt algorithm: {other}"))),
        };

        let google = match &config.oauth {
            Some(oauth_config) => Some(Arc::new(GoogleProvider::new(oauth_config)?)),
            None => None,
        };

        let revocation = TokenRevocation::new(redis.clone());
        let lockout = LoginLockout::new(LockoutConfig::from(&config.lockout), redis);

        Ok(Self {
            store,
            jwt,
            revocation,
            encoding_key: Arc::new(EncodingKey::from_secret(config.jwt.secret.as_bytes())),
            algorithm,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            access_ttl_secs: config.jwt.access_token_ttl_secs,
            refresh_ttl_secs: config.jwt.refresh_token_ttl_secs,
            password_hasher: PasswordHasher::new(&config.password),
            lockout,
            google,
        })
    }

    fn issue_token(&self, profile: &UserProfile, purpose: &str, ttl_secs: i64) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: profile.user_id.to_string(),
            email: Some(profile.email.clone()),
            exp: now + ttl_secs,
            iat: Some(now),
            jti: Some(Uuid::new_v4().to_string()),
            iss: Some(self.issuer.clone()),
            aud: Some(self.audience.clone()),
            tier: Some(profile.tier.as_usage_plan().to_string()),
            purpose: Some(purpose.to_string()),
        };
        let header = Header::new(self.algorithm);
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    fn issue_token_pair(&self, profile: &UserProfile) -> Result<AuthTokens> {
        Ok(AuthTokens {
            access_token: self.issue_token(profile, ACCESS_PURPOSE, self.access_ttl_secs)?,
            refresh_token: self.issue_token(profile, REFRESH_PURPOSE, self.refresh_ttl_secs)?,
            expires_in: self.access_ttl_secs,
        })
    }

    async fn load_profile_by_id(&self, user_id: Uuid) -> Result<(UserProfile, i64)> {
        let item = self
            .store
            .get(&keys::user_pk(&user_id.to_string()), keys::PROFILE_SK)
            .await?
            .ok_or_else(|| Error::NotFound("user profile not found".to_string()))?;
        let profile: UserProfile = item.attrs_as()?;
        Ok((profile, item.version))
    }

    async fn load_profile_by_email(&self, email: &str) -> Result<Option<(UserProfile, i64)>> {
        let reservation = self
            .store
            .get(&keys::email_reservation_pk(email), keys::RESERVATION_SK)
            .await?;
        let Some(reservation) = reservation else {
            return Ok(None);
        };
        #[derive(serde::Deserialize)]
        struct ReservationAttrs {
            user_id: Uuid,
        }
        let attrs: ReservationAttrs = reservation.attrs_as()?;
        Ok(Some(self.load_profile_by_id(attrs.user_id).await?))
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<SignupResponse> {
        request.validate()?;

        let user_id = Uuid::new_v4();
        let now = Utc::now();

        self.store
            .put_if_absent(StoreItem::new(
                keys::email_reservation_pk(&request.email),
                keys::RESERVATION_SK,
                EntityType::EmailReservation,
                json!({ "email": request.email.to_lowercase(), "user_id": user_id }),
            ))
            .await
            .map_err(email_taken_on_conflict)?;

        let password_hash = self.password_hasher.hash(&request.password)?;

        let profile = UserProfile {
            user_id,
            email: request.email.to_lowercase(),
            display_name: request.nickname,
            password_hash: Some(password_hash),
            federated_subject: None,
            avatar_url: None,
            email_verified: false,
            disabled: false,
            tier: SubscriptionTier::Free,
            xp: 0,
            level: 1,
            badges: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.store
            .put(StoreItem::new(
                keys::user_pk(&user_id.to_string()),
                keys::PROFILE_SK,
                EntityType::UserProfile,
                serde_json::to_value(&profile).map_err(|e| Error::Internal(e.to_string()))?,
            ))
            .await?;

        let verification_token = Uuid::new_v4().to_string();
        self.store
            .put(StoreItem::new(
                keys::email_verification_pk(&verification_token),
                keys::VERIFICATION_SK,
                EntityType::EmailVerificationToken,
                json!({ "user_id": user_id }),
            ))
            .await?;

        info!(user_id = %user_id, "account created");

        Ok(SignupResponse { id: user_id, verification_token })
    }

    pub async fn verify_email(&self, token: &str) -> Result<()> {
        let item = self
            .store
            .get(&keys::email_verification_pk(token), keys::VERIFICATION_SK)
            .await?
            .ok_or_else(|| Error::NotFound("verification token not found".to_string()))?;

        #[derive(serde::Deserialize)]
        struct VerifyAttrs {
            user_id: Uuid,
        }
        let attrs: VerifyAttrs = item.attrs_as()?;

        let (mut profile, version) = self.load_profile_by_id(attrs.user_id).await?;
        profile.email_verified = true;
        profile.updated_at = Utc::now();

        self.store
            .update_with_version(
                &keys::user_pk(&attrs.user_id.to_string()),
                keys::PROFILE_SK,
                version,
                serde_json::to_value(&profile).map_err(|e| Error::Internal(e.to_string()))?,
            )
            .await?;

        self.store
            .delete(&keys::email_verification_pk(token), keys::VERIFICATION_SK)
            .await?;

        Ok(())
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthTokens> {
        request.validate()?;
        let identity = request.email.to_lowercase();

        let status = self.lockout.check(&identity).await?;
        if status.locked {
            return Err(Error::locked(format!(
                "account locked, try again in {} seconds",
                status.lockout_remaining_secs
            )));
        }
        if status.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(status.delay_ms)).await;
        }

        let Some((profile, _version)) = self.load_profile_by_email(&identity).await? else {
            self.lockout.record_failure(&identity).await?;
            return Err(Error::invalid_credentials("invalid email or password"));
        };

        if profile.disabled {
            return Err(Error::permission_denied("account is disabled"));
        }

        let Some(password_hash) = &profile.password_hash else {
            self.lockout.record_failure(&identity).await?;
            return Err(Error::invalid_credentials("this account uses federated login"));
        };

        if !self.password_hasher.verify(&request.password, password_hash)? {
            self.lockout.record_failure(&identity).await?;
            return Err(Error::invalid_credentials("invalid email or password"));
        }

        self.lockout.record_success(&identity).await?;
        self.issue_token_pair(&profile)
    }

    pub async fn login_federated(&self, request: LoginFederatedRequest) -> Result<AuthTokens> {
        let google = self
            .google
            .as_ref()
            .ok_or_else(|| Error::DependencyUnavailable("federated login is not configured".to_string()))?;

        let tokens = google.exchange_code(&request.code).await?;
        let info = google.get_user_info(&tokens.access_token).await?;

        let email = info
            .email
            .ok_or_else(|| Error::Validation("google account has no email".to_string()))?
            .to_lowercase();

        if let Some((profile, _version)) = self.load_profile_by_email(&email).await? {
            return self.issue_token_pair(&profile);
        }

        let user_id = Uuid::new_v4();
        let now = Utc::now();

        self.store
            .put_if_absent(StoreItem::new(
                keys::email_reservation_pk(&email),
                keys::RESERVATION_SK,
                EntityType::EmailReservation,
                json!({ "email": email, "user_id": user_id }),
            ))
            .await
            .map_err(email_taken_on_conflict)?;

        let profile = UserProfile {
            user_id,
            email: email.clone(),
            display_name: info.name.unwrap_or_else(|| email.clone()),
            password_hash: None,
            federated_subject: Some(info.provider_user_id),
            avatar_url: info.picture,
            email_verified: info.email_verified,
            disabled: false,
            tier: SubscriptionTier::Free,
            xp: 0,
            level: 1,
            badges: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.store
            .put(StoreItem::new(
                keys::user_pk(&user_id.to_string()),
                keys::PROFILE_SK,
                EntityType::UserProfile,
                serde_json::to_value(&profile).map_err(|e| Error::Internal(e.to_string()))?,
            ))
            .await?;

        info!(user_id = %user_id, "account created via google federated login");

        self.issue_token_pair(&profile)
    }

    pub async fn renew(&self, request: RenewRequest) -> Result<AuthTokens> {
        let claims = self.jwt.validate_token(&request.refresh_token)?;
        if claims.purpose.as_deref() != Some(REFRESH_PURPOSE) {
            return Err(Error::invalid_token("not a refresh token"));
        }

        if let Some(jti) = &claims.jti {
            if self.revocation.is_revoked(jti).await? {
                return Err(Error::revoked_token("refresh token has been revoked"));
            }
        }

        let (profile, _version) = self.load_profile_by_id(claims.user_id()?).await?;
        let tokens = self.issue_token_pair(&profile)?;

        if let Some(jti) = &claims.jti {
            let remaining = (claims.exp - Utc::now().timestamp()).max(1) as u64;
            self.revocation.revoke(jti, remaining).await?;
        }

        Ok(tokens)
    }

    pub async fn logout(&self, access_token: &str) -> Result<()> {
        let claims = self.jwt.validate_token(access_token)?;
        let Some(jti) = &claims.jti else {
            warn!("logout called with a token carrying no jti; nothing to revoke");
            return Ok(());
        };
        let remaining = (claims.exp - Utc::now().timestamp()).max(1) as u64;
        self.revocation.revoke(jti, remaining).await
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<ProfileResponse> {
        let (profile, version) = self.load_profile_by_id(user_id).await?;
        Ok(ProfileResponse::from((&profile, version)))
    }

    pub async fn update_profile(&self, user_id: Uuid, patch: UpdateProfileRequest) -> Result<ProfileResponse> {
        patch.validate()?;
        let (mut profile, version) = self.load_profile_by_id(user_id).await?;

        if let Some(nickname) = patch.nickname {
            profile.display_name = nickname;
        }
        if let Some(avatar_url) = patch.avatar_url {
            profile.avatar_url = Some(avatar_url);
        }
        profile.updated_at = Utc::now();

        let item = self
            .store
            .update_with_version(
                &keys::user_pk(&user_id.to_string()),
                keys::PROFILE_SK,
                version,
                serde_json::to_value(&profile).map_err(|e| Error::Internal(e.to_string()))?,
            )
            .await?;

        Ok(ProfileResponse::from((&profile, item.version)))
    }
}
