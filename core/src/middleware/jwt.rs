//! JWT authentication middleware (HS256 local issuance + federated claims).

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use deadpool_redis::Pool as RedisPool;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::Error};

/// Claims carried by both locally-issued and federated access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the Waymark user id (a UUID, string-encoded).
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// JWT ID, checked against the revocation set on every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Subscription tier (`default` / `premium` / `admin`), used by the edge
    /// gateway to select a usage plan without a store round-trip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// `"access"` or `"refresh"`; lets `renew`/`logout` tell the two token
    /// kinds apart since both are HS256 JWTs signed with the same secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<uuid::Uuid, Error> {
        uuid::Uuid::parse_str(&self.sub).map_err(|_| Error::invalid_token("subject is not a valid user id"))
    }
}

/// Redis-backed revocation set for logged-out / rotated tokens. Keys are
/// `jwt:revoked:{jti}`, set with a TTL matching the token's remaining
/// lifetime so the set self-prunes.
#[derive(Clone)]
pub struct TokenRevocation {
    pool: RedisPool,
}

impl TokenRevocation {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn key(jti: &str) -> String {
        format!("jwt:revoked:{jti}")
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, Error> {
        use deadpool_redis::redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;
        let exists: bool = conn.exists(Self::key(jti)).await?;
        Ok(exists)
    }

    pub async fn revoke(&self, jti: &str, ttl_secs: u64) -> Result<(), Error> {
        use deadpool_redis::redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;
        conn.set_ex::<_, _, ()>(Self::key(jti), 1, ttl_secs).await?;
        Ok(())
    }
}

/// JWT validation state shared across the auth middleware.
#[derive(Clone)]
pub struct JwtAuth {
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
    revocation: TokenRevocation,
}

impl JwtAuth {
    pub fn new(config: &Config, redis: RedisPool) -> Result<Self, Error> {
        let algorithm = match config.jwt.algorithm.to_uppercase().as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => return Err(Error::Internal(format!("unsupported jwt algorithm: {other}"))),
        };

        let decoding_key = DecodingKey::from_secret(config.jwt.secret.as_bytes());

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);

        Ok(Self {
            decoding_key: Arc::new(decoding_key),
            validation,
            revocation: TokenRevocation::new(redis),
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, Error> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => Error::expired_token("access token has expired"),
                _ => Error::invalid_token("access token failed validation"),
            }
        })?;
        Ok(token_data.claims)
    }

    pub fn extract_token(headers: &axum::http::HeaderMap) -> Result<&str, Error> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::invalid_token("missing authorization header"))?;

        auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::invalid_token("authorization header is not a bearer token"))
    }

    pub async fn middleware(State(auth): State<Self>, mut request: Request<Body>, next: Next) -> Result<Response, Error> {
        let token = Self::extract_token(request.headers())?.to_string();
        let claims = auth.validate_token(&token)?;

        if let Some(jti) = &claims.jti {
            if auth.revocation.is_revoked(jti).await? {
                return Err(Error::revoked_token("access token has been revoked"));
            }
        }

        request.extensions_mut().insert(claims);
        Ok(next.run(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn extract_token_rejects_missing_header() {
        let headers = HeaderMap::new();
        let err = JwtAuth::extract_token(&headers).unwrap_err();
        assert_eq!(err.code(), "auth.invalid_token");
    }

    #[test]
    fn extract_token_rejects_non_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(JwtAuth::extract_token(&headers).is_err());
    }

    #[test]
    fn extract_token_parses_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(JwtAuth::extract_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn revocation_key_is_namespaced() {
        assert_eq!(TokenRevocation::key("jti-1"), "jwt:revoked:jti-1");
    }
}
