//! Configuration management using Figment.
//!
//! Loaded from, in increasing precedence:
//! 1. Built-in defaults
//! 2. `./config.toml`
//! 3. Domain environment variables named exactly as in the external
//!    interface contract (`CORE_TABLE`, `JWT_ISSUER`, ...)
//! 4. `WAYMARK_`-prefixed environment variables, for ambient service
//!    settings (port, log level, environment name)

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

const DOMAIN_ENV_KEYS: &[&str] = &[
    "core_table",
    "guild_table",
    "jwt_issuer",
    "jwt_audience",
    "jwt_secret_param",
    "frontend_base_url",
    "allowed_origins",
    "rate_limit_requests_per_hour",
    "max_invites_per_user_per_hour",
    "max_comments_per_user_per_hour",
    "avatar_max_size_mb",
    "avatar_allowed_types",
    "avatar_bucket",
    "cache_ttl_seconds",
    "subscription_webhook_secret_param",
    "api_key_param",
];

/// Top-level configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,

    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub jwt: JwtConfig,

    #[serde(default = "default_core_table")]
    pub core_table: String,
    #[serde(default = "default_guild_table")]
    pub guild_table: String,

    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Name of the secrets-manager parameter holding the HS256 signing
    /// secret. Resolved into `jwt.secret` at startup; see
    /// [`Config::resolve_jwt_secret`].
    pub jwt_secret_param: String,

    #[serde(default = "default_frontend_base_url")]
    pub frontend_base_url: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_rate_limit_requests_per_hour")]
    pub rate_limit_requests_per_hour: u32,
    #[serde(default = "default_max_invites_per_user_per_hour")]
    pub max_invites_per_user_per_hour: u32,
    #[serde(default = "default_max_comments_per_user_per_hour")]
    pub max_comments_per_user_per_hour: u32,

    #[serde(default = "default_avatar_max_size_mb")]
    pub avatar_max_size_mb: u32,
    #[serde(default = "default_avatar_allowed_types")]
    pub avatar_allowed_types: Vec<String>,
    #[serde(default = "default_avatar_bucket")]
    pub avatar_bucket: String,

    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Name of the secrets-manager parameter holding the subscription
    /// webhook's HMAC signing secret, resolved the same way as
    /// `jwt_secret_param`; see [`Config::resolve_webhook_secret`].
    #[serde(default = "default_subscription_webhook_secret_param")]
    pub subscription_webhook_secret_param: String,
    #[serde(default)]
    pub subscription_webhook_secret: String,

    /// Name of the secrets-manager parameter holding the shared `x-api-key`
    /// value checked on the api-key and bearer+api-key routes, resolved the
    /// same way as `jwt_secret_param`; see [`Config::resolve_api_key`].
    #[serde(default = "default_api_key_param")]
    pub api_key_param: String,
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub lockout: LockoutLimitsConfig,

    #[serde(default)]
    pub password: PasswordConfig,

    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            port: default_port(),
            log_level: default_log_level(),
            environment: default_environment(),
            timeout_secs: default_timeout(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Resolved HS256 signing secret, populated by
    /// [`Config::resolve_jwt_secret`] from `jwt_secret_param`. Empty until
    /// resolved; never read directly off `Config::load()`.
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_refresh_token_ttl_secs")]
    pub refresh_token_ttl_secs: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: default_jwt_algorithm(),
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_token_ttl_secs: default_refresh_token_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutLimitsConfig {
    #[serde(default = "default_lockout_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_lockout_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_lockout_duration_secs")]
    pub lockout_duration_secs: u64,
    #[serde(default = "default_lockout_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_lockout_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for LockoutLimitsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_lockout_max_attempts(),
            window_secs: default_lockout_window_secs(),
            lockout_duration_secs: default_lockout_duration_secs(),
            base_delay_ms: default_lockout_base_delay_ms(),
            max_delay_ms: default_lockout_max_delay_ms(),
        }
    }
}

impl LockoutLimitsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout_duration_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_argon2_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_argon2_iterations")]
    pub iterations: u32,
    #[serde(default = "default_argon2_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_argon2_memory_kib(),
            iterations: default_argon2_iterations(),
            parallelism: default_argon2_parallelism(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_url: String,
}

fn default_service_name() -> String {
    "waymark".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_environment() -> String {
    "dev".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_body_limit_mb() -> usize {
    10
}
fn default_max_connections() -> u32 {
    50
}
fn default_min_connections() -> u32 {
    5
}
fn default_connection_timeout() -> u64 {
    10
}
fn default_redis_max_connections() -> usize {
    20
}
fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}
fn default_access_token_ttl_secs() -> i64 {
    900
}
fn default_refresh_token_ttl_secs() -> i64 {
    30 * 24 * 3600
}
fn default_core_table() -> String {
    "waymark_core".to_string()
}
fn default_guild_table() -> String {
    "waymark_guild".to_string()
}
fn default_frontend_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}
fn default_rate_limit_requests_per_hour() -> u32 {
    1000
}
fn default_max_invites_per_user_per_hour() -> u32 {
    20
}
fn default_max_comments_per_user_per_hour() -> u32 {
    30
}
fn default_avatar_max_size_mb() -> u32 {
    5
}
fn default_avatar_allowed_types() -> Vec<String> {
    vec!["image/png".to_string(), "image/jpeg".to_string(), "image/webp".to_string()]
}
fn default_avatar_bucket() -> String {
    "waymark-guild-avatars".to_string()
}
fn default_cache_ttl_seconds() -> u64 {
    300
}
fn default_subscription_webhook_secret_param() -> String {
    "waymark-subscription-webhook-secret".to_string()
}
fn default_api_key_param() -> String {
    "waymark-gateway-api-key".to_string()
}
fn default_lockout_max_attempts() -> u32 {
    5
}
fn default_lockout_window_secs() -> u64 {
    15 * 60
}
fn default_lockout_duration_secs() -> u64 {
    15 * 60
}
fn default_lockout_base_delay_ms() -> u64 {
    200
}
fn default_lockout_max_delay_ms() -> u64 {
    5_000
}
fn default_argon2_memory_kib() -> u32 {
    19_456
}
fn default_argon2_iterations() -> u32 {
    2
}
fn default_argon2_parallelism() -> u32 {
    1
}

impl Config {
    /// Load configuration from all sources, in ascending precedence:
    /// defaults, `./config.toml`, the spec's literal domain env var names,
    /// then `WAYMARK_`-prefixed ambient env vars.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::new();

        if std::path::Path::new("config.toml").exists() {
            tracing::info!("loading configuration from config.toml");
            figment = figment.merge(Toml::file("config.toml"));
        }

        figment = figment.merge(Env::raw().only(DOMAIN_ENV_KEYS));
        figment = figment.merge(Env::prefixed("WAYMARK_").split("_"));

        let mut config: Config = figment.extract()?;
        config.resolve_jwt_secret();
        config.resolve_webhook_secret();
        config.resolve_api_key();
        Ok(config)
    }

    /// Load configuration from a specific file, bypassing the default
    /// search path. Used by tests and non-standard deployments.
    pub fn load_from(path: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::raw().only(DOMAIN_ENV_KEYS))
            .merge(Env::prefixed("WAYMARK_").split("_"));
        let mut config: Config = figment.extract()?;
        config.resolve_jwt_secret();
        config.resolve_webhook_secret();
        config.resolve_api_key();
        Ok(config)
    }

    /// Resolve `jwt.secret` from `jwt_secret_param`. In a real deployment
    /// this names a secrets-manager parameter; here it's read as an
    /// environment variable of that name, falling back to treating
    /// `jwt_secret_param` itself as the literal secret for local/dev use.
    fn resolve_jwt_secret(&mut self) {
        if !self.jwt.secret.is_empty() {
            return;
        }
        self.jwt.secret = std::env::var(&self.jwt_secret_param).unwrap_or_else(|_| self.jwt_secret_param.clone());
    }

    /// Resolve `subscription_webhook_secret` from
    /// `subscription_webhook_secret_param`, the same secrets-manager-param
    /// indirection used for the JWT signing secret.
    fn resolve_webhook_secret(&mut self) {
        if !self.subscription_webhook_secret.is_empty() {
            return;
        }
        self.subscription_webhook_secret =
            std::env::var(&self.subscription_webhook_secret_param).unwrap_or_else(|_| self.subscription_webhook_secret_param.clone());
    }

    /// Resolve `api_key` from `api_key_param`, the same secrets-manager-param
    /// indirection used for the JWT signing secret.
    fn resolve_api_key(&mut self) {
        if !self.api_key.is_empty() {
            return;
        }
        self.api_key = std::env::var(&self.api_key_param).unwrap_or_else(|_| self.api_key_param.clone());
    }

    /// Build a `Config` directly from defaults merged with an explicit
    /// override map. Primarily used by tests that don't want to touch the
    /// filesystem or environment.
    pub fn from_defaults(overrides: impl Serialize) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(overrides));
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_from_explicit_toml() {
        let toml = r#"
            core_table = "test_core"
            guild_table = "test_guild"
            jwt_issuer = "https://waymark.test"
            jwt_audience = "waymark-api"
            jwt_secret_param = "test-secret"

            [database]
            url = "postgres://localhost/test"

            [redis]
            url = "redis://localhost"
        "#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();

        let config = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.core_table, "test_core");
        assert_eq!(config.rate_limit_requests_per_hour, 1000);
        assert_eq!(config.service.port, 8080);
        // No literal env var named "test-secret" exists, so the fallback
        // treats jwt_secret_param itself as the secret.
        assert_eq!(config.jwt.secret, "test-secret");
    }
}
