//! Application state shared across handlers.

use std::sync::Arc;

use deadpool_redis::Pool as RedisPool;
use sqlx::PgPool;

use crate::{
    audit::AuditLogger,
    auth::PasswordHasher,
    config::Config,
    error::Result,
    messaging::registry::ConnectionRegistry,
    middleware::JwtAuth,
    store::{CoreStore, PgCoreStore},
};

/// Application state injected into every handler via `axum::extract::State`.
///
/// Cloning is cheap: every field is itself `Arc`-backed or a pool type that
/// is cloneable by design (`PgPool`, `deadpool_redis::Pool`).
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    db: PgPool,
    redis: RedisPool,
    http_client: reqwest::Client,
    connections: Arc<ConnectionRegistry>,
    store: Arc<dyn CoreStore>,
    audit: AuditLogger,
    jwt_auth: JwtAuth,
    password_hasher: PasswordHasher,
}

impl AppState {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &PgPool {
        &self.db
    }

    pub fn redis(&self) -> &RedisPool {
        &self.redis
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn store(&self) -> &Arc<dyn CoreStore> {
        &self.store
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    pub fn jwt_auth(&self) -> &JwtAuth {
        &self.jwt_auth
    }

    pub fn password_hasher(&self) -> &PasswordHasher {
        &self.password_hasher
    }

    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }
}

/// Builder for `AppState`, establishing the database and Redis pools.
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
    db: Option<PgPool>,
    redis: Option<RedisPool>,
    store: Option<Arc<dyn CoreStore>>,
}

impl AppStateBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn db(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }

    pub fn redis(mut self, pool: RedisPool) -> Self {
        self.redis = Some(pool);
        self
    }

    /// Override the backing store (tests typically inject `MemoryCoreStore` here).
    pub fn store(mut self, store: Arc<dyn CoreStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the `AppState`, connecting to Postgres and Redis if pools
    /// weren't supplied explicitly (tests typically supply both directly).
    pub async fn build(self) -> Result<AppState> {
        let config = self.config.ok_or_else(|| {
            crate::error::Error::Internal("AppStateBuilder requires a config".to_string())
        })?;

        let db = match self.db {
            Some(pool) => pool,
            None => create_pg_pool(&config).await?,
        };

        let redis = match self.redis {
            Some(pool) => pool,
            None => create_redis_pool(&config)?,
        };

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.service.timeout_secs))
            .build()
            .map_err(|e| crate::error::Error::Internal(format!("failed to build http client: {e}")))?;

        let store = match self.store {
            Some(store) => store,
            None => Arc::new(PgCoreStore::new(db.clone(), config.core_table.clone())),
        };

        let audit = AuditLogger::new(config.service.name.clone());
        let jwt_auth = JwtAuth::new(&config, redis.clone())?;
        let password_hasher = PasswordHasher::new(&config.password);

        Ok(AppState {
            config: Arc::new(config),
            db,
            redis,
            http_client,
            connections: Arc::new(ConnectionRegistry::new()),
            store,
            audit,
            jwt_auth,
            password_hasher,
        })
    }
}

async fn create_pg_pool(config: &Config) -> Result<PgPool> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.database.connection_timeout_secs))
        .connect(&config.database.url)
        .await
        .map_err(Into::into)
}

fn create_redis_pool(config: &Config) -> Result<RedisPool> {
    let cfg = deadpool_redis::Config::from_url(config.redis.url.clone());
    cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| crate::error::Error::Internal(format!("failed to build redis pool: {e}")))
}
