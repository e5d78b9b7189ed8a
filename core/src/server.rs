//! HTTP server with graceful shutdown.

use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
    config::Config,
    error::Result,
    middleware::{request_id_layer, request_id_propagation_layer, sensitive_headers_layer},
};

/// Owns the bound configuration and drives the axum server lifecycle.
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Wrap `app` with the standard middleware stack and serve it until a
    /// shutdown signal arrives.
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));

        tracing::info!("starting {} on {}", self.config.service.name, addr);
        self.log_middleware_config();

        let body_limit = self.config.service.body_limit_mb * 1024 * 1024;
        let cors_layer = self.build_cors_layer();

        let app = app
            .layer(cors_layer)
            .layer(CompressionLayer::new())
            .layer(TimeoutLayer::with_status_code(
                http::StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(self.config.service.timeout_secs),
            ))
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(true))
                    .on_response(DefaultOnResponse::new().include_headers(true)),
            )
            .layer(sensitive_headers_layer())
            .layer(request_id_propagation_layer())
            .layer(request_id_layer())
            .layer(CatchPanicLayer::new());

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("server listening on {}", addr);

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("server shutdown complete");
        Ok(())
    }

    fn log_middleware_config(&self) {
        tracing::info!("middleware configuration:");
        tracing::info!("  - panic recovery: enabled");
        tracing::info!("  - request id tracking: enabled");
        tracing::info!("  - sensitive header masking: enabled");
        tracing::info!("  - request body limit: {} MB", self.config.service.body_limit_mb);
        tracing::info!("  - compression: enabled");
        tracing::info!("  - allowed origins: {:?}", self.config.allowed_origins);
        tracing::info!("  - request timeout: {} seconds", self.config.service.timeout_secs);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Restricts CORS to `config.allowed_origins`, or permits any origin if
    /// the list contains the literal `"*"`.
    fn build_cors_layer(&self) -> CorsLayer {
        if self.config.allowed_origins.iter().any(|o| o == "*") {
            tracing::debug!("CORS: allowing any origin");
            return CorsLayer::permissive();
        }

        let origins: Vec<http::HeaderValue> = self
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        tracing::debug!("CORS: restricting to {} configured origin(s)", origins.len());

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

/// Waits for SIGTERM or SIGINT (Ctrl+C) so `serve` can drain in-flight
/// requests before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        },
    }

    tracing::info!("shutdown signal received, draining requests...");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let toml = r#"
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
        Config::load_from(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn server_exposes_its_config() {
        let config = test_config();
        let port = config.service.port;
        let server = Server::new(config);
        assert_eq!(server.config().service.port, port);
    }

    #[test]
    fn cors_layer_is_permissive_when_wildcard_configured() {
        let mut config = test_config();
        config.allowed_origins = vec!["*".to_string()];
        let server = Server::new(config);
        let _layer = server.build_cors_layer();
    }

    #[test]
    fn cors_layer_restricts_to_configured_origins() {
        let mut config = test_config();
        config.allowed_origins = vec!["https://app.waymark.test".to_string()];
        let server = Server::new(config);
        let _layer = server.build_cors_layer();
    }
}
