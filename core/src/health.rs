//! Health and readiness check handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::DerefMut;

use crate::{error::Error, state::AppState};

/// Liveness response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Readiness response with per-dependency status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub service: String,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Liveness probe. Always 200 while the process is running; used by
/// orchestrators to decide whether to restart the pod.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        service: state.config().service.name.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    (StatusCode::OK, Json(response))
}

/// Readiness probe. Pings Postgres and Redis; 503 if either is unreachable.
/// Used by orchestrators to decide whether to route traffic to the pod.
pub async fn readiness(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let mut dependencies = HashMap::new();
    let mut all_ready = true;

    match sqlx::query("SELECT 1").fetch_one(state.db()).await {
        Ok(_) => {
            dependencies.insert(
                "database".to_string(),
                DependencyStatus {
                    healthy: true,
                    message: Some("connected".to_string()),
                },
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "database readiness check failed");
            all_ready = false;
            dependencies.insert(
                "database".to_string(),
                DependencyStatus {
                    healthy: false,
                    message: Some(format!("connection failed: {e}")),
                },
            );
        }
    }

    match state.redis().get().await {
        Ok(mut conn) => match redis::cmd("PING").query_async::<String>(conn.deref_mut()).await {
            Ok(_) => {
                dependencies.insert(
                    "redis".to_string(),
                    DependencyStatus {
                        healthy: true,
                        message: Some("connected".to_string()),
                    },
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "redis ping failed");
                all_ready = false;
                dependencies.insert(
                    "redis".to_string(),
                    DependencyStatus {
                        healthy: false,
                        message: Some(format!("ping failed: {e}")),
                    },
                );
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "failed to acquire redis connection");
            all_ready = false;
            dependencies.insert(
                "redis".to_string(),
                DependencyStatus {
                    healthy: false,
                    message: Some(format!("pool error: {e}")),
                },
            );
        }
    }

    let response = ReadinessResponse {
        ready: all_ready,
        service: state.config().service.name.clone(),
        dependencies,
    };

    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((status, Json(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            service: "waymark".to_string(),
            version: Some("1.0.0".to_string()),
        };
        assert_eq!(response.status, "healthy");
    }

    #[test]
    fn dependency_status_tracks_message() {
        let status = DependencyStatus {
            healthy: true,
            message: Some("ok".to_string()),
        };
        assert!(status.healthy);
        assert_eq!(status.message, Some("ok".to_string()));
    }
}
