//! # waymark-core
//!
//! Domain and request-processing core for the Waymark goal-tracking and
//! guild-collaboration platform: identity, goals, quests, guilds,
//! collaboration, real-time messaging, gamification, and subscriptions,
//! fronted by a single HTTP + WebSocket edge.

pub mod config;
pub mod error;
pub mod ids;
pub mod health;
pub mod responses;
pub mod server;
pub mod state;

pub mod audit;
pub mod auth;
pub mod lockout;
pub mod middleware;
pub mod websocket;

pub mod domain;
pub mod store;
pub mod validation;

pub mod identity;
pub mod goals;
pub mod quests;
pub mod guilds;
pub mod collaboration;
pub mod messaging;
pub mod gamification;
pub mod subscription;
pub mod edge;

/// Prelude module for convenient imports across the binary crate.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::health::{health, readiness};
    pub use crate::ids::{MakeTypedRequestId, RequestId, RequestIdError};
    pub use crate::responses::{
        Accepted, Conflict, Created, FieldError, NoContent, Success, ValidationError,
    };
    pub use crate::server::Server;
    pub use crate::state::{AppState, AppStateBuilder};

    pub use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, HeaderValue, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::{delete, get, patch, post, put},
        Extension, Router,
    };

    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, instrument, trace, warn, Level, Span};
    pub use tokio;
    pub use async_trait::async_trait;
    pub use thiserror::Error;
    pub use anyhow::{self, Context as AnyhowContext};
    pub use chrono::{DateTime, Duration as ChronoDuration, Utc};
    pub use uuid::Uuid;
    pub use futures::{future, stream, Future, Stream, StreamExt, TryFutureExt, TryStreamExt};
    pub use http::{Method, Uri};
}
