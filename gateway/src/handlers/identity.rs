//! `/users/*`, `/auth/renew`, `/profile` handlers.

use axum::response::Response;
use axum::{extract::State, Extension, Json};
use waymark_core::edge::CachedRoute;
use waymark_core::error::Result;
use waymark_core::identity::{
    AuthTokens, LoginFederatedRequest, LoginRequest, ProfileResponse, RenewRequest, SignupRequest, SignupResponse,
    UpdateProfileRequest,
};
use waymark_core::middleware::Claims;
use waymark_core::responses::{Created, NoContent};

use crate::cached::read_through;
use crate::state::GatewayState;

pub async fn signup(State(state): State<GatewayState>, Json(request): Json<SignupRequest>) -> Result<Created<SignupResponse>> {
    let response = state.identity.signup(request).await?;
    Ok(Created::new(response))
}

pub async fn login(State(state): State<GatewayState>, Json(request): Json<LoginRequest>) -> Result<Json<AuthTokens>> {
    let tokens = state.identity.login(request).await?;
    Ok(Json(tokens))
}

pub async fn login_federated(
    State(state): State<GatewayState>,
    Json(request): Json<LoginFederatedRequest>,
) -> Result<Json<AuthTokens>> {
    let tokens = state.identity.login_federated(request).await?;
    Ok(Json(tokens))
}

pub async fn renew(State(state): State<GatewayState>, Json(request): Json<RenewRequest>) -> Result<Json<AuthTokens>> {
    let tokens = state.identity.renew(request).await?;
    Ok(Json(tokens))
}

pub async fn logout(
    State(state): State<GatewayState>,
    headers: axum::http::HeaderMap,
) -> Result<NoContent> {
    let token = waymark_core::middleware::JwtAuth::extract_token(&headers)?;
    state.identity.logout(token).await?;
    Ok(NoContent)
}

pub async fn get_profile(State(state): State<GatewayState>, Extension(claims): Extension<Claims>) -> Result<Response> {
    let user_id = claims.user_id()?;
    let principal = user_id.to_string();
    read_through(&state.cache, CachedRoute::Profile, &principal, "self", || async move {
        state.identity.get_profile(user_id).await
    })
    .await
}

pub async fn update_profile(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Json(patch): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>> {
    let user_id = claims.user_id()?;
    let profile = state.identity.update_profile(user_id, patch).await?;
    state.cache.invalidate(CachedRoute::Profile, &user_id.to_string(), "self").await?;
    Ok(Json(profile))
}
