//! `/guilds/**` handlers: CRUD, membership, moderation, comments, reactions,
//! and avatar upload.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use waymark_core::domain::GuildVisibility;
use waymark_core::error::Result;
use waymark_core::guilds::{
    AvatarConfirmRequest, AvatarUploadRequest, AvatarUploadResponse, CommentResponse, CreateCommentRequest,
    CreateGuildRequest, GuildResponse, JoinGuildRequest, JoinOutcome, JoinRequestResponse, MemberResponse, ReactRequest,
    UpdateGuildRequest,
};
use waymark_core::middleware::Claims;
use waymark_core::responses::{Created, NoContent};
use waymark_core::store::Page;

use crate::pagination::PageQuery;
use crate::state::GatewayState;
use crate::version::ExpectedVersion;

pub async fn create_guild(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateGuildRequest>,
) -> Result<Created<GuildResponse>> {
    let guild = state.guilds.create_guild(claims.user_id()?, request).await?;
    Ok(Created::new(guild))
}

pub async fn get_guild(State(state): State<GatewayState>, Path(guild_id): Path<Uuid>) -> Result<Json<GuildResponse>> {
    let guild = state.guilds.get_guild(guild_id).await?;
    Ok(Json(guild))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListGuildsQuery {
    pub visibility: GuildVisibility,
}

pub async fn list_guilds(
    State(state): State<GatewayState>,
    Query(filter): Query<ListGuildsQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<GuildResponse>>> {
    let page = state.guilds.list_guilds_by_visibility(filter.visibility, page.into()).await?;
    Ok(Json(page))
}

pub async fn update_guild(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(guild_id): Path<Uuid>,
    Query(version): Query<ExpectedVersion>,
    Json(request): Json<UpdateGuildRequest>,
) -> Result<Json<GuildResponse>> {
    let guild = state.guilds.update_guild(claims.user_id()?, guild_id, request, version.expected_version).await?;
    Ok(Json(guild))
}

pub async fn join_guild(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(guild_id): Path<Uuid>,
    Json(request): Json<JoinGuildRequest>,
) -> Result<Json<JoinOutcome>> {
    let outcome = state.guilds.join_guild(claims.user_id()?, guild_id, request).await?;
    Ok(Json(outcome))
}

pub async fn list_join_requests(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(guild_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<JoinRequestResponse>>> {
    let page = state.guilds.list_join_requests(claims.user_id()?, guild_id, page.into()).await?;
    Ok(Json(page))
}

pub async fn approve_join_request(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path((guild_id, target_user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MemberResponse>> {
    let member = state.guilds.approve_join_request(claims.user_id()?, guild_id, target_user_id).await?;
    Ok(Json(member))
}

pub async fn reject_join_request(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path((guild_id, target_user_id)): Path<(Uuid, Uuid)>,
) -> Result<NoContent> {
    state.guilds.reject_join_request(claims.user_id()?, guild_id, target_user_id).await?;
    Ok(NoContent)
}

pub async fn remove_member(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path((guild_id, target_user_id)): Path<(Uuid, Uuid)>,
) -> Result<NoContent> {
    state.guilds.remove_member(claims.user_id()?, guild_id, target_user_id).await?;
    Ok(NoContent)
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockedBody {
    pub blocked: bool,
}

pub async fn set_member_blocked(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path((guild_id, target_user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<BlockedBody>,
) -> Result<Json<MemberResponse>> {
    let member = state.guilds.set_member_blocked(claims.user_id()?, guild_id, target_user_id, body.blocked).await?;
    Ok(Json(member))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeratorBody {
    pub is_moderator: bool,
}

pub async fn set_moderator(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path((guild_id, target_user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ModeratorBody>,
) -> Result<Json<MemberResponse>> {
    let member = state.guilds.set_moderator(claims.user_id()?, guild_id, target_user_id, body.is_moderator).await?;
    Ok(Json(member))
}

pub async fn transfer_ownership(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path((guild_id, new_owner_id)): Path<(Uuid, Uuid)>,
) -> Result<NoContent> {
    state.guilds.transfer_ownership(claims.user_id()?, guild_id, new_owner_id).await?;
    Ok(NoContent)
}

pub async fn create_comment(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(guild_id): Path<Uuid>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Created<CommentResponse>> {
    let comment = state.guilds.create_comment(claims.user_id()?, guild_id, request).await?;
    Ok(Created::new(comment))
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListCommentsQuery {
    pub parent_id: Option<Uuid>,
}

pub async fn list_comments(
    State(state): State<GatewayState>,
    Path(guild_id): Path<Uuid>,
    Query(filter): Query<ListCommentsQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<CommentResponse>>> {
    let page = state.guilds.list_comments(guild_id, filter.parent_id, page.into()).await?;
    Ok(Json(page))
}

pub async fn delete_comment(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path((guild_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<NoContent> {
    state.guilds.delete_comment(claims.user_id()?, guild_id, comment_id).await?;
    Ok(NoContent)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleCommentsBody {
    pub enabled: bool,
}

pub async fn toggle_comments(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(guild_id): Path<Uuid>,
    Json(body): Json<ToggleCommentsBody>,
) -> Result<Json<GuildResponse>> {
    let guild = state.guilds.toggle_comments(claims.user_id()?, guild_id, body.enabled).await?;
    Ok(Json(guild))
}

pub async fn toggle_reaction(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path((guild_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ReactRequest>,
) -> Result<Json<bool>> {
    let added = state.guilds.toggle_reaction(claims.user_id()?, guild_id, comment_id, request).await?;
    Ok(Json(added))
}

pub async fn presign_avatar_upload(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(guild_id): Path<Uuid>,
    Json(request): Json<AvatarUploadRequest>,
) -> Result<Json<AvatarUploadResponse>> {
    let response = state.guilds.presign_avatar_upload(claims.user_id()?, guild_id, request).await?;
    Ok(Json(response))
}

pub async fn confirm_avatar_upload(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(guild_id): Path<Uuid>,
    Json(request): Json<AvatarConfirmRequest>,
) -> Result<Json<GuildResponse>> {
    let guild = state.guilds.confirm_avatar_upload(claims.user_id()?, guild_id, request).await?;
    Ok(Json(guild))
}
