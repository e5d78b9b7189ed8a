//! Goal collaboration invite and comment handlers.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use waymark_core::collaboration::{CollaboratorResponse, CreateGoalCommentRequest, CreateInviteRequest, GoalCommentResponse, InviteResponse};
use waymark_core::error::Result;
use waymark_core::middleware::Claims;
use waymark_core::responses::{Created, NoContent};
use waymark_core::store::Page;

use crate::pagination::PageQuery;
use crate::state::GatewayState;

pub async fn create_invite(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(goal_id): Path<Uuid>,
    Json(request): Json<CreateInviteRequest>,
) -> Result<Created<InviteResponse>> {
    let invite = state.collaboration.create_invite(claims.user_id()?, goal_id, request).await?;
    Ok(Created::new(invite))
}

pub async fn list_incoming_invites(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<InviteResponse>>> {
    let page = state.collaboration.list_incoming_invites(claims.user_id()?, page.into()).await?;
    Ok(Json(page))
}

pub async fn list_outgoing_invites(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(goal_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<InviteResponse>>> {
    let page = state.collaboration.list_outgoing_invites(claims.user_id()?, goal_id, page.into()).await?;
    Ok(Json(page))
}

pub async fn accept_invite(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<CollaboratorResponse>> {
    let collaborator = state.collaboration.accept_invite(claims.user_id()?, goal_id).await?;
    Ok(Json(collaborator))
}

pub async fn decline_invite(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(goal_id): Path<Uuid>,
) -> Result<NoContent> {
    state.collaboration.decline_invite(claims.user_id()?, goal_id).await?;
    Ok(NoContent)
}

pub async fn list_collaborators(
    State(state): State<GatewayState>,
    Path(goal_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<CollaboratorResponse>>> {
    let page = state.collaboration.list_collaborators(goal_id, page.into()).await?;
    Ok(Json(page))
}

pub async fn create_comment(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(goal_id): Path<Uuid>,
    Json(request): Json<CreateGoalCommentRequest>,
) -> Result<Created<GoalCommentResponse>> {
    let comment = state.collaboration.create_comment(claims.user_id()?, goal_id, request).await?;
    Ok(Created::new(comment))
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListCommentsQuery {
    pub parent_id: Option<Uuid>,
}

pub async fn list_comments(
    State(state): State<GatewayState>,
    Path(goal_id): Path<Uuid>,
    Query(filter): Query<ListCommentsQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<GoalCommentResponse>>> {
    let page = state.collaboration.list_comments(goal_id, filter.parent_id, page.into()).await?;
    Ok(Json(page))
}

pub async fn delete_comment(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path((goal_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<NoContent> {
    state.collaboration.delete_comment(claims.user_id()?, goal_id, comment_id).await?;
    Ok(NoContent)
}
