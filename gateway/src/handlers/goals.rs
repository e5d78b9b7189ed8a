//! `/quests` goal/task CRUD and progress handlers (goals are the "quests"
//! noun in the external interface contract's URL space; `QuestsService`
//! covers the separate deadline-bound quest state machine).

use axum::response::Response;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;
use waymark_core::edge::CachedRoute;
use waymark_core::error::Result;
use waymark_core::goals::{CreateGoalRequest, CreateTaskRequest, GoalProgress, GoalResponse, TaskResponse, UpdateGoalRequest, UpdateTaskRequest};
use waymark_core::middleware::Claims;
use waymark_core::responses::{Created, NoContent};
use waymark_core::store::Page;

use crate::cached::read_through;
use crate::pagination::PageQuery;
use crate::state::GatewayState;
use crate::version::ExpectedVersion;

pub async fn create_goal(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateGoalRequest>,
) -> Result<Created<GoalResponse>> {
    let goal = state.goals.create_goal(claims.user_id()?, request).await?;
    Ok(Created::new(goal))
}

pub async fn list_goals(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let principal = user_id.to_string();
    let variant = format!("{page:?}");
    read_through(&state.cache, CachedRoute::QuestList, &principal, &variant, || async move {
        state.goals.list_goals(user_id, page.into()).await
    })
    .await
}

pub async fn update_goal(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(goal_id): Path<Uuid>,
    Query(version): Query<ExpectedVersion>,
    Json(request): Json<UpdateGoalRequest>,
) -> Result<Json<GoalResponse>> {
    let goal = state.goals.update_goal(claims.user_id()?, goal_id, request, version.expected_version).await?;
    Ok(Json(goal))
}

pub async fn delete_goal(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(goal_id): Path<Uuid>,
) -> Result<NoContent> {
    state.goals.delete_goal(claims.user_id()?, goal_id).await?;
    Ok(NoContent)
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateTaskQuery {
    pub goal_id: Uuid,
}

pub async fn create_task(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<CreateTaskQuery>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<Created<TaskResponse>> {
    let task = state.goals.create_task(claims.user_id()?, query.goal_id, request).await?;
    Ok(Created::new(task))
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TaskScopeQuery {
    pub goal_id: Uuid,
}

pub async fn list_tasks(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Query(scope): Query<TaskScopeQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<TaskResponse>>> {
    let page = state.goals.list_tasks(claims.user_id()?, scope.goal_id, page.into()).await?;
    Ok(Json(page))
}

pub async fn update_task(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
    Query(scope): Query<TaskScopeQuery>,
    Query(version): Query<ExpectedVersion>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>> {
    let task = state
        .goals
        .update_task(claims.user_id()?, scope.goal_id, task_id, request, version.expected_version)
        .await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
    Query(scope): Query<TaskScopeQuery>,
) -> Result<NoContent> {
    state.goals.delete_task(claims.user_id()?, scope.goal_id, task_id).await?;
    Ok(NoContent)
}

pub async fn complete_task(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(task_id): Path<Uuid>,
    Query(scope): Query<TaskScopeQuery>,
) -> Result<Json<TaskResponse>> {
    let task = state.goals.complete_task(claims.user_id()?, scope.goal_id, task_id).await?;
    Ok(Json(task))
}

pub async fn list_all_goal_progress(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<GoalProgress>>> {
    let page = state.goals.list_all_goal_progress(claims.user_id()?, page.into()).await?;
    Ok(Json(page))
}

pub async fn goal_progress(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<GoalProgress>> {
    let progress = state.goals.list_goal_progress(claims.user_id()?, goal_id).await?;
    Ok(Json(progress))
}
