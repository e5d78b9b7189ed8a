//! `/quests/createQuest`, `/quests/quests/{id}/*`, `/quests/check-completion`,
//! `/quests/analytics`, and `/quests/templates*` handlers.

use axum::response::Response;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;
use waymark_core::edge::CachedRoute;
use waymark_core::error::Result;
use waymark_core::middleware::Claims;
use waymark_core::quests::{
    AnalyticsPeriod, CreateQuestRequest, CreateTemplateRequest, QuestResponse, TemplateResponse,
    UpdateQuestRequest, UpdateTemplateRequest,
};
use waymark_core::responses::{Created, NoContent};
use waymark_core::store::Page;

use crate::cached::read_through;
use crate::pagination::PageQuery;
use crate::state::GatewayState;
use crate::version::ExpectedVersion;

pub async fn create_quest(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateQuestRequest>,
) -> Result<Created<QuestResponse>> {
    let quest = state.quests.create_quest(claims.user_id()?, request).await?;
    Ok(Created::new(quest))
}

pub async fn list_quests(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<QuestResponse>>> {
    let page = state.quests.list_quests(claims.user_id()?, page.into()).await?;
    Ok(Json(page))
}

pub async fn get_quest(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(quest_id): Path<Uuid>,
) -> Result<Json<QuestResponse>> {
    let quest = state.quests.get_quest(claims.user_id()?, quest_id).await?;
    Ok(Json(quest))
}

pub async fn edit_quest(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(quest_id): Path<Uuid>,
    Query(version): Query<ExpectedVersion>,
    Json(request): Json<UpdateQuestRequest>,
) -> Result<Json<QuestResponse>> {
    let quest = state.quests.edit_quest(claims.user_id()?, quest_id, request, version.expected_version).await?;
    Ok(Json(quest))
}

pub async fn start_quest(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(quest_id): Path<Uuid>,
    Query(version): Query<ExpectedVersion>,
) -> Result<Json<QuestResponse>> {
    let quest = state.quests.start_quest(claims.user_id()?, quest_id, version.expected_version).await?;
    Ok(Json(quest))
}

pub async fn cancel_quest(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(quest_id): Path<Uuid>,
    Query(version): Query<ExpectedVersion>,
) -> Result<Json<QuestResponse>> {
    let quest = state.quests.cancel_quest(claims.user_id()?, quest_id, version.expected_version).await?;
    Ok(Json(quest))
}

pub async fn fail_quest(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(quest_id): Path<Uuid>,
    Query(version): Query<ExpectedVersion>,
) -> Result<Json<QuestResponse>> {
    let quest = state.quests.fail_quest(claims.user_id()?, quest_id, version.expected_version).await?;
    Ok(Json(quest))
}

/// Runs the auto-completion sweep over every active quest the caller owns.
pub async fn check_completion(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<QuestResponse>>> {
    let swept = state.quests.sweep_active(claims.user_id()?).await?;
    Ok(Json(swept))
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default = "default_period")]
    pub period: AnalyticsPeriod,
}

fn default_period() -> AnalyticsPeriod {
    AnalyticsPeriod::All
}

pub async fn analytics(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let principal = user_id.to_string();
    let variant = format!("{:?}", query.period);
    read_through(&state.cache, CachedRoute::QuestAnalytics, &principal, &variant, || async move {
        state.quests.analytics(user_id, query.period).await
    })
    .await
}

pub async fn create_template(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<Created<TemplateResponse>> {
    let template = state.templates.create_template(claims.user_id()?, request).await?;
    Ok(Created::new(template))
}

pub async fn list_templates(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<Response> {
    let user_id = claims.user_id()?;
    let principal = user_id.to_string();
    let variant = format!("{page:?}");
    read_through(&state.cache, CachedRoute::QuestTemplates, &principal, &variant, || async move {
        state.templates.list_templates(user_id, page.into()).await
    })
    .await
}

pub async fn get_template(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<TemplateResponse>> {
    let template = state.templates.get_template(claims.user_id()?, template_id).await?;
    Ok(Json(template))
}

pub async fn update_template(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(template_id): Path<Uuid>,
    Query(version): Query<ExpectedVersion>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateResponse>> {
    let template = state
        .templates
        .update_template(claims.user_id()?, template_id, request, version.expected_version)
        .await?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    Path(template_id): Path<Uuid>,
) -> Result<NoContent> {
    state.templates.delete_template(claims.user_id()?, template_id).await?;
    Ok(NoContent)
}
