//! Quest template CRUD: reusable quest blueprints an owner can list
//! publicly, to followers, or keep private.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{keys, EntityType, QuestTemplate, TemplateVisibility};
use crate::error::{Error, Result};
use crate::store::{CoreStore, CursorPagination, Page, StoreItem};
use crate::validation::{self, Validate};

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 4000;
const MAX_TAGS: usize = 10;
const MAX_TAG_LEN: usize = 30;
const MAX_REWARD_XP: i32 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_reward_xp: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_visibility")]
    pub visibility: TemplateVisibility,
}

fn default_visibility() -> TemplateVisibility {
    TemplateVisibility::Private
}

impl Validate for CreateTemplateRequest {
    fn validate(&self) -> std::result::Result<(), Error> {
        let mut errors = Vec::new();
        if let Some(e) = validation::non_empty_text("title", &self.title, MAX_TITLE_LEN) {
            errors.push(e);
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(format!("description must be at most {MAX_DESCRIPTION_LEN} characters"));
        }
        if let Some(e) = validation::in_range_i32("defaultRewardXp", self.default_reward_xp, 0, MAX_REWARD_XP) {
            errors.push(e);
        }
        if let Some(e) = validation::tag_list("tags", &self.tags, MAX_TAGS, MAX_TAG_LEN) {
            errors.push(e);
        }
        validation::collect(errors)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateTemplateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub default_reward_xp: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<TemplateVisibility>,
}

impl Validate for UpdateTemplateRequest {
    fn validate(&self) -> std::result::Result<(), Error> {
        let mut errors = Vec::new();
        if let Some(title) = &self.title {
            if let Some(e) = validation::non_empty_text("title", title, MAX_TITLE_LEN) {
                errors.push(e);
            }
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                errors.push(format!("description must be at most {MAX_DESCRIPTION_LEN} characters"));
            }
        }
        if let Some(reward_xp) = self.default_reward_xp {
            if let Some(e) = validation::in_range_i32("defaultRewardXp", reward_xp, 0, MAX_REWARD_XP) {
                errors.push(e);
            }
        }
        if let Some(tags) = &self.tags {
            if let Some(e) = validation::tag_list("tags", tags, MAX_TAGS, MAX_TAG_LEN) {
                errors.push(e);
            }
        }
        validation::collect(errors)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub default_reward_xp: i32,
    pub tags: Vec<String>,
    pub visibility: TemplateVisibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl From<(&QuestTemplate, i64)> for TemplateResponse {
    fn from((template, version): (&QuestTemplate, i64)) -> Self {
        Self {
            id: template.template_id,
            title: template.title.clone(),
            description: template.description.clone(),
            default_reward_xp: template.default_reward_xp,
            tags: template.tags.clone(),
            visibility: template.visibility,
            created_at: template.created_at,
            updated_at: template.updated_at,
            version,
        }
    }
}

#[derive(Clone)]
pub struct TemplatesService {
    store: Arc<dyn CoreStore>,
}

impl TemplatesService {
    pub fn new(store: Arc<dyn CoreStore>) -> Self {
        Self { store }
    }

    pub async fn create_template(&self, user_id: Uuid, request: CreateTemplateRequest) -> Result<TemplateResponse> {
        request.validate()?;
        let now = Utc::now();
        let template = QuestTemplate {
            template_id: Uuid::new_v4(),
            title: request.title,
            description: request.description,
            default_reward_xp: request.default_reward_xp,
            tags: request.tags,
            created_by: user_id,
            visibility: request.visibility,
            created_at: now,
            updated_at: now,
        };

        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::template_sk(&template.template_id.to_string());
        let attrs = serde_json::to_value(&template).map_err(|e| Error::Internal(format!("serialize template: {e}")))?;
        self.store.put(StoreItem::new(pk, sk, EntityType::QuestTemplate, attrs)).await?;

        Ok(TemplateResponse::from((&template, 1)))
    }

    pub async fn list_templates(&self, user_id: Uuid, pagination: CursorPagination) -> Result<Page<TemplateResponse>> {
        let pk = keys::user_pk(&user_id.to_string());
        let page = self.store.query_partition(&pk, Some("TEMPLATE#"), pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let template: QuestTemplate = item.attrs_as()?;
            items.push(TemplateResponse::from((&template, item.version)));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    pub async fn get_template(&self, user_id: Uuid, template_id: Uuid) -> Result<TemplateResponse> {
        let (template, version) = self.load(user_id, template_id).await?;
        Ok(TemplateResponse::from((&template, version)))
    }

    pub async fn update_template(
        &self,
        user_id: Uuid,
        template_id: Uuid,
        request: UpdateTemplateRequest,
        expected_version: i64,
    ) -> Result<TemplateResponse> {
        request.validate()?;
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::template_sk(&template_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("template {template_id} not found")))?;
        let mut template: QuestTemplate = item.attrs_as()?;

        if let Some(title) = request.title {
            template.title = title;
        }
        if let Some(description) = request.description {
            template.description = description;
        }
        if let Some(reward_xp) = request.default_reward_xp {
            template.default_reward_xp = reward_xp;
        }
        if let Some(tags) = request.tags {
            template.tags = tags;
        }
        if let Some(visibility) = request.visibility {
            template.visibility = visibility;
        }
        template.updated_at = Utc::now();

        let attrs = serde_json::to_value(&template).map_err(|e| Error::Internal(format!("serialize template: {e}")))?;
        let updated = self.store.update_with_version(&pk, &sk, expected_version, attrs).await?;
        Ok(TemplateResponse::from((&template, updated.version)))
    }

    pub async fn delete_template(&self, user_id: Uuid, template_id: Uuid) -> Result<()> {
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::template_sk(&template_id.to_string());
        self.store.delete(&pk, &sk).await
    }

    async fn load(&self, user_id: Uuid, template_id: Uuid) -> Result<(QuestTemplate, i64)> {
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::template_sk(&template_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("template {template_id} not found")))?;
        let template: QuestTemplate = item.attrs_as()?;
        Ok((template, item.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_visibility_is_private() {
        assert_eq!(default_visibility(), TemplateVisibility::Private);
    }
}
