//! Request/response bodies for the guild surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Guild, GuildComment, GuildMember, GuildRole, GuildVisibility, JoinRequest, JoinRequestStatus};
use crate::validation::{self, Validate};

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_MESSAGE_LEN: usize = 500;
const MAX_COMMENT_LEN: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGuildRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub visibility: GuildVisibility,
}

impl Validate for CreateGuildRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        let mut errors = Vec::new();
        if let Some(e) = validation::non_empty_text("name", &self.name, MAX_NAME_LEN) {
            errors.push(e);
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(format!("description must be at most {MAX_DESCRIPTION_LEN} characters"));
        }
        validation::collect(errors)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateGuildRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Validate for UpdateGuildRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            if let Some(e) = validation::non_empty_text("name", name, MAX_NAME_LEN) {
                errors.push(e);
            }
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                errors.push(format!("description must be at most {MAX_DESCRIPTION_LEN} characters"));
            }
        }
        validation::collect(errors)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GuildResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub visibility: GuildVisibility,
    pub avatar_key: Option<String>,
    pub avatar_confirmed: bool,
    pub comments_disabled: bool,
    pub member_count: i32,
    pub ranking_score: f64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl From<(&Guild, i64)> for GuildResponse {
    fn from((guild, version): (&Guild, i64)) -> Self {
        Self {
            id: guild.guild_id,
            name: guild.name.clone(),
            description: guild.description.clone(),
            visibility: guild.visibility,
            avatar_key: guild.avatar_key.clone(),
            avatar_confirmed: guild.avatar_confirmed,
            comments_disabled: guild.comments_disabled,
            member_count: guild.member_count,
            ranking_score: guild.ranking_score,
            created_by: guild.created_by,
            created_at: guild.created_at,
            updated_at: guild.updated_at,
            version,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub role: GuildRole,
    pub blocked: bool,
    pub joined_at: DateTime<Utc>,
}

impl From<&GuildMember> for MemberResponse {
    fn from(m: &GuildMember) -> Self {
        Self { user_id: m.user_id, role: m.role, blocked: m.blocked, joined_at: m.joined_at }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinGuildRequest {
    pub message: Option<String>,
}

impl Validate for JoinGuildRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        if let Some(message) = &self.message {
            if message.chars().count() > MAX_MESSAGE_LEN {
                return Err(crate::error::Error::Validation(format!("message must be at most {MAX_MESSAGE_LEN} characters")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinRequestResponse {
    pub guild_id: Uuid,
    pub user_id: Uuid,
    pub status: JoinRequestStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&JoinRequest> for JoinRequestResponse {
    fn from(r: &JoinRequest) -> Self {
        Self { guild_id: r.guild_id, user_id: r.user_id, status: r.status, message: r.message.clone(), created_at: r.created_at }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentRequest {
    pub parent_id: Option<Uuid>,
    pub body: String,
}

impl Validate for CreateCommentRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        validation::collect(validation::non_empty_text("body", &self.body, MAX_COMMENT_LEN).into_iter().collect())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub guild_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&GuildComment> for CommentResponse {
    fn from(c: &GuildComment) -> Self {
        Self {
            id: c.comment_id,
            guild_id: c.guild_id,
            author_id: c.author_id,
            parent_id: c.parent_id,
            body: if c.deleted { String::new() } else { c.body.clone() },
            deleted: c.deleted,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactRequest {
    pub emoji: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarUploadRequest {
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvatarUploadResponse {
    pub upload_url: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfirmRequest {
    pub key: String,
}
