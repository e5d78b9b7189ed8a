//! Request/response bodies for goal collaboration invites and goal comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{CollaborationInvite, Collaborator, GuildComment, InviteStatus};
use crate::validation::{self, Validate};

const MAX_COMMENT_LEN: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInviteRequest {
    pub invitee_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct InviteResponse {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub inviter_id: Uuid,
    pub invitee_id: Uuid,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl From<&CollaborationInvite> for InviteResponse {
    fn from(i: &CollaborationInvite) -> Self {
        Self {
            id: i.invite_id,
            goal_id: i.goal_id,
            inviter_id: i.inviter_id,
            invitee_id: i.invitee_id,
            status: i.status,
            created_at: i.created_at,
            responded_at: i.responded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollaboratorResponse {
    pub goal_id: Uuid,
    pub user_id: Uuid,
    pub added_at: DateTime<Utc>,
}

impl From<&Collaborator> for CollaboratorResponse {
    fn from(c: &Collaborator) -> Self {
        Self { goal_id: c.goal_id, user_id: c.user_id, added_at: c.added_at }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGoalCommentRequest {
    pub parent_id: Option<Uuid>,
    pub body: String,
}

impl Validate for CreateGoalCommentRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        validation::collect(validation::non_empty_text("body", &self.body, MAX_COMMENT_LEN).into_iter().collect())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalCommentResponse {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&GuildComment> for GoalCommentResponse {
    fn from(c: &GuildComment) -> Self {
        Self {
            id: c.comment_id,
            goal_id: c.guild_id,
            author_id: c.author_id,
            parent_id: c.parent_id,
            body: if c.deleted { String::new() } else { c.body.clone() },
            deleted: c.deleted,
            created_at: c.created_at,
        }
    }
}
