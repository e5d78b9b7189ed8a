//! Entity types and key construction for the single-table data model.
//!
//! Every entity lives in one wide-row table keyed by `(pk, sk)` with a JSONB
//! `attrs` payload, the relational translation of the original single-table
//! design described by the data model. Access patterns that would be GSI
//! queries in that design become queries against `gsi{1..5}_pk`/`gsi{1..5}_sk`
//! index columns here (see `store::pg`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity type discriminator, stored alongside `pk`/`sk` so a partition query
/// can filter by kind without parsing the sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    UserProfile,
    LoginAttempt,
    Goal,
    Task,
    Quest,
    QuestTemplate,
    Guild,
    GuildMember,
    JoinRequest,
    GuildComment,
    CollaborationInvite,
    Collaborator,
    ChatMessage,
    Reaction,
    EmailReservation,
    EmailVerificationToken,
    SubscriptionEvent,
    GamificationEvent,
    GoalOwnerMarker,
}

/// Key-construction helpers. Centralized so every service builds keys the
/// same way and a typo can't silently desync a read path from a write path.
pub mod keys {
    pub fn user_pk(user_id: &str) -> String {
        format!("USER#{user_id}")
    }
    pub const PROFILE_SK: &str = "PROFILE";

    pub fn login_attempt_sk(source_ip: &str) -> String {
        format!("LOGINATTEMPT#{source_ip}")
    }

    /// Goal rows live under their owner's partition: `USER#<userId>` /
    /// `GOAL#<goalId>`.
    pub fn goal_sk(goal_id: &str) -> String {
        format!("GOAL#{goal_id}")
    }

    /// Task rows nest under the same user partition, sharing the goal's
    /// sort-key prefix so `delete_cascade(user_pk, "GOAL#<goalId>", _)`
    /// removes the goal row and every task in one bounded sweep.
    pub fn task_sk(goal_id: &str, task_id: &str) -> String {
        format!("GOAL#{goal_id}#TASK#{task_id}")
    }

    /// Quest rows live under the owner's partition: `USER#<userId>` /
    /// `QUEST#<questId>`.
    pub fn quest_sk(quest_id: &str) -> String {
        format!("QUEST#{quest_id}")
    }

    /// Quest template rows live under the owner's partition: `USER#<userId>`
    /// / `TEMPLATE#<templateId>`.
    pub fn template_sk(template_id: &str) -> String {
        format!("TEMPLATE#{template_id}")
    }

    /// `GOAL#<goalId>` partition used only by collaboration invites and
    /// collaborator rows, distinct from the goal entity's own (owner-scoped)
    /// primary key.
    pub fn goal_invite_pk(goal_id: &str) -> String {
        format!("GOAL#{goal_id}")
    }

    /// Single marker row under `goal_invite_pk`, the only place a goal's
    /// owner can be resolved from its id alone without the owner's own
    /// partition key, mirroring how `email_reservation_pk` stands in for a
    /// missing GSI slot.
    pub const GOAL_OWNER_MARKER_SK: &str = "OWNER";

    pub fn guild_pk(guild_id: &str) -> String {
        format!("GUILD#{guild_id}")
    }
    pub fn guild_metadata_sk(guild_id: &str) -> String {
        format!("METADATA#{guild_id}")
    }
    pub fn member_sk(user_id: &str) -> String {
        format!("MEMBER#{user_id}")
    }
    pub fn join_request_sk(user_id: &str) -> String {
        format!("JOIN_REQUEST#{user_id}")
    }
    pub fn comment_sk(comment_id: &str) -> String {
        format!("COMMENT#{comment_id}")
    }

    pub fn invite_sk(invitee_id: &str) -> String {
        format!("INVITE#{invitee_id}")
    }
    pub fn invitee_inbox_pk(invitee_id: &str) -> String {
        format!("USER#{invitee_id}#INVITES")
    }
    pub fn collaborator_sk(user_id: &str) -> String {
        format!("COLLABORATOR#{user_id}")
    }

    /// `EMAIL#<email>` partition holding a single `RESERVATION` row, used as
    /// a `put_if_absent` uniqueness guard and as the email-to-user-id index
    /// (there is no GSI slot for this lookup, so it's a dedicated partition).
    pub fn email_reservation_pk(email: &str) -> String {
        format!("EMAIL#{}", email.to_lowercase())
    }
    pub const RESERVATION_SK: &str = "RESERVATION";

    pub fn subscription_event_sk(event_id: &str) -> String {
        format!("SUBEVENT#{event_id}")
    }

    /// `USER#<userId>` / `GAMEEVENT#<eventId>`: a `put_if_absent` guard row
    /// so awarding XP/badges for the same event twice (retried request,
    /// duplicate sweep pass) is a no-op.
    pub fn gamification_event_sk(event_id: &str) -> String {
        format!("GAMEEVENT#{event_id}")
    }

    /// `VERIFY#<token>` partition holding a single `TOKEN` row, the
    /// lookup side of `verify_email` (tokens are opaque and unguessable,
    /// so this doubles as the uniqueness guard).
    pub fn email_verification_pk(token: &str) -> String {
        format!("VERIFY#{token}")
    }
    pub const VERIFICATION_SK: &str = "TOKEN";

    pub fn room_pk(room_id: &str) -> String {
        format!("ROOM#{room_id}")
    }
    pub fn message_sk(sort_key: u64) -> String {
        format!("MSG#{sort_key:020}")
    }
    pub fn message_pk(message_id: &str) -> String {
        format!("MSG#{message_id}")
    }
    pub fn reaction_sk(user_id: &str, emoji: &str) -> String {
        format!("REACTION#{user_id}#{emoji}")
    }

    /// GSI1 (GuildType-CreatedAt): lists guilds of one visibility ordered by
    /// creation time, for the public/approval guild directory.
    pub fn gsi1_guild_type_pk(visibility: &str) -> String {
        format!("GUILDTYPE#{visibility}")
    }
    pub fn gsi1_created_at_sk(created_at: chrono::DateTime<chrono::Utc>, guild_id: &str) -> String {
        format!("{:019}#{guild_id}", created_at.timestamp_nanos_opt().unwrap_or(0))
    }

    /// GSI4 (CommentThread): every reply under one parent (or the guild's
    /// root thread when there is no parent), ordered ascending by time.
    pub fn gsi4_thread_pk(guild_id: &str, parent_id: Option<&str>) -> String {
        match parent_id {
            Some(parent) => format!("GUILD#{guild_id}#THREAD#{parent}"),
            None => format!("GUILD#{guild_id}#THREAD#ROOT"),
        }
    }
    pub fn gsi4_thread_sk(created_at: chrono::DateTime<chrono::Utc>, comment_id: &str) -> String {
        format!("{:019}#{comment_id}", created_at.timestamp_nanos_opt().unwrap_or(0))
    }

    /// GSI4 thread keys for goal comments, mirroring the guild comment
    /// thread layout under a distinct `GOAL#` prefix so the two access
    /// patterns never collide in the same index.
    pub fn gsi4_goal_thread_pk(goal_id: &str, parent_id: Option<&str>) -> String {
        match parent_id {
            Some(parent) => format!("GOAL#{goal_id}#THREAD#{parent}"),
            None => format!("GOAL#{goal_id}#THREAD#ROOT"),
        }
    }
    pub fn gsi4_goal_thread_sk(created_at: chrono::DateTime<chrono::Utc>, comment_id: &str) -> String {
        format!("{:019}#{comment_id}", created_at.timestamp_nanos_opt().unwrap_or(0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub federated_subject: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub disabled: bool,
    pub tier: SubscriptionTier,
    pub xp: i64,
    pub level: i32,
    pub badges: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Plus,
    Pro,
}

impl SubscriptionTier {
    /// Maps the internal tier name onto the `default`/`premium`/`admin` usage
    /// plan vocabulary carried in the JWT `tier` claim and used by the edge
    /// gateway's usage-plan lookup.
    pub fn as_usage_plan(self) -> &'static str {
        match self {
            Self::Free => "default",
            Self::Plus => "premium",
            Self::Pro => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub goal_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub deadline: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub milestones_fired: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub quest_id: Uuid,
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub status: QuestStatus,
    pub reward_xp: i32,
    pub deadline: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub progress: f64,
    pub milestones_fired: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestTemplate {
    pub template_id: Uuid,
    pub title: String,
    pub description: String,
    pub default_reward_xp: i32,
    pub tags: Vec<String>,
    pub created_by: Uuid,
    pub visibility: TemplateVisibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateVisibility {
    Public,
    Followers,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuildVisibility {
    Public,
    Private,
    ApprovalRequired,
}

impl GuildVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::ApprovalRequired => "approval_required",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub guild_id: Uuid,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuildRole {
    Member,
    Moderator,
    Owner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildMember {
    pub guild_id: Uuid,
    pub user_id: Uuid,
    pub role: GuildRole,
    pub blocked: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub guild_id: Uuid,
    pub user_id: Uuid,
    pub status: JoinRequestStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildComment {
    pub comment_id: Uuid,
    pub guild_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationInvite {
    pub invite_id: Uuid,
    pub goal_id: Uuid,
    pub inviter_id: Uuid,
    pub invitee_id: Uuid,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub goal_id: Uuid,
    pub user_id: Uuid,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: Uuid,
    pub room_id: String,
    pub sender_id: Uuid,
    pub body: String,
    pub sort_key: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailReservation {
    pub email: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionEventKind {
    Activated,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub event_id: String,
    pub user_id: Uuid,
    pub kind: SubscriptionEventKind,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalOwnerMarker {
    pub goal_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttemptCounter {
    pub user_id: Uuid,
    pub source_ip: String,
    pub attempts: u32,
    pub window_started_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}
