//! Goal collaboration invites, accept/decline, and shared goal comments.

use std::ops::DerefMut;
use std::sync::Arc;

use chrono::Utc;
use deadpool_redis::Pool as RedisPool;
use uuid::Uuid;

use crate::domain::{keys, Collaborator, EntityType, GoalOwnerMarker, GuildComment, InviteStatus};
use crate::error::{Error, Result};
use crate::store::{CoreStore, CursorPagination, GsiIndex, Page, StoreItem, TransactOp};
use crate::validation::Validate;
use crate::domain::CollaborationInvite;

use super::dto::{CollaboratorResponse, CreateGoalCommentRequest, CreateInviteRequest, GoalCommentResponse, InviteResponse};

const MAX_INVITES_PER_USER_PER_HOUR: u32 = 20;

#[derive(Clone)]
pub struct CollaborationService {
    store: Arc<dyn CoreStore>,
    redis: RedisPool,
}

impl CollaborationService {
    pub fn new(store: Arc<dyn CoreStore>, redis: RedisPool) -> Self {
        Self { store, redis }
    }

    /// Creates an invite, writing the two mirrored rows (goal side, invitee
    /// inbox side) atomically. Requires the caller own the goal; throttled
    /// at 20 invites per inviter per hour, independent of any edge-gateway
    /// throttling.
    pub async fn create_invite(&self, inviter_id: Uuid, goal_id: Uuid, request: CreateInviteRequest) -> Result<InviteResponse> {
        if request.invitee_id == inviter_id {
            return Err(Error::Validation("cannot invite yourself to your own goal".to_string()));
        }
        self.require_owner(goal_id, inviter_id).await?;
        self.check_invite_throttle(inviter_id).await?;

        let now = Utc::now();
        let invite = CollaborationInvite {
            invite_id: Uuid::new_v4(),
            goal_id,
            inviter_id,
            invitee_id: request.invitee_id,
            status: InviteStatus::Pending,
            created_at: now,
            responded_at: None,
        };
        let attrs = serde_json::to_value(&invite).map_err(|e| Error::Internal(format!("serialize invite: {e}")))?;

        let goal_side = StoreItem::new(
            keys::goal_invite_pk(&goal_id.to_string()),
            keys::invite_sk(&request.invitee_id.to_string()),
            EntityType::CollaborationInvite,
            attrs.clone(),
        );
        let inbox_side = StoreItem::new(
            keys::invitee_inbox_pk(&request.invitee_id.to_string()),
            keys::invite_sk(&goal_id.to_string()),
            EntityType::CollaborationInvite,
            attrs,
        );

        self.store
            .transact_write(vec![TransactOp::PutIfAbsent(goal_side), TransactOp::PutIfAbsent(inbox_side)])
            .await
            .map_err(|_| Error::ConflictState(format!("user {} already has a pending invite for goal {goal_id}", request.invitee_id)))?;

        Ok(InviteResponse::from(&invite))
    }

    pub async fn list_incoming_invites(&self, invitee_id: Uuid, pagination: CursorPagination) -> Result<Page<InviteResponse>> {
        let pk = keys::invitee_inbox_pk(&invitee_id.to_string());
        let page = self.store.query_partition(&pk, Some("INVITE#"), pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let invite: CollaborationInvite = item.attrs_as()?;
            items.push(InviteResponse::from(&invite));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    pub async fn list_outgoing_invites(&self, owner_id: Uuid, goal_id: Uuid, pagination: CursorPagination) -> Result<Page<InviteResponse>> {
        self.require_owner(goal_id, owner_id).await?;
        let pk = keys::goal_invite_pk(&goal_id.to_string());
        let page = self.store.query_partition(&pk, Some("INVITE#"), pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let invite: CollaborationInvite = item.attrs_as()?;
            items.push(InviteResponse::from(&invite));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    /// Flips both mirrored invite rows to `Accepted` and inserts the
    /// collaborator row, atomically.
    pub async fn accept_invite(&self, invitee_id: Uuid, goal_id: Uuid) -> Result<CollaboratorResponse> {
        let (mut invite, inbox_item, goal_item) = self.load_mirrored_invite(invitee_id, goal_id).await?;
        if invite.status != InviteStatus::Pending {
            return Err(Error::ConflictState("invite has already been decided".to_string()));
        }
        let now = Utc::now();
        invite.status = InviteStatus::Accepted;
        invite.responded_at = Some(now);
        let attrs = serde_json::to_value(&invite).map_err(|e| Error::Internal(format!("serialize invite: {e}")))?;

        let collaborator = Collaborator { goal_id, user_id: invitee_id, added_at: now };
        let collaborator_item = StoreItem::new(
            keys::goal_invite_pk(&goal_id.to_string()),
            keys::collaborator_sk(&invitee_id.to_string()),
            EntityType::Collaborator,
            serde_json::to_value(&collaborator).map_err(|e| Error::Internal(format!("serialize collaborator: {e}")))?,
        );

        self.store
            .transact_write(vec![
                TransactOp::UpdateVersioned { pk: inbox_item.pk, sk: inbox_item.sk, expected_version: inbox_item.version, attrs: attrs.clone() },
                TransactOp::UpdateVersioned { pk: goal_item.pk, sk: goal_item.sk, expected_version: goal_item.version, attrs },
                TransactOp::Put(collaborator_item),
            ])
            .await?;

        Ok(CollaboratorResponse::from(&collaborator))
    }

    pub async fn decline_invite(&self, invitee_id: Uuid, goal_id: Uuid) -> Result<()> {
        let (mut invite, inbox_item, goal_item) = self.load_mirrored_invite(invitee_id, goal_id).await?;
        if invite.status != InviteStatus::Pending {
            return Err(Error::ConflictState("invite has already been decided".to_string()));
        }
        invite.status = InviteStatus::Declined;
        invite.responded_at = Some(Utc::now());
        let attrs = serde_json::to_value(&invite).map_err(|e| Error::Internal(format!("serialize invite: {e}")))?;

        self.store
            .transact_write(vec![
                TransactOp::UpdateVersioned { pk: inbox_item.pk, sk: inbox_item.sk, expected_version: inbox_item.version, attrs: attrs.clone() },
                TransactOp::UpdateVersioned { pk: goal_item.pk, sk: goal_item.sk, expected_version: goal_item.version, attrs },
            ])
            .await?;
        Ok(())
    }

    pub async fn list_collaborators(&self, goal_id: Uuid, pagination: CursorPagination) -> Result<Page<CollaboratorResponse>> {
        let pk = keys::goal_invite_pk(&goal_id.to_string());
        let page = self.store.query_partition(&pk, Some("COLLABORATOR#"), pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let collaborator: Collaborator = item.attrs_as()?;
            items.push(CollaboratorResponse::from(&collaborator));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    /// Comments and reactions on goals reuse the guild comment primitive
    /// (§4.7); `GuildComment.guild_id` holds the goal id here. Permission is
    /// the goal owner plus accepted collaborators.
    pub async fn create_comment(&self, user_id: Uuid, goal_id: Uuid, request: CreateGoalCommentRequest) -> Result<GoalCommentResponse> {
        request.validate()?;
        self.require_access(goal_id, user_id).await?;

        let now = Utc::now();
        let comment = GuildComment {
            comment_id: Uuid::new_v4(),
            guild_id: goal_id,
            author_id: user_id,
            parent_id: request.parent_id,
            body: request.body,
            deleted: false,
            created_at: now,
        };

        let pk = keys::goal_invite_pk(&goal_id.to_string());
        let item = StoreItem::new(
            pk,
            keys::comment_sk(&comment.comment_id.to_string()),
            EntityType::GuildComment,
            serde_json::to_value(&comment).map_err(|e| Error::Internal(format!("serialize comment: {e}")))?,
        )
        .with_gsi(
            GsiIndex::Gsi4,
            keys::gsi4_goal_thread_pk(&goal_id.to_string(), request.parent_id.map(|p| p.to_string()).as_deref()),
            keys::gsi4_goal_thread_sk(now, &comment.comment_id.to_string()),
        );
        self.store.put(item).await?;
        Ok(GoalCommentResponse::from(&comment))
    }

    pub async fn list_comments(&self, goal_id: Uuid, parent_id: Option<Uuid>, pagination: CursorPagination) -> Result<Page<GoalCommentResponse>> {
        let pk = keys::gsi4_goal_thread_pk(&goal_id.to_string(), parent_id.map(|p| p.to_string()).as_deref());
        let page = self.store.query_index(GsiIndex::Gsi4, &pk, None, pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let comment: GuildComment = item.attrs_as()?;
            items.push(GoalCommentResponse::from(&comment));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    pub async fn delete_comment(&self, user_id: Uuid, goal_id: Uuid, comment_id: Uuid) -> Result<()> {
        let pk = keys::goal_invite_pk(&goal_id.to_string());
        let sk = keys::comment_sk(&comment_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("comment {comment_id} not found")))?;
        let mut comment: GuildComment = item.attrs_as()?;

        let owner = self.owner_of(goal_id).await?;
        if comment.author_id != user_id && owner != user_id {
            return Err(Error::Forbidden("only the comment's author or the goal owner may delete it".to_string()));
        }

        comment.deleted = true;
        comment.body = String::new();
        let attrs = serde_json::to_value(&comment).map_err(|e| Error::Internal(format!("serialize comment: {e}")))?;
        self.store.update_with_version(&pk, &sk, item.version, attrs).await?;
        Ok(())
    }

    async fn load_mirrored_invite(&self, invitee_id: Uuid, goal_id: Uuid) -> Result<(CollaborationInvite, StoreItem, StoreItem)> {
        let inbox_pk = keys::invitee_inbox_pk(&invitee_id.to_string());
        let inbox_sk = keys::invite_sk(&goal_id.to_string());
        let inbox_item = self
            .store
            .get(&inbox_pk, &inbox_sk)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no invite for user {invitee_id} on goal {goal_id}")))?;

        let goal_pk = keys::goal_invite_pk(&goal_id.to_string());
        let goal_sk = keys::invite_sk(&invitee_id.to_string());
        let goal_item = self
            .store
            .get(&goal_pk, &goal_sk)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no invite for user {invitee_id} on goal {goal_id}")))?;

        let invite: CollaborationInvite = inbox_item.attrs_as()?;
        Ok((invite, inbox_item, goal_item))
    }

    async fn require_owner(&self, goal_id: Uuid, user_id: Uuid) -> Result<()> {
        if self.owner_of(goal_id).await? != user_id {
            return Err(Error::Forbidden("only the goal owner may perform this action".to_string()));
        }
        Ok(())
    }

    async fn require_access(&self, goal_id: Uuid, user_id: Uuid) -> Result<()> {
        if self.owner_of(goal_id).await? == user_id {
            return Ok(());
        }
        let pk = keys::goal_invite_pk(&goal_id.to_string());
        let sk = keys::collaborator_sk(&user_id.to_string());
        if self.store.get(&pk, &sk).await?.is_some() {
            return Ok(());
        }
        Err(Error::Forbidden("only the goal owner or an accepted collaborator may do this".to_string()))
    }

    async fn owner_of(&self, goal_id: Uuid) -> Result<Uuid> {
        let pk = keys::goal_invite_pk(&goal_id.to_string());
        let item = self
            .store
            .get(&pk, keys::GOAL_OWNER_MARKER_SK)
            .await?
            .ok_or_else(|| Error::NotFound(format!("goal {goal_id} not found")))?;
        let marker: GoalOwnerMarker = item.attrs_as()?;
        Ok(marker.user_id)
    }

    async fn check_invite_throttle(&self, inviter_id: Uuid) -> Result<()> {
        let mut conn = self.redis.get().await.map_err(|e| Error::Internal(format!("redis pool error: {e}")))?;
        let key = format!("invitelimit:user:{inviter_id}");

        let count: u32 = redis::cmd("INCR").arg(&key).query_async(conn.deref_mut()).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE").arg(&key).arg(3600).query_async(conn.deref_mut()).await?;
        }
        if count > MAX_INVITES_PER_USER_PER_HOUR {
            return Err(Error::Throttled(format!(
                "invite limit of {MAX_INVITES_PER_USER_PER_HOUR} per hour exceeded"
            )));
        }
        Ok(())
    }
}
