//! Guild CRUD, membership, moderation, threaded comments, and avatars.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    keys, EntityType, Goal, Guild, GuildComment, GuildMember, GuildRole, GuildVisibility, JoinRequest, JoinRequestStatus,
    Quest, QuestStatus, Reaction,
};
use crate::error::{Error, Result};
use crate::store::{CoreStore, CursorPagination, GsiIndex, Page, StoreItem, TransactOp};
use crate::validation::Validate;

use super::avatar::AvatarStore;
use super::dto::{
    AvatarConfirmRequest, AvatarUploadRequest, AvatarUploadResponse, CommentResponse, CreateCommentRequest, CreateGuildRequest,
    GuildResponse, JoinGuildRequest, JoinRequestResponse, MemberResponse, ReactRequest, UpdateGuildRequest,
};

#[derive(Clone)]
pub struct GuildsService {
    store: Arc<dyn CoreStore>,
    avatars: AvatarStore,
}

impl GuildsService {
    pub fn new(store: Arc<dyn CoreStore>, avatars: AvatarStore) -> Self {
        Self { store, avatars }
    }

    pub async fn create_guild(&self, user_id: Uuid, request: CreateGuildRequest) -> Result<GuildResponse> {
        request.validate()?;
        let now = Utc::now();
        let guild = Guild {
            guild_id: Uuid::new_v4(),
            name: request.name,
            description: request.description,
            visibility: request.visibility,
            avatar_key: None,
            avatar_confirmed: false,
            comments_disabled: false,
            member_count: 1,
            ranking_score: 0.0,
            created_by: user_id,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        let member = GuildMember { guild_id: guild.guild_id, user_id, role: GuildRole::Owner, blocked: false, joined_at: now };

        let guild_pk = keys::guild_pk(&guild.guild_id.to_string());
        let guild_item = StoreItem::new(
            guild_pk.clone(),
            keys::guild_metadata_sk(&guild.guild_id.to_string()),
            EntityType::Guild,
            serde_json::to_value(&guild).map_err(|e| Error::Internal(format!("serialize guild: {e}")))?,
        )
        .with_gsi(
            GsiIndex::Gsi1,
            keys::gsi1_guild_type_pk(guild.visibility.as_str()),
            keys::gsi1_created_at_sk(guild.created_at, &guild.guild_id.to_string()),
        );
        let member_item = StoreItem::new(
            guild_pk,
            keys::member_sk(&user_id.to_string()),
            EntityType::GuildMember,
            serde_json::to_value(&member).map_err(|e| Error::Internal(format!("serialize guild member: {e}")))?,
        );

        self.store.transact_write(vec![TransactOp::Put(guild_item), TransactOp::Put(member_item)]).await?;
        info!(guild_id = %guild.guild_id, owner = %user_id, "guild created");
        Ok(GuildResponse::from((&guild, 1)))
    }

    pub async fn get_guild(&self, guild_id: Uuid) -> Result<GuildResponse> {
        let (guild, version) = self.load_guild(guild_id).await?;
        Ok(GuildResponse::from((&guild, version)))
    }

    /// Requires `user_id` be an unblocked member of `guild_id`. Used by the
    /// chat gateway to gate a room's WebSocket upgrade and message flow on
    /// guild membership, the same check `require_role` applies to every
    /// other member-gated action.
    pub async fn require_membership(&self, guild_id: Uuid, user_id: Uuid) -> Result<()> {
        self.require_role(guild_id, user_id, GuildRole::Member).await?;
        Ok(())
    }

    pub async fn list_guilds_by_visibility(
        &self,
        visibility: GuildVisibility,
        pagination: CursorPagination,
    ) -> Result<Page<GuildResponse>> {
        let pk = keys::gsi1_guild_type_pk(visibility.as_str());
        let page = self.store.query_index(GsiIndex::Gsi1, &pk, None, pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let guild: Guild = item.attrs_as()?;
            items.push(GuildResponse::from((&guild, item.version)));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    pub async fn update_guild(
        &self,
        actor_id: Uuid,
        guild_id: Uuid,
        request: UpdateGuildRequest,
        expected_version: i64,
    ) -> Result<GuildResponse> {
        request.validate()?;
        self.require_role(guild_id, actor_id, GuildRole::Moderator).await?;

        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::guild_metadata_sk(&guild_id.to_string());
        let item = self.store.get(&guild_pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("guild {guild_id} not found")))?;
        let mut guild: Guild = item.attrs_as()?;

        if let Some(name) = request.name {
            guild.name = name;
        }
        if let Some(description) = request.description {
            guild.description = description;
        }
        guild.updated_at = Utc::now();

        let attrs = serde_json::to_value(&guild).map_err(|e| Error::Internal(format!("serialize guild: {e}")))?;
        let updated = self.store.update_with_version(&guild_pk, &sk, expected_version, attrs).await?;
        Ok(GuildResponse::from((&guild, updated.version)))
    }

    /// Joins a public guild outright, rejects a private one (invite-only),
    /// or queues a pending join request for an approval-required guild.
    pub async fn join_guild(&self, user_id: Uuid, guild_id: Uuid, request: JoinGuildRequest) -> Result<JoinOutcome> {
        request.validate()?;
        let (guild, version) = self.load_guild(guild_id).await?;
        let guild_pk = keys::guild_pk(&guild_id.to_string());

        if self.get_member(guild_id, user_id).await?.is_some() {
            return Err(Error::ConflictState(format!("user {user_id} is already a member of guild {guild_id}")));
        }

        match guild.visibility {
            GuildVisibility::Private => Err(Error::Forbidden("this guild is invite-only".to_string())),
            GuildVisibility::Public => {
                let now = Utc::now();
                let member = GuildMember { guild_id, user_id, role: GuildRole::Member, blocked: false, joined_at: now };
                let member_item = StoreItem::new(
                    guild_pk.clone(),
                    keys::member_sk(&user_id.to_string()),
                    EntityType::GuildMember,
                    serde_json::to_value(&member).map_err(|e| Error::Internal(format!("serialize guild member: {e}")))?,
                );
                let mut updated_guild = guild.clone();
                updated_guild.member_count += 1;
                updated_guild.updated_at = now;
                let guild_attrs = serde_json::to_value(&updated_guild).map_err(|e| Error::Internal(format!("serialize guild: {e}")))?;
                self.store
                    .transact_write(vec![
                        TransactOp::Put(member_item),
                        TransactOp::UpdateVersioned { pk: guild_pk, sk: keys::guild_metadata_sk(&guild_id.to_string()), expected_version: version, attrs: guild_attrs },
                    ])
                    .await?;
                Ok(JoinOutcome::Joined(MemberResponse::from(&member)))
            }
            GuildVisibility::ApprovalRequired => {
                let now = Utc::now();
                let join_request = JoinRequest { guild_id, user_id, status: JoinRequestStatus::Pending, message: request.message, created_at: now };
                let item = StoreItem::new(
                    guild_pk,
                    keys::join_request_sk(&user_id.to_string()),
                    EntityType::JoinRequest,
                    serde_json::to_value(&join_request).map_err(|e| Error::Internal(format!("serialize join request: {e}")))?,
                );
                self.store.put_if_absent(item).await.map_err(|_| {
                    Error::ConflictState(format!("user {user_id} already has a pending join request for guild {guild_id}"))
                })?;
                Ok(JoinOutcome::Requested(JoinRequestResponse::from(&join_request)))
            }
        }
    }

    /// Lists pending join requests. Only the guild's owner or a moderator
    /// may see this queue.
    pub async fn list_join_requests(
        &self,
        actor_id: Uuid,
        guild_id: Uuid,
        pagination: CursorPagination,
    ) -> Result<Page<JoinRequestResponse>> {
        self.require_role(guild_id, actor_id, GuildRole::Moderator).await?;
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let page = self.store.query_partition(&guild_pk, Some("JOIN_REQUEST#"), pagination).await?;

        let mut items = Vec::new();
        for item in &page.items {
            let request: JoinRequest = item.attrs_as()?;
            if request.status == JoinRequestStatus::Pending {
                items.push(JoinRequestResponse::from(&request));
            }
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    pub async fn approve_join_request(&self, actor_id: Uuid, guild_id: Uuid, target_user_id: Uuid) -> Result<MemberResponse> {
        self.require_role(guild_id, actor_id, GuildRole::Moderator).await?;
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let join_sk = keys::join_request_sk(&target_user_id.to_string());

        let item = self
            .store
            .get(&guild_pk, &join_sk)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no join request for user {target_user_id} in guild {guild_id}")))?;
        let mut request: JoinRequest = item.attrs_as()?;
        if request.status != JoinRequestStatus::Pending {
            return Err(Error::ConflictState("join request has already been decided".to_string()));
        }
        request.status = JoinRequestStatus::Approved;

        let (guild, guild_version) = self.load_guild(guild_id).await?;
        let mut updated_guild = guild;
        updated_guild.member_count += 1;
        updated_guild.updated_at = Utc::now();

        let now = Utc::now();
        let member = GuildMember { guild_id, user_id: target_user_id, role: GuildRole::Member, blocked: false, joined_at: now };

        let join_attrs = serde_json::to_value(&request).map_err(|e| Error::Internal(format!("serialize join request: {e}")))?;
        let member_item = StoreItem::new(
            guild_pk.clone(),
            keys::member_sk(&target_user_id.to_string()),
            EntityType::GuildMember,
            serde_json::to_value(&member).map_err(|e| Error::Internal(format!("serialize guild member: {e}")))?,
        );
        let guild_attrs = serde_json::to_value(&updated_guild).map_err(|e| Error::Internal(format!("serialize guild: {e}")))?;

        self.store
            .transact_write(vec![
                TransactOp::UpdateVersioned { pk: guild_pk.clone(), sk: join_sk, expected_version: item.version, attrs: join_attrs },
                TransactOp::Put(member_item),
                TransactOp::UpdateVersioned {
                    pk: guild_pk,
                    sk: keys::guild_metadata_sk(&guild_id.to_string()),
                    expected_version: guild_version,
                    attrs: guild_attrs,
                },
            ])
            .await?;

        Ok(MemberResponse::from(&member))
    }

    pub async fn reject_join_request(&self, actor_id: Uuid, guild_id: Uuid, target_user_id: Uuid) -> Result<()> {
        self.require_role(guild_id, actor_id, GuildRole::Moderator).await?;
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let join_sk = keys::join_request_sk(&target_user_id.to_string());
        let item = self
            .store
            .get(&guild_pk, &join_sk)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no join request for user {target_user_id} in guild {guild_id}")))?;
        let mut request: JoinRequest = item.attrs_as()?;
        if request.status != JoinRequestStatus::Pending {
            return Err(Error::ConflictState("join request has already been decided".to_string()));
        }
        request.status = JoinRequestStatus::Rejected;
        let attrs = serde_json::to_value(&request).map_err(|e| Error::Internal(format!("serialize join request: {e}")))?;
        self.store.update_with_version(&guild_pk, &join_sk, item.version, attrs).await?;
        Ok(())
    }

    pub async fn remove_member(&self, actor_id: Uuid, guild_id: Uuid, target_user_id: Uuid) -> Result<()> {
        self.require_role(guild_id, actor_id, GuildRole::Moderator).await?;
        let target = self
            .get_member(guild_id, target_user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {target_user_id} is not a member of guild {guild_id}")))?;
        if target.role == GuildRole::Owner {
            return Err(Error::Forbidden("the guild owner cannot be removed".to_string()));
        }

        let guild_pk = keys::guild_pk(&guild_id.to_string());
        self.store.delete(&guild_pk, &keys::member_sk(&target_user_id.to_string())).await?;

        let (mut guild, version) = self.load_guild(guild_id).await?;
        guild.member_count = (guild.member_count - 1).max(0);
        guild.updated_at = Utc::now();
        let attrs = serde_json::to_value(&guild).map_err(|e| Error::Internal(format!("serialize guild: {e}")))?;
        self.store.update_with_version(&guild_pk, &keys::guild_metadata_sk(&guild_id.to_string()), version, attrs).await?;
        Ok(())
    }

    pub async fn set_member_blocked(&self, actor_id: Uuid, guild_id: Uuid, target_user_id: Uuid, blocked: bool) -> Result<MemberResponse> {
        self.require_role(guild_id, actor_id, GuildRole::Moderator).await?;
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::member_sk(&target_user_id.to_string());
        let item = self
            .store
            .get(&guild_pk, &sk)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {target_user_id} is not a member of guild {guild_id}")))?;
        let mut member: GuildMember = item.attrs_as()?;
        if member.role == GuildRole::Owner {
            return Err(Error::Forbidden("the guild owner cannot be blocked".to_string()));
        }
        member.blocked = blocked;
        let attrs = serde_json::to_value(&member).map_err(|e| Error::Internal(format!("serialize guild member: {e}")))?;
        let updated = self.store.update_with_version(&guild_pk, &sk, item.version, attrs).await?;
        let _ = updated;
        Ok(MemberResponse::from(&member))
    }

    pub async fn set_moderator(&self, actor_id: Uuid, guild_id: Uuid, target_user_id: Uuid, is_moderator: bool) -> Result<MemberResponse> {
        self.require_role(guild_id, actor_id, GuildRole::Owner).await?;
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::member_sk(&target_user_id.to_string());
        let item = self
            .store
            .get(&guild_pk, &sk)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {target_user_id} is not a member of guild {guild_id}")))?;
        let mut member: GuildMember = item.attrs_as()?;
        if member.role == GuildRole::Owner {
            return Err(Error::Forbidden("the guild owner's role cannot be changed here".to_string()));
        }
        member.role = if is_moderator { GuildRole::Moderator } else { GuildRole::Member };
        let attrs = serde_json::to_value(&member).map_err(|e| Error::Internal(format!("serialize guild member: {e}")))?;
        self.store.update_with_version(&guild_pk, &sk, item.version, attrs).await?;
        Ok(MemberResponse::from(&member))
    }

    /// Atomically swaps ownership: the current owner becomes a moderator,
    /// the target becomes owner. Owner-only; a moderator cannot initiate
    /// this even though moderator permissions otherwise mirror the owner's.
    pub async fn transfer_ownership(&self, actor_id: Uuid, guild_id: Uuid, new_owner_id: Uuid) -> Result<()> {
        let actor_item = self.require_exact_role(guild_id, actor_id, GuildRole::Owner).await?;
        let target_item = self
            .store
            .get(&keys::guild_pk(&guild_id.to_string()), &keys::member_sk(&new_owner_id.to_string()))
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {new_owner_id} is not a member of guild {guild_id}")))?;

        let mut actor_member: GuildMember = actor_item.attrs_as()?;
        let mut target_member: GuildMember = target_item.attrs_as()?;
        actor_member.role = GuildRole::Moderator;
        target_member.role = GuildRole::Owner;

        let guild_pk = keys::guild_pk(&guild_id.to_string());
        self.store
            .transact_write(vec![
                TransactOp::UpdateVersioned {
                    pk: guild_pk.clone(),
                    sk: keys::member_sk(&actor_id.to_string()),
                    expected_version: actor_item.version,
                    attrs: serde_json::to_value(&actor_member).map_err(|e| Error::Internal(format!("serialize guild member: {e}")))?,
                },
                TransactOp::UpdateVersioned {
                    pk: guild_pk,
                    sk: keys::member_sk(&new_owner_id.to_string()),
                    expected_version: target_item.version,
                    attrs: serde_json::to_value(&target_member).map_err(|e| Error::Internal(format!("serialize guild member: {e}")))?,
                },
            ])
            .await?;
        info!(guild_id = %guild_id, old_owner = %actor_id, new_owner = %new_owner_id, "guild ownership transferred");
        Ok(())
    }

    pub async fn create_comment(&self, user_id: Uuid, guild_id: Uuid, request: CreateCommentRequest) -> Result<CommentResponse> {
        request.validate()?;
        let member = self
            .get_member(guild_id, user_id)
            .await?
            .ok_or_else(|| Error::Forbidden("only guild members may comment".to_string()))?;
        if member.blocked {
            return Err(Error::Forbidden("blocked members cannot comment".to_string()));
        }
        let (guild, _) = self.load_guild(guild_id).await?;
        if guild.comments_disabled && member.role == GuildRole::Member {
            return Err(Error::Forbidden("comments are disabled for this guild".to_string()));
        }

        let now = Utc::now();
        let comment = GuildComment {
            comment_id: Uuid::new_v4(),
            guild_id,
            author_id: user_id,
            parent_id: request.parent_id,
            body: request.body,
            deleted: false,
            created_at: now,
        };

        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let item = StoreItem::new(
            guild_pk,
            keys::comment_sk(&comment.comment_id.to_string()),
            EntityType::GuildComment,
            serde_json::to_value(&comment).map_err(|e| Error::Internal(format!("serialize comment: {e}")))?,
        )
        .with_gsi(
            GsiIndex::Gsi4,
            keys::gsi4_thread_pk(&guild_id.to_string(), request.parent_id.map(|p| p.to_string()).as_deref()),
            keys::gsi4_thread_sk(now, &comment.comment_id.to_string()),
        );
        self.store.put(item).await?;
        Ok(CommentResponse::from(&comment))
    }

    /// Lists a thread (replies to `parent_id`, or the guild's root thread
    /// when `parent_id` is `None`) in ascending time order via GSI4.
    pub async fn list_comments(&self, guild_id: Uuid, parent_id: Option<Uuid>, pagination: CursorPagination) -> Result<Page<CommentResponse>> {
        let pk = keys::gsi4_thread_pk(&guild_id.to_string(), parent_id.map(|p| p.to_string()).as_deref());
        let page = self.store.query_index(GsiIndex::Gsi4, &pk, None, pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let comment: GuildComment = item.attrs_as()?;
            items.push(CommentResponse::from(&comment));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    pub async fn delete_comment(&self, actor_id: Uuid, guild_id: Uuid, comment_id: Uuid) -> Result<()> {
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::comment_sk(&comment_id.to_string());
        let item = self.store.get(&guild_pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("comment {comment_id} not found")))?;
        let mut comment: GuildComment = item.attrs_as()?;

        let member = self.get_member(guild_id, actor_id).await?;
        let is_moderator_or_above = member.as_ref().map(|m| m.role >= GuildRole::Moderator).unwrap_or(false);
        if comment.author_id != actor_id && !is_moderator_or_above {
            return Err(Error::Forbidden("only the comment's author or a moderator may delete it".to_string()));
        }

        comment.deleted = true;
        comment.body = String::new();
        let attrs = serde_json::to_value(&comment).map_err(|e| Error::Internal(format!("serialize comment: {e}")))?;
        self.store.update_with_version(&guild_pk, &sk, item.version, attrs).await?;
        Ok(())
    }

    pub async fn toggle_comments(&self, actor_id: Uuid, guild_id: Uuid, enabled: bool) -> Result<GuildResponse> {
        self.require_role(guild_id, actor_id, GuildRole::Moderator).await?;
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::guild_metadata_sk(&guild_id.to_string());
        let item = self.store.get(&guild_pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("guild {guild_id} not found")))?;
        let mut guild: Guild = item.attrs_as()?;
        guild.comments_disabled = !enabled;
        guild.updated_at = Utc::now();
        let attrs = serde_json::to_value(&guild).map_err(|e| Error::Internal(format!("serialize guild: {e}")))?;
        let updated = self.store.update_with_version(&guild_pk, &sk, item.version, attrs).await?;
        Ok(GuildResponse::from((&guild, updated.version)))
    }

    /// Toggles a reaction: adding one that doesn't exist, removing one that
    /// does. Idempotent by construction (`put_if_absent` and `delete` both
    /// tolerate being called against already-correct state).
    pub async fn toggle_reaction(&self, user_id: Uuid, guild_id: Uuid, comment_id: Uuid, request: ReactRequest) -> Result<bool> {
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let sk = format!("{}#{}", keys::comment_sk(&comment_id.to_string()), keys::reaction_sk(&user_id.to_string(), &request.emoji));

        if self.store.get(&guild_pk, &sk).await?.is_some() {
            self.store.delete(&guild_pk, &sk).await?;
            return Ok(false);
        }

        let reaction = Reaction { message_id: comment_id, user_id, emoji: request.emoji, created_at: Utc::now() };
        let item = StoreItem::new(
            guild_pk,
            sk,
            EntityType::Reaction,
            serde_json::to_value(&reaction).map_err(|e| Error::Internal(format!("serialize reaction: {e}")))?,
        );
        match self.store.put_if_absent(item).await {
            Ok(()) => Ok(true),
            Err(Error::Store(e)) if e.kind == crate::error::StoreErrorKind::ConstraintViolation => Ok(true),
            Err(e) => Err(e),
        }
    }

    pub async fn presign_avatar_upload(&self, actor_id: Uuid, guild_id: Uuid, request: AvatarUploadRequest) -> Result<AvatarUploadResponse> {
        self.require_role(guild_id, actor_id, GuildRole::Moderator).await?;
        if request.size_bytes > self.avatars.max_bytes() {
            return Err(Error::Validation(format!("avatar exceeds the {} byte limit", self.avatars.max_bytes())));
        }

        let key = format!("guilds/{guild_id}/avatar/{}", Uuid::new_v4());
        let (upload_url, ttl) = self.avatars.presign_upload(&key, &request.content_type).await?;

        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::guild_metadata_sk(&guild_id.to_string());
        let item = self.store.get(&guild_pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("guild {guild_id} not found")))?;
        let mut guild: Guild = item.attrs_as()?;
        guild.avatar_key = Some(key.clone());
        guild.avatar_confirmed = false;
        let attrs = serde_json::to_value(&guild).map_err(|e| Error::Internal(format!("serialize guild: {e}")))?;
        self.store.update_with_version(&guild_pk, &sk, item.version, attrs).await?;

        Ok(AvatarUploadResponse { upload_url, key, expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default() })
    }

    pub async fn confirm_avatar_upload(&self, actor_id: Uuid, guild_id: Uuid, request: AvatarConfirmRequest) -> Result<GuildResponse> {
        self.require_role(guild_id, actor_id, GuildRole::Moderator).await?;
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::guild_metadata_sk(&guild_id.to_string());
        let item = self.store.get(&guild_pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("guild {guild_id} not found")))?;
        let mut guild: Guild = item.attrs_as()?;

        if guild.avatar_key.as_deref() != Some(request.key.as_str()) {
            return Err(Error::Validation("confirmed key does not match the pending upload".to_string()));
        }
        self.avatars.verify_uploaded(&request.key).await?;

        guild.avatar_confirmed = true;
        guild.updated_at = Utc::now();
        let attrs = serde_json::to_value(&guild).map_err(|e| Error::Internal(format!("serialize guild: {e}")))?;
        let updated = self.store.update_with_version(&guild_pk, &sk, item.version, attrs).await?;
        Ok(GuildResponse::from((&guild, updated.version)))
    }

    /// Recomputes `ranking_score` from active (non-blocked) member count
    /// plus completed goals and quests across the membership, the periodic
    /// aggregation described by §4.6's rankings note. Meant to be invoked
    /// by a scheduler, not a request handler: it fans out one query per
    /// member, since nothing in the data model indexes "completed work" at
    /// guild scope.
    pub async fn recompute_ranking(&self, guild_id: Uuid) -> Result<GuildResponse> {
        let guild_pk = keys::guild_pk(&guild_id.to_string());
        let mut cursor = None;
        let mut active_members = 0i64;
        let mut completed_goals = 0i64;
        let mut completed_quests = 0i64;

        loop {
            let page = self
                .store
                .query_partition(&guild_pk, Some("MEMBER#"), CursorPagination::new(Some(CursorPagination::MAX_LIMIT), cursor))
                .await?;
            for item in &page.items {
                let member: GuildMember = item.attrs_as()?;
                if member.blocked {
                    continue;
                }
                active_members += 1;
                completed_goals += self.count_completed_goals(member.user_id).await?;
                completed_quests += self.count_completed_quests(member.user_id).await?;
            }
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        let score = active_members as f64 + 2.0 * completed_goals as f64 + 3.0 * completed_quests as f64;
        let sk = keys::guild_metadata_sk(&guild_id.to_string());
        let item = self.store.get(&guild_pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("guild {guild_id} not found")))?;
        let mut guild: Guild = item.attrs_as()?;
        guild.ranking_score = score;
        guild.updated_at = Utc::now();
        let attrs = serde_json::to_value(&guild).map_err(|e| Error::Internal(format!("serialize guild: {e}")))?;
        let updated = self.store.update_with_version(&guild_pk, &sk, item.version, attrs).await?;
        Ok(GuildResponse::from((&guild, updated.version)))
    }

    async fn count_completed_goals(&self, user_id: Uuid) -> Result<i64> {
        let pk = keys::user_pk(&user_id.to_string());
        let mut cursor = None;
        let mut count = 0i64;
        loop {
            let page = self
                .store
                .query_partition(&pk, Some("GOAL#"), CursorPagination::new(Some(CursorPagination::MAX_LIMIT), cursor))
                .await?;
            for item in page.items.iter().filter(|i| i.entity_type == EntityType::Goal) {
                let goal: Goal = item.attrs_as()?;
                if goal.completed {
                    count += 1;
                }
            }
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(count)
    }

    async fn count_completed_quests(&self, user_id: Uuid) -> Result<i64> {
        let pk = keys::user_pk(&user_id.to_string());
        let mut cursor = None;
        let mut count = 0i64;
        loop {
            let page = self
                .store
                .query_partition(&pk, Some("QUEST#"), CursorPagination::new(Some(CursorPagination::MAX_LIMIT), cursor))
                .await?;
            for item in &page.items {
                let quest: Quest = item.attrs_as()?;
                if quest.status == QuestStatus::Completed {
                    count += 1;
                }
            }
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(count)
    }

    async fn load_guild(&self, guild_id: Uuid) -> Result<(Guild, i64)> {
        let pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::guild_metadata_sk(&guild_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("guild {guild_id} not found")))?;
        Ok((item.attrs_as()?, item.version))
    }

    async fn get_member(&self, guild_id: Uuid, user_id: Uuid) -> Result<Option<GuildMember>> {
        let pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::member_sk(&user_id.to_string());
        match self.store.get(&pk, &sk).await? {
            Some(item) => Ok(Some(item.attrs_as()?)),
            None => Ok(None),
        }
    }

    /// Requires the actor hold at least `min_role` (moderator permissions
    /// are a superset of member, owner a superset of moderator) and not be
    /// blocked.
    async fn require_role(&self, guild_id: Uuid, actor_id: Uuid, min_role: GuildRole) -> Result<GuildMember> {
        let member = self
            .get_member(guild_id, actor_id)
            .await?
            .ok_or_else(|| Error::Forbidden(format!("user {actor_id} is not a member of guild {guild_id}")))?;
        if member.blocked {
            return Err(Error::Forbidden("blocked members have no permissions".to_string()));
        }
        if member.role < min_role {
            return Err(Error::Forbidden(format!("requires at least {min_role:?} role")));
        }
        Ok(member)
    }

    /// Requires the actor hold exactly `role` (used for ownership transfer,
    /// the one action moderators cannot perform despite otherwise mirroring
    /// the owner's permissions).
    async fn require_exact_role(&self, guild_id: Uuid, actor_id: Uuid, role: GuildRole) -> Result<StoreItem> {
        let pk = keys::guild_pk(&guild_id.to_string());
        let sk = keys::member_sk(&actor_id.to_string());
        let item = self
            .store
            .get(&pk, &sk)
            .await?
            .ok_or_else(|| Error::Forbidden(format!("user {actor_id} is not a member of guild {guild_id}")))?;
        let member: GuildMember = item.attrs_as()?;
        if member.role != role {
            return Err(Error::Forbidden(format!("requires the {role:?} role")));
        }
        Ok(item)
    }
}

/// Result of `join_guild`: immediate membership, or a pending request that
/// an owner/moderator must decide.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined(MemberResponse),
    Requested(JoinRequestResponse),
}
