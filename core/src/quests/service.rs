//! Quest state machine, hybrid progress tracking, and analytics.
//!
//! State machine:
//!
//! ```text
//! draft --start--> active --complete--> completed
//!   ^ \-edit-/       | \--cancel--> cancelled
//!                    \---fail----> failed
//! ```
//!
//! `completed`/`cancelled`/`failed` are terminal: any further transition
//! attempt is rejected with [`Error::GoneTerminal`].

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{keys, EntityType, Quest, QuestStatus, Task};
use crate::error::{Error, Result};
use crate::gamification::{GameEvent, GamificationService};
use crate::store::{CoreStore, CursorPagination, Page, StoreItem};
use crate::validation::Validate;

use super::dto::{AnalyticsPeriod, CreateQuestRequest, QuestAnalytics, QuestResponse, UpdateQuestRequest};

/// Hybrid progress weighting: task completion dominates, elapsed time
/// against the deadline contributes the rest.
const TASK_WEIGHT: f64 = 0.7;
const TIME_WEIGHT: f64 = 0.3;
const MILESTONE_THRESHOLDS: &[(f64, &str)] = &[(0.25, "0.25"), (0.5, "0.5"), (0.75, "0.75"), (1.0, "1.0")];

#[derive(Clone)]
pub struct QuestsService {
    store: Arc<dyn CoreStore>,
    gamification: GamificationService,
}

impl QuestsService {
    pub fn new(store: Arc<dyn CoreStore>, gamification: GamificationService) -> Self {
        Self { store, gamification }
    }

    pub async fn create_quest(&self, user_id: Uuid, request: CreateQuestRequest) -> Result<QuestResponse> {
        request.validate()?;
        let pk = keys::user_pk(&user_id.to_string());
        let goal_sk = keys::goal_sk(&request.goal_id.to_string());
        if self.store.get(&pk, &goal_sk).await?.is_none() {
            return Err(Error::NotFound(format!("goal {} not found", request.goal_id)));
        }

        let now = Utc::now();
        let quest = Quest {
            quest_id: Uuid::new_v4(),
            user_id,
            goal_id: request.goal_id,
            title: request.title,
            status: QuestStatus::Draft,
            reward_xp: request.reward_xp,
            deadline: request.deadline,
            started_at: None,
            progress: 0.0,
            milestones_fired: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let sk = keys::quest_sk(&quest.quest_id.to_string());
        let attrs = serde_json::to_value(&quest).map_err(|e| Error::Internal(format!("serialize quest: {e}")))?;
        self.store.put(StoreItem::new(pk, sk, EntityType::Quest, attrs)).await?;

        Ok(QuestResponse::from((&quest, 1)))
    }

    pub async fn list_quests(&self, user_id: Uuid, pagination: CursorPagination) -> Result<Page<QuestResponse>> {
        let pk = keys::user_pk(&user_id.to_string());
        let page = self.store.query_partition(&pk, Some("QUEST#"), pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let quest: Quest = item.attrs_as()?;
            items.push(QuestResponse::from((&quest, item.version)));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    pub async fn get_quest(&self, user_id: Uuid, quest_id: Uuid) -> Result<QuestResponse> {
        let (quest, version) = self.load(user_id, quest_id).await?;
        Ok(QuestResponse::from((&quest, version)))
    }

    /// Edits title/reward/deadline. Only legal while the quest is still
    /// `draft` (the `draft --edit--> draft` self-loop).
    pub async fn edit_quest(
        &self,
        user_id: Uuid,
        quest_id: Uuid,
        request: UpdateQuestRequest,
        expected_version: i64,
    ) -> Result<QuestResponse> {
        request.validate()?;
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::quest_sk(&quest_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("quest {quest_id} not found")))?;
        let mut quest: Quest = item.attrs_as()?;

        self.require_status(&quest, QuestStatus::Draft, "edit")?;

        if let Some(title) = request.title {
            quest.title = title;
        }
        if let Some(reward_xp) = request.reward_xp {
            quest.reward_xp = reward_xp;
        }
        if let Some(deadline) = request.deadline {
            quest.deadline = deadline;
        }
        quest.updated_at = Utc::now();

        let attrs = serde_json::to_value(&quest).map_err(|e| Error::Internal(format!("serialize quest: {e}")))?;
        let updated = self.store.update_with_version(&pk, &sk, expected_version, attrs).await?;
        Ok(QuestResponse::from((&quest, updated.version)))
    }

    pub async fn start_quest(&self, user_id: Uuid, quest_id: Uuid, expected_version: i64) -> Result<QuestResponse> {
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::quest_sk(&quest_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("quest {quest_id} not found")))?;
        let mut quest: Quest = item.attrs_as()?;

        self.require_status(&quest, QuestStatus::Draft, "start")?;
        quest.status = QuestStatus::Active;
        quest.started_at = Some(Utc::now());
        quest.updated_at = Utc::now();

        let attrs = serde_json::to_value(&quest).map_err(|e| Error::Internal(format!("serialize quest: {e}")))?;
        let updated = self.store.update_with_version(&pk, &sk, expected_version, attrs).await?;
        info!(quest_id = %quest_id, user_id = %user_id, "quest started");
        Ok(QuestResponse::from((&quest, updated.version)))
    }

    pub async fn cancel_quest(&self, user_id: Uuid, quest_id: Uuid, expected_version: i64) -> Result<QuestResponse> {
        self.terminal_transition(user_id, quest_id, expected_version, QuestStatus::Cancelled, "cancel").await
    }

    pub async fn fail_quest(&self, user_id: Uuid, quest_id: Uuid, expected_version: i64) -> Result<QuestResponse> {
        self.terminal_transition(user_id, quest_id, expected_version, QuestStatus::Failed, "fail").await
    }

    /// Manual owner-initiated completion. The auto-completion sweep
    /// (`sweep_active`) reaches the same terminal state without a version
    /// argument, for when the transition happens opportunistically rather
    /// than as a direct API call.
    pub async fn complete_quest(&self, user_id: Uuid, quest_id: Uuid, expected_version: i64) -> Result<QuestResponse> {
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::quest_sk(&quest_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("quest {quest_id} not found")))?;
        let mut quest: Quest = item.attrs_as()?;
        self.require_status(&quest, QuestStatus::Active, "complete")?;

        quest.status = QuestStatus::Completed;
        quest.progress = 1.0;
        quest.updated_at = Utc::now();
        let attrs = serde_json::to_value(&quest).map_err(|e| Error::Internal(format!("serialize quest: {e}")))?;
        let updated = self.store.update_with_version(&pk, &sk, expected_version, attrs).await?;

        self.gamification
            .award(user_id, GameEvent::QuestCompleted { event_id: format!("quest_completed:{quest_id}"), reward_xp: quest.reward_xp })
            .await?;

        Ok(QuestResponse::from((&quest, updated.version)))
    }

    async fn terminal_transition(
        &self,
        user_id: Uuid,
        quest_id: Uuid,
        expected_version: i64,
        target: QuestStatus,
        action: &str,
    ) -> Result<QuestResponse> {
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::quest_sk(&quest_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("quest {quest_id} not found")))?;
        let mut quest: Quest = item.attrs_as()?;
        self.require_status(&quest, QuestStatus::Active, action)?;

        quest.status = target;
        quest.updated_at = Utc::now();
        let attrs = serde_json::to_value(&quest).map_err(|e| Error::Internal(format!("serialize quest: {e}")))?;
        let updated = self.store.update_with_version(&pk, &sk, expected_version, attrs).await?;
        Ok(QuestResponse::from((&quest, updated.version)))
    }

    fn require_status(&self, quest: &Quest, required: QuestStatus, action: &str) -> Result<()> {
        if matches!(quest.status, QuestStatus::Completed | QuestStatus::Cancelled | QuestStatus::Failed) {
            return Err(Error::GoneTerminal(format!("quest {} is in a terminal state and cannot {action}", quest.quest_id)));
        }
        if quest.status != required {
            return Err(Error::ConflictState(format!(
                "quest {} must be {required:?} to {action}, is {:?}",
                quest.quest_id, quest.status
            )));
        }
        Ok(())
    }

    /// Recomputes the hybrid progress of one quest — `0.7 * taskProgress +
    /// 0.3 * timeProgress`, where `taskProgress` is the completion ratio of
    /// its linked goal's tasks and `timeProgress` is elapsed time against
    /// the quest's own deadline, clamped to `[0, 1]`. Fires any newly
    /// crossed milestone ({0.25, 0.5, 0.75, 1.0}) exactly once, and
    /// auto-completes or auto-fails the quest when appropriate. Safe to
    /// call repeatedly: already-fired milestones and terminal states are
    /// no-ops.
    pub async fn recompute_progress(&self, user_id: Uuid, quest_id: Uuid) -> Result<QuestResponse> {
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::quest_sk(&quest_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("quest {quest_id} not found")))?;
        let mut quest: Quest = item.attrs_as()?;

        if quest.status != QuestStatus::Active {
            return Ok(QuestResponse::from((&quest, item.version)));
        }

        let (total, completed) = self.count_goal_tasks(&pk, quest.goal_id).await?;
        let task_progress = if total == 0 { 0.0 } else { f64::from(completed) / f64::from(total) };

        let now = Utc::now();
        let time_progress = if quest.deadline <= quest.created_at {
            0.0
        } else {
            let elapsed = (now - quest.created_at).num_milliseconds() as f64;
            let span = (quest.deadline - quest.created_at).num_milliseconds() as f64;
            (elapsed / span).clamp(0.0, 1.0)
        };

        quest.progress = TASK_WEIGHT * task_progress + TIME_WEIGHT * time_progress;

        let mut newly_crossed = Vec::new();
        for (threshold, label) in MILESTONE_THRESHOLDS {
            if quest.progress >= *threshold && !quest.milestones_fired.iter().any(|m| m == label) {
                quest.milestones_fired.push((*label).to_string());
                newly_crossed.push(*label);
            }
        }

        let deadline_passed = now > quest.deadline;
        if quest.progress >= 1.0 {
            quest.status = QuestStatus::Completed;
        } else if deadline_passed {
            quest.status = QuestStatus::Failed;
        }
        quest.updated_at = now;

        let attrs = serde_json::to_value(&quest).map_err(|e| Error::Internal(format!("serialize quest: {e}")))?;
        let updated = self.store.update_with_version(&pk, &sk, item.version, attrs).await?;

        for label in &newly_crossed {
            if *label == "1.0" {
                continue;
            }
            self.gamification
                .award(
                    user_id,
                    GameEvent::QuestMilestone { event_id: format!("quest_milestone:{quest_id}:{label}"), threshold: label },
                )
                .await?;
        }
        if quest.status == QuestStatus::Completed {
            self.gamification
                .award(user_id, GameEvent::QuestCompleted { event_id: format!("quest_completed:{quest_id}"), reward_xp: quest.reward_xp })
                .await?;
        }

        Ok(QuestResponse::from((&quest, updated.version)))
    }

    /// Sweeps every active quest in a user's partition through
    /// `recompute_progress`, auto-completing or auto-failing as their
    /// linked goal progresses or their deadline passes. There is no
    /// secondary index for "all active quests across all users" (the five
    /// GSI slots are guild-scoped), so this runs per user; a scheduler
    /// enumerates users and calls it per id rather than in one global pass.
    pub async fn sweep_active(&self, user_id: Uuid) -> Result<Vec<QuestResponse>> {
        let pk = keys::user_pk(&user_id.to_string());
        let mut cursor = None;
        let mut touched = Vec::new();
        loop {
            let page = self
                .store
                .query_partition(&pk, Some("QUEST#"), CursorPagination::new(Some(CursorPagination::MAX_LIMIT), cursor))
                .await?;
            for item in &page.items {
                let quest: Quest = item.attrs_as()?;
                if quest.status == QuestStatus::Active {
                    touched.push(self.recompute_progress(user_id, quest.quest_id).await?);
                }
            }
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(touched)
    }

    pub async fn analytics(&self, user_id: Uuid, period: AnalyticsPeriod) -> Result<QuestAnalytics> {
        let pk = keys::user_pk(&user_id.to_string());
        let cutoff = period.window().map(|window| Utc::now() - window);

        let mut cursor = None;
        let mut by_state: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
        let mut completed_count = 0u32;
        let mut total_count = 0u32;
        let mut completion_seconds_sum = 0.0f64;
        let mut completion_samples = 0u32;
        let mut xp_earned = 0i64;

        loop {
            let page = self
                .store
                .query_partition(&pk, Some("QUEST#"), CursorPagination::new(Some(CursorPagination::MAX_LIMIT), cursor))
                .await?;
            for item in &page.items {
                let quest: Quest = item.attrs_as()?;
                if let Some(cutoff) = cutoff {
                    if quest.created_at < cutoff {
                        continue;
                    }
                }
                total_count += 1;
                *by_state.entry(format!("{:?}", quest.status).to_lowercase()).or_insert(0) += 1;
                if quest.status == QuestStatus::Completed {
                    completed_count += 1;
                    xp_earned += i64::from(quest.reward_xp);
                    if let Some(started_at) = quest.started_at {
                        completion_seconds_sum += (quest.updated_at - started_at).num_milliseconds() as f64 / 1000.0;
                        completion_samples += 1;
                    }
                }
            }
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        let completion_rate = if total_count == 0 { 0.0 } else { f64::from(completed_count) / f64::from(total_count) };
        let avg_time_to_completion_secs =
            if completion_samples == 0 { None } else { Some(completion_seconds_sum / f64::from(completion_samples)) };

        Ok(QuestAnalytics { period, by_state, completion_rate, avg_time_to_completion_secs, xp_earned })
    }

    async fn load(&self, user_id: Uuid, quest_id: Uuid) -> Result<(Quest, i64)> {
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::quest_sk(&quest_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("quest {quest_id} not found")))?;
        let quest = item.attrs_as()?;
        Ok((quest, item.version))
    }

    async fn count_goal_tasks(&self, user_pk: &str, goal_id: Uuid) -> Result<(u32, u32)> {
        let prefix = format!("GOAL#{goal_id}#TASK#");
        let mut cursor = None;
        let mut total = 0u32;
        let mut completed = 0u32;
        loop {
            let page = self
                .store
                .query_partition(user_pk, Some(&prefix), CursorPagination::new(Some(CursorPagination::MAX_LIMIT), cursor))
                .await?;
            for item in &page.items {
                let task: Task = item.attrs_as()?;
                total += 1;
                if task.completed {
                    completed += 1;
                }
            }
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok((total, completed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestone_thresholds_match_the_quarter_steps() {
        let labels: Vec<_> = MILESTONE_THRESHOLDS.iter().map(|(_, l)| *l).collect();
        assert_eq!(labels, ["0.25", "0.5", "0.75", "1.0"]);
    }
}
