//! Goal and task CRUD, cascading deletes, and hybrid task/time progress.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{keys, EntityType, Goal, GoalOwnerMarker, Task};
use crate::error::{Error, Result};
use crate::gamification::{GameEvent, GamificationService};
use crate::store::{CoreStore, CursorPagination, Page, StoreItem, TransactOp};
use crate::validation::Validate;

use super::dto::{
    CreateGoalRequest, CreateTaskRequest, GoalProgress, GoalResponse, TaskResponse, UpdateGoalRequest, UpdateTaskRequest,
};

/// Milestone thresholds a goal's progress fires at most once each, crossed
/// ascending as tasks complete.
const MILESTONE_THRESHOLDS: &[(f64, &str)] = &[(0.25, "0.25"), (0.5, "0.5"), (0.75, "0.75"), (1.0, "1.0")];

/// Hybrid progress weights, matching `quests::service`: task completion
/// ratio counts for 70%, elapsed time against the deadline for 30%.
const TASK_WEIGHT: f64 = 0.7;
const TIME_WEIGHT: f64 = 0.3;

/// Cascading goal deletes run in bounded batches; callers of `delete_goal`
/// never see the individual sweep passes, only the final outcome.
const CASCADE_BATCH_SIZE: u32 = 25;

#[derive(Clone)]
pub struct GoalsService {
    store: Arc<dyn CoreStore>,
    gamification: GamificationService,
}

impl GoalsService {
    pub fn new(store: Arc<dyn CoreStore>, gamification: GamificationService) -> Self {
        Self { store, gamification }
    }

    pub async fn create_goal(&self, user_id: Uuid, request: CreateGoalRequest) -> Result<GoalResponse> {
        request.validate()?;
        let now = Utc::now();
        let goal = Goal {
            goal_id: Uuid::new_v4(),
            user_id,
            title: request.title,
            description: request.description,
            tags: request.tags,
            deadline: request.deadline,
            completed: false,
            completed_at: None,
            milestones_fired: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::goal_sk(&goal.goal_id.to_string());
        let attrs = serde_json::to_value(&goal).map_err(|e| Error::Internal(format!("serialize goal: {e}")))?;
        let goal_item = StoreItem::new(pk, sk, EntityType::Goal, attrs);

        let marker = GoalOwnerMarker { goal_id: goal.goal_id, user_id };
        let marker_item = StoreItem::new(
            keys::goal_invite_pk(&goal.goal_id.to_string()),
            keys::GOAL_OWNER_MARKER_SK,
            EntityType::GoalOwnerMarker,
            serde_json::to_value(&marker).map_err(|e| Error::Internal(format!("serialize goal owner marker: {e}")))?,
        );

        self.store.transact_write(vec![TransactOp::Put(goal_item), TransactOp::Put(marker_item)]).await?;

        info!(goal_id = %goal.goal_id, user_id = %user_id, "goal created");
        Ok(GoalResponse::from((&goal, 1)))
    }

    /// Lists goals in a user's partition. A page may return fewer items than
    /// requested: the `GOAL#` sort-key prefix also matches the owning goal's
    /// own task rows (`GOAL#<id>#TASK#<id>`), filtered out client-side after
    /// the query, matching how a filtered DynamoDB query counts items toward
    /// `Limit` before the filter expression runs.
    pub async fn list_goals(&self, user_id: Uuid, pagination: CursorPagination) -> Result<Page<GoalResponse>> {
        let pk = keys::user_pk(&user_id.to_string());
        let page = self.store.query_partition(&pk, Some("GOAL#"), pagination).await?;

        let mut items = Vec::new();
        for item in page.items.iter().filter(|i| i.entity_type == EntityType::Goal) {
            let goal: Goal = item.attrs_as()?;
            items.push(GoalResponse::from((&goal, item.version)));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    pub async fn update_goal(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        request: UpdateGoalRequest,
        expected_version: i64,
    ) -> Result<GoalResponse> {
        request.validate()?;
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::goal_sk(&goal_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("goal {goal_id} not found")))?;
        let mut goal: Goal = item.attrs_as()?;

        if let Some(title) = request.title {
            goal.title = title;
        }
        if let Some(description) = request.description {
            goal.description = description;
        }
        if let Some(tags) = request.tags {
            goal.tags = tags;
        }
        if let Some(deadline) = request.deadline {
            goal.deadline = deadline;
        }
        goal.updated_at = Utc::now();

        let attrs = serde_json::to_value(&goal).map_err(|e| Error::Internal(format!("serialize goal: {e}")))?;
        let updated = self.store.update_with_version(&pk, &sk, expected_version, attrs).await?;
        Ok(GoalResponse::from((&goal, updated.version)))
    }

    /// Deletes a goal and every one of its tasks in one bounded, possibly
    /// multi-pass cascade, per the single-sweep deletion invariant: tasks
    /// share the goal's sort-key prefix, so `delete_cascade` removes both in
    /// one primitive per batch.
    pub async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> Result<()> {
        let pk = keys::user_pk(&user_id.to_string());
        let prefix = format!("GOAL#{goal_id}");
        loop {
            let outcome = self.store.delete_cascade(&pk, &prefix, CASCADE_BATCH_SIZE).await?;
            if !outcome.truncated {
                break;
            }
        }

        // The owner marker, invites, and collaborator rows live under a
        // separate `GOAL#<id>` partition (`keys::goal_invite_pk`), distinct
        // from the owner-scoped partition just swept above.
        let invite_pk = keys::goal_invite_pk(&goal_id.to_string());
        loop {
            let outcome = self.store.delete_cascade(&invite_pk, "", CASCADE_BATCH_SIZE).await?;
            if !outcome.truncated {
                break;
            }
        }

        info!(goal_id = %goal_id, user_id = %user_id, "goal deleted");
        Ok(())
    }

    pub async fn create_task(&self, user_id: Uuid, goal_id: Uuid, request: CreateTaskRequest) -> Result<TaskResponse> {
        request.validate()?;
        let pk = keys::user_pk(&user_id.to_string());
        let goal_sk = keys::goal_sk(&goal_id.to_string());
        if self.store.get(&pk, &goal_sk).await?.is_none() {
            return Err(Error::NotFound(format!("goal {goal_id} not found")));
        }

        let task = Task {
            task_id: Uuid::new_v4(),
            goal_id,
            title: request.title,
            completed: false,
            completed_at: None,
            created_at: Utc::now(),
            version: 1,
        };

        let sk = keys::task_sk(&goal_id.to_string(), &task.task_id.to_string());
        let attrs = serde_json::to_value(&task).map_err(|e| Error::Internal(format!("serialize task: {e}")))?;
        self.store.put(StoreItem::new(pk, sk, EntityType::Task, attrs)).await?;

        Ok(TaskResponse::from((&task, 1)))
    }

    pub async fn list_tasks(&self, user_id: Uuid, goal_id: Uuid, pagination: CursorPagination) -> Result<Page<TaskResponse>> {
        let pk = keys::user_pk(&user_id.to_string());
        let prefix = format!("GOAL#{goal_id}#TASK#");
        let page = self.store.query_partition(&pk, Some(&prefix), pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let task: Task = item.attrs_as()?;
            items.push(TaskResponse::from((&task, item.version)));
        }
        Ok(Page { items, next_cursor: page.next_cursor })
    }

    pub async fn update_task(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        task_id: Uuid,
        request: UpdateTaskRequest,
        expected_version: i64,
    ) -> Result<TaskResponse> {
        request.validate()?;
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::task_sk(&goal_id.to_string(), &task_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("task {task_id} not found")))?;
        let mut task: Task = item.attrs_as()?;

        if let Some(title) = request.title {
            task.title = title;
        }

        let attrs = serde_json::to_value(&task).map_err(|e| Error::Internal(format!("serialize task: {e}")))?;
        let updated = self.store.update_with_version(&pk, &sk, expected_version, attrs).await?;
        Ok(TaskResponse::from((&task, updated.version)))
    }

    pub async fn delete_task(&self, user_id: Uuid, goal_id: Uuid, task_id: Uuid) -> Result<()> {
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::task_sk(&goal_id.to_string(), &task_id.to_string());
        self.store.delete(&pk, &sk).await
    }

    /// Marks a task complete. Idempotent: completing an already-completed
    /// task is a no-op that returns the task unchanged, rather than
    /// re-awarding XP or re-firing goal milestones.
    pub async fn complete_task(&self, user_id: Uuid, goal_id: Uuid, task_id: Uuid) -> Result<TaskResponse> {
        let pk = keys::user_pk(&user_id.to_string());
        let sk = keys::task_sk(&goal_id.to_string(), &task_id.to_string());
        let item = self.store.get(&pk, &sk).await?.ok_or_else(|| Error::NotFound(format!("task {task_id} not found")))?;
        let mut task: Task = item.attrs_as()?;

        if task.completed {
            return Ok(TaskResponse::from((&task, item.version)));
        }

        let now = Utc::now();
        task.completed = true;
        task.completed_at = Some(now);
        let attrs = serde_json::to_value(&task).map_err(|e| Error::Internal(format!("serialize task: {e}")))?;
        let updated = self.store.update_with_version(&pk, &sk, item.version, attrs).await?;

        self.gamification
            .award(user_id, GameEvent::TaskCompleted { event_id: format!("task_completed:{task_id}") })
            .await?;

        self.apply_progress(user_id, goal_id).await?;

        Ok(TaskResponse::from((&task, updated.version)))
    }

    /// Recomputes a goal's hybrid progress — `0.7 * taskProgress + 0.3 *
    /// timeProgress`, where `taskProgress` is the completion ratio of its
    /// tasks and `timeProgress` is elapsed time against `goal.deadline`,
    /// clamped to `[0, 1]` — firing crossed milestones and auto-completing
    /// the goal once every task is done.
    async fn apply_progress(&self, user_id: Uuid, goal_id: Uuid) -> Result<GoalProgress> {
        let pk = keys::user_pk(&user_id.to_string());
        let goal_sk = keys::goal_sk(&goal_id.to_string());
        let item = self.store.get(&pk, &goal_sk).await?.ok_or_else(|| Error::NotFound(format!("goal {goal_id} not found")))?;
        let mut goal: Goal = item.attrs_as()?;

        let (total, completed) = self.count_tasks(&pk, goal_id).await?;
        let progress = Self::hybrid_progress(&goal, total, completed);

        let mut newly_crossed = Vec::new();
        for (threshold, label) in MILESTONE_THRESHOLDS {
            if progress >= *threshold && !goal.milestones_fired.iter().any(|m| m == label) {
                goal.milestones_fired.push((*label).to_string());
                newly_crossed.push(*label);
            }
        }

        let now_completing = total > 0 && completed == total && !goal.completed;
        if now_completing {
            goal.completed = true;
            goal.completed_at = Some(Utc::now());
        }

        if !newly_crossed.is_empty() || now_completing {
            goal.updated_at = Utc::now();
            let attrs = serde_json::to_value(&goal).map_err(|e| Error::Internal(format!("serialize goal: {e}")))?;
            self.store.update_with_version(&pk, &goal_sk, item.version, attrs).await?;
        }

        for label in &newly_crossed {
            if *label == "1.0" {
                continue;
            }
            self.gamification
                .award(
                    user_id,
                    GameEvent::GoalMilestone { event_id: format!("goal_milestone:{goal_id}:{label}"), threshold: label },
                )
                .await?;
        }
        if now_completing {
            self.gamification
                .award(user_id, GameEvent::GoalCompleted { event_id: format!("goal_completed:{goal_id}") })
                .await?;
        }

        Ok(GoalProgress { goal_id, task_count: total, completed_count: completed, progress, completed: goal.completed })
    }

    pub async fn list_goal_progress(&self, user_id: Uuid, goal_id: Uuid) -> Result<GoalProgress> {
        let pk = keys::user_pk(&user_id.to_string());
        let goal_sk = keys::goal_sk(&goal_id.to_string());
        let item = self.store.get(&pk, &goal_sk).await?.ok_or_else(|| Error::NotFound(format!("goal {goal_id} not found")))?;
        let goal: Goal = item.attrs_as()?;

        let (total, completed) = self.count_tasks(&pk, goal_id).await?;
        let progress = Self::hybrid_progress(&goal, total, completed);
        Ok(GoalProgress { goal_id, task_count: total, completed_count: completed, progress, completed: goal.completed })
    }

    /// Progress for every goal in the user's partition. Bounded by however
    /// many goals `list_goals` returns in one page; callers needing the
    /// complete set page through with the returned cursor.
    pub async fn list_all_goal_progress(&self, user_id: Uuid, pagination: CursorPagination) -> Result<Page<GoalProgress>> {
        let goals = self.list_goals(user_id, pagination).await?;
        let mut items = Vec::with_capacity(goals.items.len());
        for goal in &goals.items {
            items.push(self.list_goal_progress(user_id, goal.id).await?);
        }
        Ok(Page { items, next_cursor: goals.next_cursor })
    }

    async fn count_tasks(&self, user_pk: &str, goal_id: Uuid) -> Result<(u32, u32)> {
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

    /// `0.7 * taskProgress + 0.3 * timeProgress`, matching
    /// `quests::service::recompute_progress`'s weighting against its own
    /// deadline.
    fn hybrid_progress(goal: &Goal, total: u32, completed: u32) -> f64 {
        let task_progress = if total == 0 { 0.0 } else { f64::from(completed) / f64::from(total) };

        let time_progress = if goal.deadline <= goal.created_at {
            0.0
        } else {
            let elapsed = (Utc::now() - goal.created_at).num_milliseconds() as f64;
            let span = (goal.deadline - goal.created_at).num_milliseconds() as f64;
            (elapsed / span).clamp(0.0, 1.0)
        };

        TASK_WEIGHT * task_progress + TIME_WEIGHT * time_progress
    }
}
