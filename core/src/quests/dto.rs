//! Request/response bodies for the quest surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{Quest, QuestStatus};
use crate::validation::{self, Validate};

const MAX_TITLE_LEN: usize = 200;
const MAX_REWARD_XP: i32 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestRequest {
    pub goal_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub reward_xp: i32,
    pub deadline: DateTime<Utc>,
}

impl Validate for CreateQuestRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        let mut errors = Vec::new();
        if let Some(e) = validation::non_empty_text("title", &self.title, MAX_TITLE_LEN) {
            errors.push(e);
        }
        if let Some(e) = validation::in_range_i32("rewardXp", self.reward_xp, 0, MAX_REWARD_XP) {
            errors.push(e);
        }
        if let Some(e) = validation::deadline_within_bounds("deadline", self.deadline) {
            errors.push(e);
        }
        validation::collect(errors)
    }
}

/// Draft-only edit: per the state machine, a quest can only be edited while
/// still in `draft`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateQuestRequest {
    pub title: Option<String>,
    pub reward_xp: Option<i32>,
    pub deadline: Option<DateTime<Utc>>,
}

impl Validate for UpdateQuestRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        let mut errors = Vec::new();
        if let Some(title) = &self.title {
            if let Some(e) = validation::non_empty_text("title", title, MAX_TITLE_LEN) {
                errors.push(e);
            }
        }
        if let Some(reward_xp) = self.reward_xp {
            if let Some(e) = validation::in_range_i32("rewardXp", reward_xp, 0, MAX_REWARD_XP) {
                errors.push(e);
            }
        }
        if let Some(deadline) = self.deadline {
            if let Some(e) = validation::deadline_within_bounds("deadline", deadline) {
                errors.push(e);
            }
        }
        validation::collect(errors)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestResponse {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub status: QuestStatus,
    pub reward_xp: i32,
    pub deadline: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl From<(&Quest, i64)> for QuestResponse {
    fn from((quest, version): (&Quest, i64)) -> Self {
        Self {
            id: quest.quest_id,
            goal_id: quest.goal_id,
            title: quest.title.clone(),
            status: quest.status,
            reward_xp: quest.reward_xp,
            deadline: quest.deadline,
            started_at: quest.started_at,
            progress: quest.progress,
            created_at: quest.created_at,
            updated_at: quest.updated_at,
            version,
        }
    }
}

/// `GET /quests/analytics?period=` response: counts by state, completion
/// rate, average time-to-completion, and XP earned within the window.
#[derive(Debug, Clone, Serialize)]
pub struct QuestAnalytics {
    pub period: AnalyticsPeriod,
    pub by_state: HashMap<String, u32>,
    pub completion_rate: f64,
    pub avg_time_to_completion_secs: Option<f64>,
    pub xp_earned: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsPeriod {
    Day,
    Week,
    Month,
    All,
}

impl AnalyticsPeriod {
    pub fn window(self) -> Option<chrono::Duration> {
        match self {
            Self::Day => Some(chrono::Duration::days(1)),
            Self::Week => Some(chrono::Duration::days(7)),
            Self::Month => Some(chrono::Duration::days(30)),
            Self::All => None,
        }
    }
}
