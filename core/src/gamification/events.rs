//! Event vocabulary and the XP/badge rule table.

use serde::Serialize;

/// Something that happened elsewhere in the platform that may award XP.
/// `event_id` scopes idempotency: raising the same event twice (a retried
/// request, an overlapping sweep pass) awards XP only once.
#[derive(Debug, Clone, Serialize)]
pub enum GameEvent {
    TaskCompleted { event_id: String },
    GoalCompleted { event_id: String },
    GoalMilestone { event_id: String, threshold: &'static str },
    QuestCompleted { event_id: String, reward_xp: i32 },
    QuestMilestone { event_id: String, threshold: &'static str },
}

impl GameEvent {
    pub fn event_id(&self) -> &str {
        match self {
            Self::TaskCompleted { event_id }
            | Self::GoalCompleted { event_id }
            | Self::GoalMilestone { event_id, .. }
            | Self::QuestCompleted { event_id, .. }
            | Self::QuestMilestone { event_id, .. } => event_id,
        }
    }

    /// XP awarded for this event. Quest completion pays out the quest's own
    /// configured reward; everything else is a fixed amount from the rule
    /// table below.
    pub fn xp(&self) -> i32 {
        match self {
            Self::TaskCompleted { .. } => TASK_COMPLETED_XP,
            Self::GoalCompleted { .. } => GOAL_COMPLETED_XP,
            Self::GoalMilestone { .. } => MILESTONE_XP,
            Self::QuestCompleted { reward_xp, .. } => *reward_xp,
            Self::QuestMilestone { .. } => MILESTONE_XP,
        }
    }
}

const TASK_COMPLETED_XP: i32 = 10;
const GOAL_COMPLETED_XP: i32 = 100;
const MILESTONE_XP: i32 = 25;

/// Badges earned by crossing a cumulative XP total, in ascending order.
/// Awarded once: a profile gains a badge the first time its XP total meets
/// the threshold and it isn't already in `badges`.
pub const XP_BADGES: &[(i64, &str)] = &[
    (100, "first_steps"),
    (1_000, "dedicated"),
    (10_000, "grandmaster"),
];

/// `level = floor(xp / 1000) + 1`, uncapped.
pub fn level_for_xp(xp: i64) -> i32 {
    (xp / 1000) as i32 + 1
}
