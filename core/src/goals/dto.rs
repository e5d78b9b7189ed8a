//! Request/response bodies for the goal and task surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Goal, Task};
use crate::validation::{self, Validate};

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 4000;
const MAX_TAGS: usize = 10;
const MAX_TAG_LEN: usize = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub deadline: DateTime<Utc>,
}

impl Validate for CreateGoalRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        let mut errors = Vec::new();
        if let Some(e) = validation::non_empty_text("title", &self.title, MAX_TITLE_LEN) {
            errors.push(e);
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(format!("description must be at most {MAX_DESCRIPTION_LEN} characters"));
        }
        if let Some(e) = validation::tag_list("tags", &self.tags, MAX_TAGS, MAX_TAG_LEN) {
            errors.push(e);
        }
        if let Some(e) = validation::deadline_within_bounds("deadline", self.deadline) {
            errors.push(e);
        }
        validation::collect(errors)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub deadline: Option<DateTime<Utc>>,
}

impl Validate for UpdateGoalRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
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
        if let Some(tags) = &self.tags {
            if let Some(e) = validation::tag_list("tags", tags, MAX_TAGS, MAX_TAG_LEN) {
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

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
}

impl Validate for CreateTaskRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        validation::collect(validation::non_empty_text("title", &self.title, MAX_TITLE_LEN).into_iter().collect())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
}

impl Validate for UpdateTaskRequest {
    fn validate(&self) -> Result<(), crate::error::Error> {
        let mut errors = Vec::new();
        if let Some(title) = &self.title {
            if let Some(e) = validation::non_empty_text("title", title, MAX_TITLE_LEN) {
                errors.push(e);
            }
        }
        validation::collect(errors)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub deadline: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl From<(&Goal, i64)> for GoalResponse {
    fn from((goal, version): (&Goal, i64)) -> Self {
        Self {
            id: goal.goal_id,
            title: goal.title.clone(),
            description: goal.description.clone(),
            tags: goal.tags.clone(),
            deadline: goal.deadline,
            completed: goal.completed,
            completed_at: goal.completed_at,
            created_at: goal.created_at,
            updated_at: goal.updated_at,
            version,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

impl From<(&Task, i64)> for TaskResponse {
    fn from((task, version): (&Task, i64)) -> Self {
        Self {
            id: task.task_id,
            goal_id: task.goal_id,
            title: task.title.clone(),
            completed: task.completed,
            completed_at: task.completed_at,
            created_at: task.created_at,
            version,
        }
    }
}

/// Hybrid progress for a single goal: `0.7 * taskProgress + 0.3 *
/// timeProgress`, the same weighting `quests::service` uses against a
/// quest's deadline.
#[derive(Debug, Clone, Serialize)]
pub struct GoalProgress {
    pub goal_id: Uuid,
    pub task_count: u32,
    pub completed_count: u32,
    pub progress: f64,
    pub completed: bool,
}
