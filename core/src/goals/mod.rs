//! Goal and task management: CRUD, cascading deletes, and progress tracking.

pub mod dto;
pub mod service;

pub use dto::{
    CreateGoalRequest, CreateTaskRequest, GoalProgress, GoalResponse, TaskResponse, UpdateGoalRequest, UpdateTaskRequest,
};
pub use service::GoalsService;
