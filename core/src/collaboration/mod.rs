//! Goal collaboration: invites, accept/decline, collaborator roster, and
//! shared goal comments.

pub mod dto;
pub mod service;

pub use dto::{
    CollaboratorResponse, CreateGoalCommentRequest, CreateInviteRequest, GoalCommentResponse, InviteResponse,
};
pub use service::CollaborationService;
