//! Guild creation, membership, moderation, threaded comments, reactions,
//! and avatar uploads.

pub mod avatar;
pub mod dto;
pub mod service;

pub use avatar::AvatarStore;
pub use dto::{
    AvatarConfirmRequest, AvatarUploadRequest, AvatarUploadResponse, CommentResponse, CreateCommentRequest, CreateGuildRequest,
    GuildResponse, JoinGuildRequest, JoinRequestResponse, MemberResponse, ReactRequest, UpdateGuildRequest,
};
pub use service::{GuildsService, JoinOutcome};
