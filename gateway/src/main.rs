//! Waymark HTTP + WebSocket edge gateway binary.

mod auth;
mod cached;
mod edge;
mod handlers;
mod pagination;
mod state;
mod version;

use axum::routing::{delete, get, post, put};
use axum::Router;
use waymark_core::config::Config;
use waymark_core::error::Result;
use waymark_core::middleware::JwtAuth;
use waymark_core::server::Server;
use waymark_core::state::AppState;

use state::GatewayState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load()?;
    let app_state = AppState::builder().config(config.clone()).build().await?;
    let gateway_state = GatewayState::build(app_state).await?;

    let router = build_router(gateway_state);
    Server::new(config).serve(router).await
}

fn build_router(state: GatewayState) -> Router {
    let api_key_router = Router::new()
        .route("/users/signup", post(handlers::identity::signup))
        .route("/users/login", post(handlers::identity::login))
        .route("/users/login/google", post(handlers::identity::login_federated))
        .route("/health", get(waymark_core::health::health))
        .route("/ready", get(waymark_core::health::readiness))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    let bearer_router = Router::new()
        .route("/users/logout", post(handlers::identity::logout))
        .route("/auth/renew", post(handlers::identity::renew))
        .route("/profile", get(handlers::identity::get_profile).put(handlers::identity::update_profile))
        .route("/quests", get(handlers::goals::list_goals).post(handlers::goals::create_goal))
        .route("/quests/{goalId}", put(handlers::goals::update_goal).delete(handlers::goals::delete_goal))
        .route("/quests/createTask", post(handlers::goals::create_task))
        .route("/quests/tasks/{taskId}", put(handlers::goals::update_task).delete(handlers::goals::delete_task))
        .route("/quests/tasks/{taskId}/complete", post(handlers::goals::complete_task))
        .route("/quests/progress", get(handlers::goals::list_all_goal_progress))
        .route("/quests/{goalId}/progress", get(handlers::goals::goal_progress))
        .route("/quests/{goalId}/invites", post(handlers::collaboration::create_invite).get(handlers::collaboration::list_outgoing_invites))
        .route("/quests/invites", get(handlers::collaboration::list_incoming_invites))
        .route("/quests/{goalId}/invites/accept", post(handlers::collaboration::accept_invite))
        .route("/quests/{goalId}/invites/decline", post(handlers::collaboration::decline_invite))
        .route("/quests/{goalId}/collaborators", get(handlers::collaboration::list_collaborators))
        .route("/quests/{goalId}/comments", post(handlers::collaboration::create_comment).get(handlers::collaboration::list_comments))
        .route("/quests/{goalId}/comments/{commentId}", delete(handlers::collaboration::delete_comment))
        .route("/quests/createQuest", post(handlers::quests::create_quest))
        .route("/quests/quests/{id}/start", post(handlers::quests::start_quest))
        .route("/quests/quests/{id}/cancel", post(handlers::quests::cancel_quest))
        .route("/quests/quests/{id}/fail", post(handlers::quests::fail_quest))
        .route("/quests/quests/{id}", get(handlers::quests::get_quest).put(handlers::quests::edit_quest))
        .route("/quests/quests", get(handlers::quests::list_quests))
        .route("/quests/check-completion", post(handlers::quests::check_completion))
        .route(
            "/quests/templates",
            get(handlers::quests::list_templates).post(handlers::quests::create_template),
        )
        .route(
            "/quests/templates/{id}",
            get(handlers::quests::get_template).put(handlers::quests::update_template).delete(handlers::quests::delete_template),
        )
        .route("/guilds", get(handlers::guilds::list_guilds).post(handlers::guilds::create_guild))
        .route("/guilds/{id}", get(handlers::guilds::get_guild).put(handlers::guilds::update_guild))
        .route("/guilds/{id}/join", post(handlers::guilds::join_guild))
        .route("/guilds/{id}/join-requests", get(handlers::guilds::list_join_requests))
        .route("/guilds/{id}/join-requests/{userId}/approve", post(handlers::guilds::approve_join_request))
        .route("/guilds/{id}/join-requests/{userId}/reject", post(handlers::guilds::reject_join_request))
        .route("/guilds/{id}/members/{userId}", delete(handlers::guilds::remove_member))
        .route("/guilds/{id}/members/{userId}/blocked", put(handlers::guilds::set_member_blocked))
        .route("/guilds/{id}/members/{userId}/moderator", put(handlers::guilds::set_moderator))
        .route("/guilds/{id}/owner/{userId}", put(handlers::guilds::transfer_ownership))
        .route("/guilds/{id}/comments", post(handlers::guilds::create_comment).get(handlers::guilds::list_comments))
        .route("/guilds/{id}/comments/{commentId}", delete(handlers::guilds::delete_comment))
        .route("/guilds/{id}/comments/enabled", put(handlers::guilds::toggle_comments))
        .route("/guilds/{id}/comments/{commentId}/reactions", post(handlers::guilds::toggle_reaction))
        .route("/guilds/{id}/avatar", post(handlers::guilds::presign_avatar_upload).put(handlers::guilds::confirm_avatar_upload))
        .route("/rooms/{roomId}/messages", get(handlers::messaging::list_messages))
        .route("/subscriptions/{userId}/tier", get(handlers::subscription::get_tier))
        .layer(axum::middleware::from_fn_with_state(state.clone(), edge::sensitive_throttle))
        .layer(axum::middleware::from_fn_with_state(state.clone(), edge::usage_plan))
        .layer(axum::middleware::from_fn_with_state(state.clone(), JwtAuth::middleware));

    let bearer_and_api_key_router = Router::new()
        .route("/quests/analytics", get(handlers::quests::analytics))
        .layer(axum::middleware::from_fn_with_state(state.clone(), edge::sensitive_throttle))
        .layer(axum::middleware::from_fn_with_state(state.clone(), edge::usage_plan))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_api_key))
        .layer(axum::middleware::from_fn_with_state(state.clone(), JwtAuth::middleware));

    let unauthenticated_router = Router::new()
        .route("/subscriptions/webhook", post(handlers::subscription::webhook))
        .route("/ws/rooms/{roomId}", get(handlers::messaging::room_upgrade));

    Router::new()
        .merge(api_key_router)
        .merge(bearer_router)
        .merge(bearer_and_api_key_router)
        .merge(unauthenticated_router)
        .layer(axum::middleware::from_fn_with_state(state.clone(), edge::ip_throttle))
        .with_state(state)
}
