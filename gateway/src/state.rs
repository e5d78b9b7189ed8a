//! Gateway-local state: the core `AppState` plus every domain service and
//! edge-layer component the HTTP handlers dispatch to.

use std::sync::Arc;
use std::time::Duration;

use waymark_core::collaboration::CollaborationService;
use waymark_core::edge::{IpThrottle, ResponseCache, SensitiveMethodThrottle, UsagePlanThrottle};
use waymark_core::gamification::GamificationService;
use waymark_core::goals::GoalsService;
use waymark_core::guilds::{AvatarStore, GuildsService};
use waymark_core::identity::IdentityService;
use waymark_core::messaging::{ConnectionRegistry, MessagingService};
use waymark_core::quests::{QuestsService, TemplatesService};
use waymark_core::state::AppState;
use waymark_core::subscription::SubscriptionService;

#[derive(Clone)]
pub struct GatewayState {
    pub app: AppState,
    pub identity: IdentityService,
    pub goals: GoalsService,
    pub quests: QuestsService,
    pub templates: TemplatesService,
    pub guilds: GuildsService,
    pub collaboration: CollaborationService,
    pub messaging: MessagingService,
    pub subscription: SubscriptionService,
    pub ip_throttle: IpThrottle,
    pub usage_plan: UsagePlanThrottle,
    pub sensitive_throttle: SensitiveMethodThrottle,
    pub cache: ResponseCache,
}

impl GatewayState {
    pub async fn build(app: AppState) -> waymark_core::error::Result<Self> {
        let config = app.config();
        let store = app.store().clone();
        let redis = app.redis().clone();

        let gamification = GamificationService::new(store.clone());
        let identity = IdentityService::new(config, store.clone(), redis.clone())?;
        let goals = GoalsService::new(store.clone(), gamification.clone());
        let quests = QuestsService::new(store.clone(), gamification.clone());
        let templates = TemplatesService::new(store.clone());

        let avatars = AvatarStore::new(config.avatar_bucket.clone(), config.avatar_max_size_mb, config.avatar_allowed_types.clone()).await;
        let guilds = GuildsService::new(store.clone(), avatars);

        let collaboration = CollaborationService::new(store.clone(), redis.clone());
        let messaging = MessagingService::new(store.clone(), redis.clone(), Arc::new(ConnectionRegistry::new()));
        let subscription = SubscriptionService::new(store.clone(), config.subscription_webhook_secret.clone());

        let ip_throttle = IpThrottle::new(waymark_core::edge::ip_throttle::DEFAULT_REQUESTS_PER_WINDOW, Duration::from_secs(300));
        let usage_plan = UsagePlanThrottle::new(redis.clone());
        let sensitive_throttle = SensitiveMethodThrottle::new(redis.clone(), 20);
        let cache = ResponseCache::new(redis.clone());

        Ok(Self {
            app,
            identity,
            goals,
            quests,
            templates,
            guilds,
            collaboration,
            messaging,
            subscription,
            ip_throttle,
            usage_plan,
            sensitive_throttle,
            cache,
        })
    }
}

impl axum::extract::FromRef<GatewayState> for AppState {
    fn from_ref(state: &GatewayState) -> Self {
        state.app.clone()
    }
}

impl axum::extract::FromRef<GatewayState> for waymark_core::middleware::JwtAuth {
    fn from_ref(state: &GatewayState) -> Self {
        state.app.jwt_auth().clone()
    }
}
