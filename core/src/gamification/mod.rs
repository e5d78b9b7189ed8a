//! XP, levels, and badges, awarded idempotently for events raised by the
//! goal, quest, and guild services.

pub mod events;
pub mod service;

pub use events::GameEvent;
pub use service::GamificationService;
