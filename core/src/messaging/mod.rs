//! Real-time guild chat: WebSocket connect/frame/disconnect, backed by the
//! same single-table store as everything else.

pub mod registry;
pub mod service;

pub use registry::ConnectionRegistry;
pub use service::MessagingService;
