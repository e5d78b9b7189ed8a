//! Structured audit trail.
//!
//! Every audit event is also a structured tracing event (see
//! [`logger::AuditLogger`]), so it flows through the same log pipeline
//! as everything else instead of a bespoke export path.

pub mod event;
pub mod logger;

pub use event::{AuditEvent, AuditEventKind, AuditSeverity, AuditSource};
pub use logger::AuditLogger;
