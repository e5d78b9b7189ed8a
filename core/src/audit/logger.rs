//! Audit logger — emits every audit event as a structured tracing event.
//!
//! There is no separate audit sink: each event is logged at the tracing
//! level matching its [`AuditSeverity`], with `audit.kind`/`audit.source.*`
//! fields so log shippers can filter on them without a bespoke format.

use super::event::{AuditEvent, AuditEventKind, AuditSeverity, AuditSource};

#[derive(Clone)]
pub struct AuditLogger {
    service_name: String,
}

impl AuditLogger {
    pub fn new(service_name: String) -> Self {
        Self { service_name }
    }

    pub fn log(&self, event: AuditEvent) {
        let kind = event.kind.to_string();
        let subject = event.source.subject.as_deref().unwrap_or("");
        let ip = event.source.ip.as_deref().unwrap_or("");
        let request_id = event.source.request_id.as_deref().unwrap_or("");

        match event.severity {
            AuditSeverity::Emergency | AuditSeverity::Alert | AuditSeverity::Critical | AuditSeverity::Error => {
                tracing::error!(audit = true, kind, subject, ip, request_id, service = %event.service_name, "{kind}");
            }
            AuditSeverity::Warning => {
                tracing::warn!(audit = true, kind, subject, ip, request_id, service = %event.service_name, "{kind}");
            }
            AuditSeverity::Notice | AuditSeverity::Informational => {
                tracing::info!(audit = true, kind, subject, ip, request_id, service = %event.service_name, "{kind}");
            }
            AuditSeverity::Debug => {
                tracing::debug!(audit = true, kind, subject, ip, request_id, service = %event.service_name, "{kind}");
            }
        }
    }

    pub fn log_auth(&self, kind: AuditEventKind, severity: AuditSeverity, source: AuditSource) {
        let event = AuditEvent::new(kind, severity, self.service_name.clone()).with_source(source);
        self.log(event);
    }

    pub fn log_custom(&self, name: &str, severity: AuditSeverity, metadata: Option<serde_json::Value>) {
        let mut event = AuditEvent::new(AuditEventKind::Custom(name.to_string()), severity, self.service_name.clone());
        event.metadata = metadata;
        self.log(event);
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_without_panicking_at_each_severity() {
        let logger = AuditLogger::new("waymark-test".to_string());
        for severity in [
            AuditSeverity::Emergency,
            AuditSeverity::Warning,
            AuditSeverity::Informational,
            AuditSeverity::Debug,
        ] {
            logger.log_auth(AuditEventKind::AuthLoginSuccess, severity, AuditSource::default());
        }
    }

    #[test]
    fn custom_event_carries_metadata() {
        let logger = AuditLogger::new("waymark-test".to_string());
        logger.log_custom("quest.completed", AuditSeverity::Informational, Some(serde_json::json!({"quest_id": "q1"})));
    }
}
