use crate::adapters::audit::json_audit_logger::JsonAuditLogger;
use crate::cli::{context, output};
use crate::core::models::audit_entry::{AuditAction, AuditEntry};
use crate::core::traits::audit::AuditLogger;

/// Record an operation in the audit log. Best-effort: a failing audit
/// write warns but never fails the operation that succeeded.
pub fn log_audit(action: AuditAction, image: &str, new_name: Option<String>, detail: Option<String>) {
    let section = context::audit_section();
    if !JsonAuditLogger::is_enabled(section.as_ref()) {
        return;
    }

    let logger = JsonAuditLogger::from_config(&context::store_dir(), section.as_ref());
    let entry = AuditEntry {
        timestamp: chrono::Utc::now(),
        action,
        image: image.to_string(),
        new_name,
        detail,
    };

    if let Err(e) = logger.log_event(&entry) {
        output::warning(&format!("Could not write audit log: {e}"));
    }
}
