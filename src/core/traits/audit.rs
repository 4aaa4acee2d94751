use crate::core::errors::Result;
use crate::core::models::audit_entry::AuditEntry;

/// Port for recording audit events.
pub trait AuditLogger: Send + Sync {
    /// Append an entry to the audit log.
    fn log_event(&self, entry: &AuditEntry) -> Result<()>;
}
