//! Append-only audit trail of controller decisions.
//!
//! Components emit [`AuditEvent`]s through a cloneable [`AuditHandle`]; a
//! single [`AuditWriter`] task persists them to an [`AuditStore`].

mod events;
mod handle;
mod sqlite;
mod store;
mod writer;

pub use events::{AuditEvent, AuditRecord};
pub use handle::{AuditEventEnvelope, AuditHandle};
pub use sqlite::SqliteAuditStore;
pub use store::{AuditError, AuditFilter, AuditStore, DEFAULT_AUDIT_LIMIT};
pub use writer::{create_audit_system, AuditWriter};
