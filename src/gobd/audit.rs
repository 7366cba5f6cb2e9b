use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Audited action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Lock,
    Unlock,
}

/// One immutable audit-trail entry. Entries are only ever appended —
/// GoBD tamper evidence depends on the log never being rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Kind of entity ("expense", "income", "asset", "invoice", "period_lock").
    pub entity_type: String,
    pub entity_id: String,
    pub action: AuditAction,
    /// Changed field for updates; empty for create/delete summaries.
    pub field_name: String,
    pub old_value: String,
    pub new_value: String,
    pub user_id: String,
    pub timestamp: NaiveDateTime,
}

/// Filter for audit queries. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<AuditAction>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

/// Append-only audit log. There is deliberately no update or remove
/// API; read models (entity history, lock state) fold over the entries.
/// The persistence layer mirrors appended entries to durable storage.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Appending is the only mutation the log supports.
    pub fn append(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
    }

    /// All entries, in append order.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching the filter, ordered by timestamp.
    pub fn query(&self, filter: &AuditFilter) -> Vec<&AuditEntry> {
        let mut hits: Vec<&AuditEntry> = self
            .entries
            .iter()
            .filter(|e| {
                filter
                    .entity_type
                    .as_ref()
                    .is_none_or(|t| &e.entity_type == t)
                    && filter.entity_id.as_ref().is_none_or(|i| &e.entity_id == i)
                    && filter.action.is_none_or(|a| e.action == a)
                    && filter.from.is_none_or(|f| e.timestamp >= f)
                    && filter.to.is_none_or(|t| e.timestamp <= t)
            })
            .collect();
        hits.sort_by_key(|e| e.timestamp);
        hits
    }
}
