//! GoBD compliance: period locks and the append-only audit trail.
//!
//! Once an accounting period is locked, records dated inside it must not
//! change. [`LockLedger`] owns both the lock set and the audit log so a
//! lock check and the audit append for a write happen under a single
//! mutable borrow — the critical section the compliance model requires.

mod audit;
mod lock;
mod period;

pub use audit::{AuditAction, AuditEntry, AuditFilter, AuditLog};
pub use lock::{FieldChange, LockLedger, PeriodLock, YearLockStatus};
pub use period::{PeriodKey, PeriodType};
