use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::audit::{AuditAction, AuditEntry, AuditLog};
use super::period::PeriodKey;
use crate::core::KontorError;

/// An active lock on an accounting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodLock {
    pub key: PeriodKey,
    pub locked_at: NaiveDateTime,
    pub locked_by: String,
    /// Optional on lock; the unlock reason lives in the audit trail.
    pub reason: Option<String>,
}

/// A single changed field of a financial record, fed to the mutation gate.
#[derive(Debug, Clone)]
pub struct FieldChange {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

/// Effective lock status of a year, reported per month, per quarter and
/// for the year itself. "Effective" means a month counts as locked when
/// its own lock, its quarter's lock, or the year lock is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearLockStatus {
    pub year: i32,
    pub year_locked: bool,
    pub quarters: [bool; 4],
    pub months: [bool; 12],
}

/// Owns the period-lock set and the audit log. Holding both behind one
/// `&mut` borrow makes "check lock, then write, then audit" a single
/// critical section — a lock cannot be acquired concurrently with an
/// in-flight write to the same period.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LockLedger {
    locks: HashMap<PeriodKey, PeriodLock>,
    audit: AuditLog,
}

impl LockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The audit trail, for queries and persistence mirroring.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Currently active locks, in no particular order.
    pub fn locks(&self) -> impl Iterator<Item = &PeriodLock> {
        self.locks.values()
    }

    /// Lock a period. Idempotent: locking an already-locked period is a
    /// no-op and appends no second audit entry. Periods beyond the month
    /// containing `now` cannot be locked.
    pub fn lock(
        &mut self,
        key: PeriodKey,
        reason: Option<&str>,
        user: &str,
        now: NaiveDateTime,
    ) -> Result<&PeriodLock, KontorError> {
        if key.is_future(now.date()) {
            return Err(KontorError::Validation(format!(
                "cannot lock future period {key}"
            )));
        }

        match self.locks.entry(key) {
            std::collections::hash_map::Entry::Occupied(existing) => Ok(existing.into_mut()),
            std::collections::hash_map::Entry::Vacant(slot) => {
                self.audit.append(AuditEntry {
                    entity_type: "period_lock".into(),
                    entity_id: key.to_string(),
                    action: AuditAction::Lock,
                    field_name: String::new(),
                    old_value: String::new(),
                    new_value: reason.unwrap_or_default().to_string(),
                    user_id: user.to_string(),
                    timestamp: now,
                });
                Ok(slot.insert(PeriodLock {
                    key,
                    locked_at: now,
                    locked_by: user.to_string(),
                    reason: reason.map(str::to_string),
                }))
            }
        }
    }

    /// Unlock a period. The reason is mandatory — GoBD requires a
    /// documented justification for reopening a closed period — and is
    /// captured in the audit entry's `new_value`.
    pub fn unlock(
        &mut self,
        key: PeriodKey,
        reason: &str,
        user: &str,
        now: NaiveDateTime,
    ) -> Result<(), KontorError> {
        if reason.trim().is_empty() {
            return Err(KontorError::Validation(
                "unlock requires a non-empty reason".into(),
            ));
        }
        if self.locks.remove(&key).is_none() {
            return Err(KontorError::Validation(format!(
                "period {key} is not locked"
            )));
        }

        self.audit.append(AuditEntry {
            entity_type: "period_lock".into(),
            entity_id: key.to_string(),
            action: AuditAction::Unlock,
            field_name: String::new(),
            old_value: "locked".into(),
            new_value: reason.to_string(),
            user_id: user.to_string(),
            timestamp: now,
        });
        Ok(())
    }

    /// The lock blocking a date, if any — the containing month, quarter
    /// and year are checked most-specific first.
    pub fn blocking_lock(&self, date: NaiveDate) -> Option<&PeriodLock> {
        PeriodKey::containing(date)
            .iter()
            .find_map(|key| self.locks.get(key))
    }

    /// True if the date's month, quarter, or year carries an active lock.
    pub fn is_locked(&self, date: NaiveDate) -> bool {
        self.blocking_lock(date).is_some()
    }

    /// The mutation gate: every write to a financial record calls this
    /// with the record's date before touching anything.
    pub fn guard_mutation(&self, date: NaiveDate) -> Result<(), KontorError> {
        match self.blocking_lock(date) {
            Some(lock) => Err(KontorError::PeriodLocked {
                period: lock.key.to_string(),
                date,
            }),
            None => Ok(()),
        }
    }

    /// Record a successful mutation of a financial record: guards the
    /// record's date, then appends one audit entry per changed field —
    /// or a single summary entry for create/delete (empty `changes`).
    ///
    /// If the period is locked, nothing is appended and the caller must
    /// abandon the write.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        action: AuditAction,
        record_date: NaiveDate,
        changes: &[FieldChange],
        user: &str,
        now: NaiveDateTime,
    ) -> Result<usize, KontorError> {
        self.guard_mutation(record_date)?;

        if changes.is_empty() {
            self.audit.append(AuditEntry {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                action,
                field_name: String::new(),
                old_value: String::new(),
                new_value: String::new(),
                user_id: user.to_string(),
                timestamp: now,
            });
            return Ok(1);
        }

        for change in changes {
            self.audit.append(AuditEntry {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                action,
                field_name: change.field.clone(),
                old_value: change.old_value.clone(),
                new_value: change.new_value.clone(),
                user_id: user.to_string(),
                timestamp: now,
            });
        }
        Ok(changes.len())
    }

    /// Lock status query surface: effective status of every month,
    /// quarter and the year itself.
    pub fn year_status(&self, year: i32) -> YearLockStatus {
        let year_locked = self.locks.contains_key(&PeriodKey::Year { year });

        let mut quarters = [false; 4];
        for (i, q) in quarters.iter_mut().enumerate() {
            *q = year_locked
                || self.locks.contains_key(&PeriodKey::Quarter {
                    year,
                    quarter: i as u32 + 1,
                });
        }

        let mut months = [false; 12];
        for (i, m) in months.iter_mut().enumerate() {
            let month = i as u32 + 1;
            *m = quarters[i / 3]
                || self.locks.contains_key(&PeriodKey::Month { year, month });
        }

        YearLockStatus {
            year,
            year_locked,
            quarters,
            months,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gobd::AuditFilter;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> NaiveDateTime {
        date(2024, 12, 1).and_hms_opt(10, 0, 0).unwrap()
    }

    #[test]
    fn quarter_lock_blocks_contained_months() {
        let mut ledger = LockLedger::new();
        ledger
            .lock(PeriodKey::quarter(2024, 2).unwrap(), None, "u1", now())
            .unwrap();

        assert!(ledger.is_locked(date(2024, 4, 15)));
        assert!(ledger.is_locked(date(2024, 5, 20)));
        assert!(ledger.is_locked(date(2024, 6, 30)));
        assert!(!ledger.is_locked(date(2024, 3, 15)));
    }

    #[test]
    fn lock_is_idempotent() {
        let mut ledger = LockLedger::new();
        let key = PeriodKey::month(2024, 3).unwrap();
        ledger.lock(key, Some("Abschluss März"), "u1", now()).unwrap();
        ledger.lock(key, None, "u2", now()).unwrap();

        assert_eq!(ledger.audit().len(), 1);
        // The original lock metadata is kept.
        assert_eq!(ledger.locks().next().unwrap().locked_by, "u1");
    }

    #[test]
    fn future_period_cannot_be_locked() {
        let mut ledger = LockLedger::new();
        let err = ledger
            .lock(PeriodKey::month(2025, 1).unwrap(), None, "u1", now())
            .unwrap_err();
        assert!(matches!(err, KontorError::Validation(_)));
    }

    #[test]
    fn unlock_requires_reason() {
        let mut ledger = LockLedger::new();
        let key = PeriodKey::month(2024, 3).unwrap();
        ledger.lock(key, None, "u1", now()).unwrap();

        assert!(ledger.unlock(key, "  ", "u1", now()).is_err());
        assert!(ledger.is_locked(date(2024, 3, 10)));

        ledger
            .unlock(key, "Nachbuchung Beleg 47", "u1", now())
            .unwrap();
        assert!(!ledger.is_locked(date(2024, 3, 10)));

        let unlocks = ledger.audit().query(&AuditFilter {
            action: Some(AuditAction::Unlock),
            ..Default::default()
        });
        assert_eq!(unlocks.len(), 1);
        assert_eq!(unlocks[0].new_value, "Nachbuchung Beleg 47");
    }

    #[test]
    fn unlock_of_open_period_rejected() {
        let mut ledger = LockLedger::new();
        assert!(
            ledger
                .unlock(PeriodKey::year(2023), "why not", "u1", now())
                .is_err()
        );
    }

    #[test]
    fn mutation_gate_blocks_and_appends_nothing() {
        let mut ledger = LockLedger::new();
        ledger
            .lock(PeriodKey::month(2024, 3).unwrap(), None, "u1", now())
            .unwrap();
        let before = ledger.audit().len();

        let err = ledger
            .record_change(
                "expense",
                "e1",
                AuditAction::Update,
                date(2024, 3, 5),
                &[FieldChange {
                    field: "net".into(),
                    old_value: "100".into(),
                    new_value: "120".into(),
                }],
                "u1",
                now(),
            )
            .unwrap_err();

        assert!(matches!(err, KontorError::PeriodLocked { .. }));
        assert_eq!(ledger.audit().len(), before);
    }

    #[test]
    fn update_appends_one_entry_per_field() {
        let mut ledger = LockLedger::new();
        let n = ledger
            .record_change(
                "expense",
                "e1",
                AuditAction::Update,
                date(2024, 7, 1),
                &[
                    FieldChange {
                        field: "net".into(),
                        old_value: "100".into(),
                        new_value: "120".into(),
                    },
                    FieldChange {
                        field: "description".into(),
                        old_value: "Alt".into(),
                        new_value: "Neu".into(),
                    },
                ],
                "u1",
                now(),
            )
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(ledger.audit().len(), 2);
        assert_eq!(ledger.audit().entries()[0].field_name, "net");
    }

    #[test]
    fn create_appends_summary_entry() {
        let mut ledger = LockLedger::new();
        ledger
            .record_change(
                "income",
                "i1",
                AuditAction::Create,
                date(2024, 7, 1),
                &[],
                "u1",
                now(),
            )
            .unwrap();
        assert_eq!(ledger.audit().len(), 1);
        assert_eq!(ledger.audit().entries()[0].action, AuditAction::Create);
    }

    #[test]
    fn year_status_reflects_effective_locks() {
        let mut ledger = LockLedger::new();
        ledger
            .lock(PeriodKey::quarter(2024, 1).unwrap(), None, "u1", now())
            .unwrap();
        ledger
            .lock(PeriodKey::month(2024, 7).unwrap(), None, "u1", now())
            .unwrap();

        let status = ledger.year_status(2024);
        assert!(!status.year_locked);
        assert_eq!(status.quarters, [true, false, false, false]);
        assert!(status.months[0] && status.months[1] && status.months[2]);
        assert!(!status.months[3]);
        assert!(status.months[6]);
    }

    #[test]
    fn relock_after_unlock() {
        let mut ledger = LockLedger::new();
        let key = PeriodKey::month(2024, 3).unwrap();
        ledger.lock(key, None, "u1", now()).unwrap();
        ledger.unlock(key, "Korrektur", "u1", now()).unwrap();
        ledger.lock(key, None, "u1", now()).unwrap();

        assert!(ledger.is_locked(date(2024, 3, 1)));
        // lock, unlock, lock — three audit entries, none rewritten.
        assert_eq!(ledger.audit().len(), 3);
    }
}
