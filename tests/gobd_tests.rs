#![cfg(feature = "gobd")]

use chrono::{NaiveDate, NaiveDateTime};
use kontor::KontorError;
use kontor::gobd::{
    AuditAction, AuditFilter, FieldChange, LockLedger, PeriodKey,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn now() -> NaiveDateTime {
    date(2024, 12, 15).and_hms_opt(9, 30, 0).unwrap()
}

#[test]
fn period_keys_render_canonically() {
    assert_eq!(PeriodKey::month(2024, 3).unwrap().to_string(), "2024-03");
    assert_eq!(PeriodKey::quarter(2024, 1).unwrap().to_string(), "2024-Q1");
    assert_eq!(PeriodKey::year(2024).to_string(), "2024");
}

#[test]
fn period_keys_parse_back() {
    assert_eq!(
        "2024-03".parse::<PeriodKey>().unwrap(),
        PeriodKey::month(2024, 3).unwrap()
    );
    assert_eq!(
        "2024-Q4".parse::<PeriodKey>().unwrap(),
        PeriodKey::quarter(2024, 4).unwrap()
    );
    assert_eq!("2024".parse::<PeriodKey>().unwrap(), PeriodKey::year(2024));
    assert!("2024-13".parse::<PeriodKey>().is_err());
    assert!("2024-Q5".parse::<PeriodKey>().is_err());
    assert!("März".parse::<PeriodKey>().is_err());
}

#[test]
fn month_lock_blocks_only_that_month() {
    let mut ledger = LockLedger::new();
    ledger
        .lock(PeriodKey::month(2024, 3).unwrap(), Some("Abschluss"), "anna", now())
        .unwrap();

    assert!(ledger.guard_mutation(date(2024, 3, 1)).is_err());
    assert!(ledger.guard_mutation(date(2024, 3, 31)).is_err());
    assert!(ledger.guard_mutation(date(2024, 2, 29)).is_ok());
    assert!(ledger.guard_mutation(date(2024, 4, 1)).is_ok());
}

#[test]
fn year_lock_blocks_every_date_of_the_year() {
    let mut ledger = LockLedger::new();
    ledger
        .lock(PeriodKey::year(2023), None, "anna", now())
        .unwrap();

    assert!(ledger.is_locked(date(2023, 1, 1)));
    assert!(ledger.is_locked(date(2023, 12, 31)));
    assert!(!ledger.is_locked(date(2024, 1, 1)));

    let status = ledger.year_status(2023);
    assert!(status.year_locked);
    assert_eq!(status.quarters, [true; 4]);
    assert_eq!(status.months, [true; 12]);
}

#[test]
fn blocked_write_reports_the_blocking_period() {
    let mut ledger = LockLedger::new();
    ledger
        .lock(PeriodKey::quarter(2024, 2).unwrap(), None, "anna", now())
        .unwrap();

    let err = ledger.guard_mutation(date(2024, 5, 10)).unwrap_err();
    match err {
        KontorError::PeriodLocked { period, date: d } => {
            assert_eq!(period, "2024-Q2");
            assert_eq!(d, date(2024, 5, 10));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn full_lifecycle_is_audited_in_order() {
    let mut ledger = LockLedger::new();
    let key = PeriodKey::month(2024, 6).unwrap();
    let t0 = date(2024, 7, 1).and_hms_opt(8, 0, 0).unwrap();
    let t1 = date(2024, 7, 2).and_hms_opt(8, 0, 0).unwrap();
    let t2 = date(2024, 7, 3).and_hms_opt(8, 0, 0).unwrap();

    ledger
        .record_change(
            "income",
            "i-42",
            AuditAction::Create,
            date(2024, 6, 12),
            &[],
            "anna",
            t0,
        )
        .unwrap();
    ledger.lock(key, Some("USt-VA Juni"), "anna", t1).unwrap();
    ledger.unlock(key, "Beleg nachgereicht", "anna", t2).unwrap();

    let trail = ledger.audit().entries();
    assert_eq!(trail.len(), 3);
    assert_eq!(trail[0].action, AuditAction::Create);
    assert_eq!(trail[1].action, AuditAction::Lock);
    assert_eq!(trail[2].action, AuditAction::Unlock);
    assert_eq!(trail[2].new_value, "Beleg nachgereicht");
}

#[test]
fn audit_query_filters_by_entity_and_action() {
    let mut ledger = LockLedger::new();
    ledger
        .record_change(
            "expense",
            "e-1",
            AuditAction::Update,
            date(2024, 8, 3),
            &[
                FieldChange {
                    field: "net".into(),
                    old_value: "100,00".into(),
                    new_value: "110,00".into(),
                },
                FieldChange {
                    field: "description".into(),
                    old_value: "Hosting".into(),
                    new_value: "Hosting August".into(),
                },
            ],
            "anna",
            now(),
        )
        .unwrap();
    ledger
        .record_change(
            "income",
            "i-1",
            AuditAction::Delete,
            date(2024, 8, 4),
            &[],
            "anna",
            now(),
        )
        .unwrap();

    let updates = ledger.audit().query(&AuditFilter {
        entity_type: Some("expense".into()),
        action: Some(AuditAction::Update),
        ..Default::default()
    });
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|e| e.entity_id == "e-1"));

    let deletes = ledger.audit().query(&AuditFilter {
        action: Some(AuditAction::Delete),
        ..Default::default()
    });
    assert_eq!(deletes.len(), 1);
}

#[test]
fn ledger_survives_json_persistence() {
    let mut ledger = LockLedger::new();
    ledger
        .lock(PeriodKey::quarter(2024, 2).unwrap(), Some("USt-VA Q2"), "anna", now())
        .unwrap();
    ledger
        .record_change(
            "expense",
            "e-3",
            AuditAction::Create,
            date(2024, 7, 2),
            &[],
            "anna",
            now(),
        )
        .unwrap();

    let json = serde_json::to_string(&ledger).unwrap();
    // Period keys persist in their canonical form.
    assert!(json.contains("2024-Q2"));

    let restored: LockLedger = serde_json::from_str(&json).unwrap();
    assert!(restored.is_locked(date(2024, 5, 10)));
    assert!(!restored.is_locked(date(2024, 7, 2)));
    assert_eq!(restored.audit().entries(), ledger.audit().entries());
}

#[test]
fn rejected_write_leaves_no_audit_trace() {
    let mut ledger = LockLedger::new();
    ledger
        .lock(PeriodKey::month(2024, 3).unwrap(), None, "anna", now())
        .unwrap();
    let before = ledger.audit().len();

    let result = ledger.record_change(
        "expense",
        "e-9",
        AuditAction::Update,
        date(2024, 3, 20),
        &[FieldChange {
            field: "net".into(),
            old_value: "50,00".into(),
            new_value: "55,00".into(),
        }],
        "anna",
        now(),
    );

    assert!(result.is_err());
    assert_eq!(ledger.audit().len(), before);
}
