#![cfg(feature = "datev")]

use chrono::NaiveDate;
use kontor::core::{BookingKind, BookingRecord, VatRate};
use kontor::datev::{
    ChartOfAccounts, DATEV_HEADERS, SollHaben, export_filename, generate_csv, generate_xml,
    map_bookings,
};
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn march_bookings() -> Vec<BookingRecord> {
    vec![
        BookingRecord::new(
            "i-1",
            BookingKind::Income,
            date(2024, 3, 5),
            "Beratung Projekt Alpha",
            dec!(4600),
            VatRate::Standard19,
            "RE-2024-010",
        )
        .unwrap(),
        BookingRecord::new(
            "e-1",
            BookingKind::Expense,
            date(2024, 3, 12),
            "Webhosting März",
            dec!(20),
            VatRate::Standard19,
            "B-2024-031",
        )
        .unwrap(),
        BookingRecord::new(
            "e-2",
            BookingKind::Expense,
            date(2024, 3, 20),
            "Fachbuch Steuerrecht",
            dec!(39.90),
            VatRate::Reduced7,
            "B-2024-032",
        )
        .unwrap(),
    ]
}

#[test]
fn skr03_mapping_accounts_and_bu_keys() {
    let rows = map_bookings(&march_bookings(), ChartOfAccounts::Skr03);

    // Einnahme: Erlöskonto im Haben, brutto, kein BU-Schlüssel.
    assert_eq!(rows[0].account, 8400);
    assert_eq!(rows[0].contra_account, 1200);
    assert_eq!(rows[0].debit_credit, SollHaben::Haben);
    assert_eq!(rows[0].amount, dec!(5474.00));
    assert_eq!(rows[0].bu_key, None);

    // Ausgaben: Aufwandskonto im Soll mit Vorsteuer-Schlüssel.
    assert_eq!(rows[1].account, 4900);
    assert_eq!(rows[1].debit_credit, SollHaben::Soll);
    assert_eq!(rows[1].bu_key, Some(9));
    assert_eq!(rows[2].bu_key, Some(8));
    assert_eq!(rows[2].amount, dec!(42.69));
}

#[test]
fn skr04_uses_its_own_account_ranges() {
    let rows = map_bookings(&march_bookings(), ChartOfAccounts::Skr04);
    assert_eq!(rows[0].account, 4400);
    assert_eq!(rows[0].contra_account, 1800);
    assert_eq!(rows[1].account, 6800);
}

#[test]
fn csv_is_header_plus_rows_with_21_columns() {
    let rows = map_bookings(&march_bookings(), ChartOfAccounts::Skr03);
    let export = generate_csv(&rows);

    let lines: Vec<&str> = export.content.split('\n').collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], DATEV_HEADERS.join(";"));
    for line in &lines[1..] {
        assert_eq!(line.split(';').count(), 21);
    }
    // German decimal comma, gross amount, DDMM date.
    assert!(lines[1].starts_with("5474,00;H;EUR;;;8400;1200;;0503;RE-2024-010"));
    assert!(export.errors.is_empty());
    assert_eq!(export.included, 3);
}

#[test]
fn latin1_export_keeps_umlauts_and_drops_euro_sign() {
    let mut booking = march_bookings().remove(1);
    booking.description = "Gebühren € Ausland".into();
    let rows = map_bookings(&[booking], ChartOfAccounts::Skr03);
    let bytes = generate_csv(&rows).to_latin1();

    let text: String = bytes.iter().map(|&b| b as char).collect();
    assert!(text.contains("Gebühren ? Ausland"));
}

#[cfg(feature = "afa")]
#[test]
fn depreciation_rows_book_on_the_afa_account() {
    use kontor::afa::{Asset, AssetCategory, compute_schedule};
    use kontor::datev::map_depreciation;

    let asset = Asset::linear(
        "A-1",
        "ThinkPad X1",
        AssetCategory::Computer,
        date(2024, 4, 10),
        dec!(2400),
    );
    let schedule = compute_schedule(&asset).unwrap();
    let row = map_depreciation(&asset, &schedule[0], ChartOfAccounts::Skr03);

    assert_eq!(row.account, 4830);
    assert_eq!(row.debit_credit, SollHaben::Soll);
    assert_eq!(row.amount, dec!(600.00));
    assert_eq!(row.date, date(2024, 12, 31));
    assert!(row.posting_text.starts_with("AfA 2024"));
}

#[cfg(feature = "afa")]
#[test]
fn gwg_write_off_books_on_the_gwg_account() {
    use kontor::afa::{Asset, AssetCategory, compute_schedule};
    use kontor::datev::map_depreciation;

    let asset = Asset::immediate(
        "G-1",
        "Monitor",
        AssetCategory::Computer,
        date(2024, 7, 15),
        dec!(349),
    );
    let schedule = compute_schedule(&asset).unwrap();
    let row = map_depreciation(&asset, &schedule[0], ChartOfAccounts::Skr04);
    assert_eq!(row.account, 6260);
}

#[test]
fn xml_export_wraps_the_same_records() {
    let rows = map_bookings(&march_bookings(), ChartOfAccounts::Skr03);
    let xml = generate_xml(
        &rows,
        ChartOfAccounts::Skr03,
        date(2024, 3, 1),
        date(2024, 3, 31),
    )
    .unwrap();

    assert!(xml.contains("<LedgerImport"));
    assert!(xml.contains("<chartOfAccounts>SKR03</chartOfAccounts>"));
    assert!(xml.contains("<dateStart>2024-03-01</dateStart>"));
    assert_eq!(xml.matches("<LedgerRecord>").count(), 3);
    assert!(xml.contains("<amount>5474,00</amount>"));
}

#[test]
fn filenames_follow_the_export_convention() {
    assert_eq!(
        export_filename(ChartOfAccounts::Skr04, date(2024, 1, 1), date(2024, 12, 31), "xml"),
        "DATEV_SKR04_20240101_20241231.xml"
    );
}
