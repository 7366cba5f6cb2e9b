//! Buchungsstapel record mapping and CSV serialization.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::accounts::ChartOfAccounts;
use crate::core::{BookingKind, BookingRecord, format_amount_de, to_latin1};

#[cfg(feature = "afa")]
use crate::afa::{AfaMethod, Asset, DepreciationEntry};

/// The 21 canonical Buchungsstapel columns, in header order.
pub const DATEV_HEADERS: [&str; 21] = [
    "Umsatz",
    "Soll/Haben-Kennzeichen",
    "WKZ Umsatz",
    "Basisumsatz",
    "WKZ Basisumsatz",
    "Konto",
    "Gegenkonto (ohne BU-Schlüssel)",
    "BU-Schlüssel",
    "Belegdatum",
    "Belegfeld 1",
    "Belegfeld 2",
    "Skonto",
    "Buchungstext",
    "Postensperre",
    "Diverse Adressnummer",
    "Geschäftspartnerbank",
    "Sachverhalt",
    "Zinssperre",
    "Beleglink",
    "Beleginfo - Art 1",
    "Beleginfo - Inhalt 1",
];

/// Soll/Haben-Kennzeichen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SollHaben {
    /// S — debit (expenses).
    Soll,
    /// H — credit (income).
    Haben,
}

impl SollHaben {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Soll => "S",
            Self::Haben => "H",
        }
    }
}

/// One Buchungsstapel row. Derived deterministically from a booking (or
/// depreciation entry) plus the active chart of accounts — never
/// hand-edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatevRecord {
    /// Gross amount (Umsatz), always positive.
    pub amount: Decimal,
    pub debit_credit: SollHaben,
    /// Currency code (WKZ), normally "EUR".
    pub currency: String,
    /// Konto.
    pub account: u32,
    /// Gegenkonto (ohne BU-Schlüssel).
    pub contra_account: u32,
    /// BU-Schlüssel; `None` for Automatikkonten and 0% bookings.
    pub bu_key: Option<u8>,
    /// Belegdatum.
    pub date: NaiveDate,
    /// Belegfeld 1 — document reference.
    pub document_ref: String,
    /// Buchungstext, max 60 chars.
    pub posting_text: String,
    /// Beleginfo - Art 1 / Inhalt 1 pair.
    pub info_type: Option<String>,
    pub info_content: Option<String>,
}

/// Result of a CSV export: the serialized content plus per-record
/// errors and warnings. Invalid records are skipped, not fatal.
#[derive(Debug, Clone)]
pub struct DatevExport {
    /// CSV text: header line plus one line per included record, joined
    /// with `\n`, no trailing newline.
    pub content: String,
    /// Number of records serialized.
    pub included: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl DatevExport {
    /// The on-disk byte representation: ISO-8859-1, characters outside
    /// Latin-1 replaced with `?`.
    pub fn to_latin1(&self) -> Vec<u8> {
        to_latin1(&self.content)
    }
}

/// Map booking records onto Buchungsstapel rows: income books gross on
/// the revenue account (H against bank), expenses on the expense account
/// (S against bank) with the input-VAT BU key.
pub fn map_bookings(bookings: &[BookingRecord], chart: ChartOfAccounts) -> Vec<DatevRecord> {
    bookings
        .iter()
        .map(|b| {
            let is_expense = b.kind == BookingKind::Expense;
            let (account, debit_credit) = match b.kind {
                BookingKind::Income => (chart.income_account(b.vat_rate), SollHaben::Haben),
                BookingKind::Expense => (chart.expense_account(), SollHaben::Soll),
            };
            DatevRecord {
                amount: b.gross,
                debit_credit,
                currency: "EUR".into(),
                account,
                contra_account: chart.bank_account(),
                bu_key: chart.bu_key(b.vat_rate, is_expense),
                date: b.date,
                document_ref: truncate(&b.document_number, 36),
                posting_text: truncate(&b.description, 60),
                info_type: b.euer_line.map(|_| "EÜR-Zeile".to_string()),
                info_content: b.euer_line.map(|l| l.to_string()),
            }
        })
        .collect()
}

/// Map one year's depreciation of an asset onto a Buchungsstapel row:
/// AfA amount debited on the depreciation account against the asset's
/// clearing account (here: bank contra, as the upstream EÜR model books).
#[cfg(feature = "afa")]
pub fn map_depreciation(
    asset: &Asset,
    entry: &DepreciationEntry,
    chart: ChartOfAccounts,
) -> DatevRecord {
    let account = match asset.method {
        AfaMethod::Immediate => chart.gwg_account(),
        AfaMethod::Linear => chart.depreciation_account(),
    };
    DatevRecord {
        amount: entry.amount,
        debit_credit: SollHaben::Soll,
        currency: "EUR".into(),
        account,
        contra_account: chart.bank_account(),
        bu_key: None,
        date: NaiveDate::from_ymd_opt(entry.year, 12, 31).unwrap_or(asset.purchase_date),
        document_ref: truncate(&asset.id, 36),
        posting_text: truncate(&format!("AfA {} {}", entry.year, asset.name), 60),
        info_type: None,
        info_content: None,
    }
}

/// Serialize records as Buchungsstapel CSV.
///
/// Records failing validation (missing account/contra account, non-positive
/// amount) are skipped and reported in `errors`; an empty input produces a
/// warning, not an error.
pub fn generate_csv(records: &[DatevRecord]) -> DatevExport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut lines = Vec::with_capacity(records.len() + 1);

    lines.push(DATEV_HEADERS.join(";"));

    if records.is_empty() {
        warnings.push("no records to export".to_string());
    }

    let mut included = 0;
    for (i, record) in records.iter().enumerate() {
        match validate_record(record) {
            Ok(()) => {
                lines.push(record_to_line(record));
                included += 1;
            }
            Err(msg) => errors.push(format!("record {}: {msg}", i + 1)),
        }
    }

    DatevExport {
        content: lines.join("\n"),
        included,
        errors,
        warnings,
    }
}

/// Export filename convention: `DATEV_<chart>_<start>_<end>.<ext>`.
pub fn export_filename(
    chart: ChartOfAccounts,
    start: NaiveDate,
    end: NaiveDate,
    extension: &str,
) -> String {
    format!(
        "DATEV_{}_{}_{}.{extension}",
        chart.code(),
        start.format("%Y%m%d"),
        end.format("%Y%m%d"),
    )
}

fn validate_record(record: &DatevRecord) -> Result<(), String> {
    if record.account == 0 {
        return Err("missing account".into());
    }
    if record.contra_account == 0 {
        return Err("missing contra account".into());
    }
    if record.amount <= Decimal::ZERO {
        return Err(format!("amount must be positive, got {}", record.amount));
    }
    Ok(())
}

fn record_to_line(record: &DatevRecord) -> String {
    let fields: [String; 21] = [
        format_amount_de(record.amount),
        record.debit_credit.code().to_string(),
        record.currency.clone(),
        String::new(), // Basisumsatz
        String::new(), // WKZ Basisumsatz
        record.account.to_string(),
        record.contra_account.to_string(),
        record.bu_key.map(|k| k.to_string()).unwrap_or_default(),
        record.date.format("%d%m").to_string(),
        record.document_ref.clone(),
        String::new(), // Belegfeld 2
        String::new(), // Skonto
        record.posting_text.clone(),
        String::new(), // Postensperre
        String::new(), // Diverse Adressnummer
        String::new(), // Geschäftspartnerbank
        String::new(), // Sachverhalt
        String::new(), // Zinssperre
        String::new(), // Beleglink
        record.info_type.clone().unwrap_or_default(),
        record.info_content.clone().unwrap_or_default(),
    ];

    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(";")
}

/// Quote a field when it contains the delimiter, a quote, or a newline;
/// inner quotes are doubled.
fn escape_field(field: &str) -> String {
    if field.contains(';') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VatRate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_record() -> DatevRecord {
        DatevRecord {
            amount: dec!(146.91),
            debit_credit: SollHaben::Haben,
            currency: "EUR".into(),
            account: 8400,
            contra_account: 1200,
            bu_key: None,
            date: date(2024, 3, 5),
            document_ref: "RE-2024-001".into(),
            posting_text: "Beratung".into(),
            info_type: None,
            info_content: None,
        }
    }

    #[test]
    fn header_plus_one_row() {
        let export = generate_csv(&[sample_record()]);
        let lines: Vec<&str> = export.content.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Umsatz;Soll/Haben-Kennzeichen;"));
        assert!(lines[0].ends_with("Beleginfo - Inhalt 1"));
        assert_eq!(lines[0].split(';').count(), 21);
        assert!(lines[1].starts_with("146,91;H;EUR;"));
        assert!(export.errors.is_empty());
    }

    #[test]
    fn field_with_delimiter_is_quoted() {
        let mut r = sample_record();
        r.posting_text = "Hosting; Domain".into();
        let export = generate_csv(&[r]);
        assert!(export.content.contains("\"Hosting; Domain\""));
    }

    #[test]
    fn inner_quotes_doubled() {
        assert_eq!(escape_field(r#"Projekt "Alpha""#), r#""Projekt ""Alpha""""#);
        assert_eq!(escape_field("plain"), "plain");
    }

    #[test]
    fn invalid_record_collected_not_fatal() {
        let mut bad = sample_record();
        bad.account = 0;
        let export = generate_csv(&[sample_record(), bad]);
        assert_eq!(export.included, 1);
        assert_eq!(export.errors.len(), 1);
        assert!(export.errors[0].contains("record 2"));
    }

    #[test]
    fn empty_export_warns() {
        let export = generate_csv(&[]);
        assert!(export.errors.is_empty());
        assert_eq!(export.warnings.len(), 1);
        assert_eq!(export.content.split('\n').count(), 1);
    }

    #[test]
    fn mapping_income_and_expense() {
        let income = BookingRecord::new(
            "i1",
            BookingKind::Income,
            date(2024, 3, 5),
            "Beratung",
            dec!(123.45),
            VatRate::Standard19,
            "RE-2024-001",
        )
        .unwrap();
        let expense = BookingRecord::new(
            "e1",
            BookingKind::Expense,
            date(2024, 3, 8),
            "Hosting",
            dec!(20),
            VatRate::Standard19,
            "B-77",
        )
        .unwrap();

        let rows = map_bookings(&[income, expense], ChartOfAccounts::Skr03);
        assert_eq!(rows[0].account, 8400);
        assert_eq!(rows[0].debit_credit, SollHaben::Haben);
        assert_eq!(rows[0].bu_key, None);
        assert_eq!(rows[1].account, 4900);
        assert_eq!(rows[1].debit_credit, SollHaben::Soll);
        assert_eq!(rows[1].bu_key, Some(9));
        assert_eq!(rows[1].amount, dec!(23.80));
    }

    #[test]
    fn filename_convention() {
        assert_eq!(
            export_filename(
                ChartOfAccounts::Skr03,
                date(2024, 1, 1),
                date(2024, 3, 31),
                "csv"
            ),
            "DATEV_SKR03_20240101_20240331.csv"
        );
    }

    #[test]
    fn latin1_bytes_replace_euro() {
        let mut r = sample_record();
        r.posting_text = "Gebühr €".into();
        let export = generate_csv(&[r]);
        let bytes = export.to_latin1();
        assert!(bytes.windows(2).any(|w| w == [b' ', b'?']));
        assert!(bytes.contains(&0xFC)); // ü survives
    }
}
