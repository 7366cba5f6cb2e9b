use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::KontorError;
use super::money::{VatRate, gross_amount, round_half_up, vat_amount};

/// Normalized e-invoice model — the single canonical representation
/// consumed by both the ZUGFeRD (CII) and XRechnung (UBL) generators and
/// produced by the parser. Field references follow the EN 16931 semantic
/// model (BT-x).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EInvoiceData {
    /// BT-1: Invoice number.
    pub invoice_number: String,
    /// BT-2: Invoice issue date.
    pub issue_date: NaiveDate,
    /// BT-9: Payment due date.
    pub due_date: Option<NaiveDate>,
    /// BT-5: Currency code (ISO 4217), normally "EUR".
    pub currency: String,
    /// BT-10: Buyer reference (Leitweg-ID, required for public-sector
    /// XRechnung).
    pub leitweg_id: Option<String>,
    /// BG-4: Seller.
    pub seller: TradeParty,
    /// BG-7: Buyer.
    pub buyer: TradeParty,
    /// BG-25: Invoice lines.
    pub lines: Vec<InvoiceLine>,
    /// BT-106: Sum of line net amounts.
    pub subtotal: Decimal,
    /// BT-110: Total VAT amount.
    pub vat_total: Decimal,
    /// BT-112: Invoice total with VAT.
    pub total: Decimal,
    /// BG-23: VAT breakdown grouped by category and rate.
    pub vat_breakdown: Vec<VatBreakdown>,
    /// BG-16/BG-17: Payment instructions.
    pub payment: Option<PaymentDetails>,
    /// BT-22: Free-text notes.
    pub notes: Vec<String>,
}

impl EInvoiceData {
    /// Recompute subtotal, VAT breakdown and totals from the lines.
    /// Grouping is by (category code, rate); VAT is rounded per group.
    pub fn recalculate(&mut self) {
        let mut groups: Vec<(String, Decimal, Decimal)> = Vec::new();
        let mut subtotal = Decimal::ZERO;

        for line in &self.lines {
            subtotal += line.line_total;
            match groups
                .iter_mut()
                .find(|(cat, rate, _)| *cat == line.tax_category && *rate == line.vat_rate)
            {
                Some((_, _, basis)) => *basis += line.line_total,
                None => groups.push((line.tax_category.clone(), line.vat_rate, line.line_total)),
            }
        }

        groups.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut vat_total = Decimal::ZERO;
        self.vat_breakdown = groups
            .into_iter()
            .map(|(category, rate, basis)| {
                let tax = round_half_up(basis * rate / Decimal::from(100), 2);
                vat_total += tax;
                VatBreakdown {
                    category,
                    rate,
                    taxable_amount: basis,
                    tax_amount: tax,
                }
            })
            .collect();

        self.subtotal = round_half_up(subtotal, 2);
        self.vat_total = vat_total;
        self.total = self.subtotal + self.vat_total;
    }
}

/// BG-4 / BG-7: A trade party (seller or buyer).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeParty {
    /// BT-27 / BT-44: Name.
    pub name: String,
    /// BG-5 / BG-8: Postal address.
    pub address: PostalAddress,
    /// BT-31 / BT-48: VAT identifier (e.g. "DE123456789").
    pub vat_id: Option<String>,
    /// BT-32: Tax registration number (Steuernummer).
    pub tax_number: Option<String>,
    /// BT-43 / BT-58: Contact email.
    pub email: Option<String>,
}

/// BG-5 / BG-8: Postal address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostalAddress {
    /// BT-35 / BT-50: Street and house number.
    pub street: String,
    /// BT-38 / BT-53: Postal code.
    pub postal_code: String,
    /// BT-37 / BT-52: City.
    pub city: String,
    /// BT-40 / BT-55: Country code (ISO 3166-1 alpha-2).
    pub country_code: String,
}

impl PostalAddress {
    /// An address counts as present when street, city and postal code
    /// are all non-blank.
    pub fn is_complete(&self) -> bool {
        !self.street.trim().is_empty()
            && !self.city.trim().is_empty()
            && !self.postal_code.trim().is_empty()
    }
}

/// BG-25: Invoice line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// BT-126: Line identifier (position).
    pub position: u32,
    /// BT-153: Item name.
    pub name: String,
    /// BT-154: Item description.
    pub description: Option<String>,
    /// BT-129: Invoiced quantity.
    pub quantity: Decimal,
    /// BT-130: Unit of measure (UN/CEFACT Rec 20, e.g. "C62", "HUR").
    pub unit_code: String,
    /// BT-146: Net unit price.
    pub unit_price: Decimal,
    /// BT-131: Line net amount.
    pub line_total: Decimal,
    /// BT-152: VAT rate percentage.
    pub vat_rate: Decimal,
    /// BT-151: VAT category code (UNTDID 5305, e.g. "S").
    pub tax_category: String,
}

/// BG-23: VAT breakdown per category/rate combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatBreakdown {
    /// BT-118: VAT category code.
    pub category: String,
    /// BT-119: VAT rate percentage.
    pub rate: Decimal,
    /// BT-116: Taxable amount.
    pub taxable_amount: Decimal,
    /// BT-117: Tax amount.
    pub tax_amount: Decimal,
}

/// BG-16/BG-17: Payment instructions (SEPA credit transfer).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// BT-84: IBAN.
    pub iban: String,
    /// BT-86: BIC.
    pub bic: Option<String>,
    /// BT-85: Account holder name.
    pub account_holder: Option<String>,
    /// BT-20: Payment terms free text.
    pub terms: Option<String>,
}

/// Direction of a booking record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingKind {
    /// Einnahme — revenue.
    Income,
    /// Ausgabe — expense.
    Expense,
}

/// A classified income or expense record as produced by the upstream CRUD
/// layer — the unit the DATEV mapper consumes. Amounts always satisfy
/// `vat == round(net * rate/100)` and `gross == net + vat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: String,
    pub kind: BookingKind,
    /// Document / posting date.
    pub date: NaiveDate,
    /// Posting text (Buchungstext).
    pub description: String,
    /// Net amount.
    pub net: Decimal,
    pub vat_rate: VatRate,
    /// VAT amount, derived from net and rate.
    pub vat: Decimal,
    /// Gross amount, derived.
    pub gross: Decimal,
    /// Document reference (Belegnummer).
    pub document_number: String,
    /// Line number on the EÜR form (Anlage EÜR).
    pub euer_line: Option<u32>,
}

impl BookingRecord {
    /// Build a record with VAT and gross derived from net and rate,
    /// enforcing the money invariants at construction. A zero or negative
    /// net amount is rejected.
    pub fn new(
        id: impl Into<String>,
        kind: BookingKind,
        date: NaiveDate,
        description: impl Into<String>,
        net: Decimal,
        vat_rate: VatRate,
        document_number: impl Into<String>,
    ) -> Result<Self, KontorError> {
        if net <= Decimal::ZERO {
            return Err(KontorError::Validation(format!(
                "net amount must be positive, got {net}"
            )));
        }
        let net = round_half_up(net, 2);
        Ok(Self {
            id: id.into(),
            kind,
            date,
            description: description.into(),
            net,
            vat_rate,
            vat: vat_amount(net, vat_rate),
            gross: gross_amount(net, vat_rate),
            document_number: document_number.into(),
            euer_line: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn booking_derives_vat_and_gross() {
        let r = BookingRecord::new(
            "b1",
            BookingKind::Income,
            date(2024, 3, 5),
            "Beratung",
            dec!(123.45),
            VatRate::Standard19,
            "RE-2024-001",
        )
        .unwrap();
        assert_eq!(r.vat, dec!(23.46));
        assert_eq!(r.gross, dec!(146.91));
    }

    #[test]
    fn booking_rejects_nonpositive_net() {
        assert!(
            BookingRecord::new(
                "b1",
                BookingKind::Expense,
                date(2024, 1, 1),
                "x",
                dec!(0),
                VatRate::Zero,
                "D-1",
            )
            .is_err()
        );
    }

    #[test]
    fn recalculate_groups_by_rate() {
        let mut inv = EInvoiceData {
            invoice_number: "RE-1".into(),
            issue_date: date(2025, 1, 10),
            due_date: None,
            currency: "EUR".into(),
            leitweg_id: None,
            seller: TradeParty::default(),
            buyer: TradeParty::default(),
            lines: vec![
                InvoiceLine {
                    position: 1,
                    name: "A".into(),
                    description: None,
                    quantity: dec!(1),
                    unit_code: "C62".into(),
                    unit_price: dec!(100),
                    line_total: dec!(100),
                    vat_rate: dec!(19),
                    tax_category: "S".into(),
                },
                InvoiceLine {
                    position: 2,
                    name: "B".into(),
                    description: None,
                    quantity: dec!(2),
                    unit_code: "C62".into(),
                    unit_price: dec!(50),
                    line_total: dec!(100),
                    vat_rate: dec!(7),
                    tax_category: "S".into(),
                },
            ],
            subtotal: Decimal::ZERO,
            vat_total: Decimal::ZERO,
            total: Decimal::ZERO,
            vat_breakdown: vec![],
            payment: None,
            notes: vec![],
        };
        inv.recalculate();
        assert_eq!(inv.subtotal, dec!(200.00));
        assert_eq!(inv.vat_total, dec!(26.00));
        assert_eq!(inv.total, dec!(226.00));
        assert_eq!(inv.vat_breakdown.len(), 2);
    }
}
