//! EN 16931 business-rule validation of the canonical invoice model.
//!
//! Checks run before generation so a caller never emits a document that a
//! Leitweg portal or a customer's validator would bounce. Every breached
//! rule is collected; nothing short-circuits.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::{EInvoiceData, ValidationReport, Violation};

/// Rounding tolerance for the arithmetic consistency rules (BR-CO-*).
const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// Validate an invoice against the EN 16931 business rules.
///
/// Errors make the document non-compliant; warnings are advisory
/// (e.g. missing payment instructions on a B2B invoice).
pub fn validate(data: &EInvoiceData) -> ValidationReport {
    let mut report = ValidationReport::default();

    if data.invoice_number.trim().is_empty() {
        report.errors.push(Violation::new(
            "BR-02",
            "invoice_number",
            "An invoice shall have an invoice number",
        ));
    }

    if data.seller.name.trim().is_empty() {
        report.errors.push(Violation::new(
            "BR-06",
            "seller.name",
            "An invoice shall contain the seller name",
        ));
    }

    if data.buyer.name.trim().is_empty() {
        report.errors.push(Violation::new(
            "BR-07",
            "buyer.name",
            "An invoice shall contain the buyer name",
        ));
    }

    if !data.seller.address.is_complete() {
        report.errors.push(Violation::new(
            "BR-08",
            "seller.address",
            "An invoice shall contain the seller postal address",
        ));
    }

    if data.seller.vat_id.is_none() && data.seller.tax_number.is_none() {
        report.errors.push(Violation::new(
            "BR-11",
            "seller",
            "The seller shall have a VAT identifier or a tax registration number",
        ));
    }

    if data.lines.is_empty() {
        report.errors.push(Violation::new(
            "BR-13",
            "lines",
            "An invoice shall have at least one invoice line",
        ));
    }

    for line in &data.lines {
        if line.name.trim().is_empty() {
            report.errors.push(Violation::new(
                "BR-25",
                format!("lines[{}].name", line.position),
                "Each invoice line shall contain the item name",
            ));
        }
    }

    let line_sum: Decimal = data.lines.iter().map(|l| l.line_total).sum();
    if !data.lines.is_empty() && (line_sum - data.subtotal).abs() > AMOUNT_TOLERANCE {
        report.errors.push(Violation::new(
            "BR-CO-10",
            "subtotal",
            format!(
                "Sum of line net amounts ({line_sum}) does not equal the \
                 invoice line net total ({})",
                data.subtotal
            ),
        ));
    }

    if ((data.subtotal + data.vat_total) - data.total).abs() > AMOUNT_TOLERANCE {
        report.errors.push(Violation::new(
            "BR-CO-15",
            "total",
            format!(
                "Net total plus VAT ({}) does not equal the grand total ({})",
                data.subtotal + data.vat_total,
                data.total
            ),
        ));
    }

    let breakdown_tax: Decimal = data.vat_breakdown.iter().map(|vb| vb.tax_amount).sum();
    if !data.vat_breakdown.is_empty() && (breakdown_tax - data.vat_total).abs() > AMOUNT_TOLERANCE {
        report.errors.push(Violation::new(
            "BR-CO-14",
            "vat_total",
            format!(
                "Sum of VAT breakdown amounts ({breakdown_tax}) does not \
                 equal the VAT total ({})",
                data.vat_total
            ),
        ));
    }

    if data
        .payment
        .as_ref()
        .is_none_or(|p| p.iban.trim().is_empty())
    {
        report.warnings.push(Violation::new(
            "W-PAY",
            "payment.iban",
            "No payment account given; the buyer cannot pay by credit transfer",
        ));
    }

    report
}
