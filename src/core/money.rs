//! Exact-decimal money arithmetic and German-locale formatting.
//!
//! Every amount that becomes user-visible is rounded to 2 decimal places
//! half-up (kaufmännisches Runden). The invariants
//! `vat == round(net * rate / 100)` and `gross == net + vat` hold for all
//! persisted records.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::KontorError;

/// German VAT rates applicable to freelancer bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VatRate {
    /// 0% — tax-free or Kleinunternehmer.
    Zero,
    /// 7% — reduced rate (ermäßigter Steuersatz).
    Reduced7,
    /// 19% — standard rate (Regelsteuersatz).
    Standard19,
}

impl VatRate {
    /// Rate as a percentage value.
    pub fn percent(&self) -> Decimal {
        match self {
            Self::Zero => Decimal::ZERO,
            Self::Reduced7 => dec!(7),
            Self::Standard19 => dec!(19),
        }
    }

    /// Parse from a percentage value; only 0, 7 and 19 are recognized.
    pub fn from_percent(p: Decimal) -> Result<Self, KontorError> {
        if p == Decimal::ZERO {
            Ok(Self::Zero)
        } else if p == dec!(7) {
            Ok(Self::Reduced7)
        } else if p == dec!(19) {
            Ok(Self::Standard19)
        } else {
            Err(KontorError::Validation(format!(
                "unknown VAT rate: {p}% (expected 0, 7 or 19)"
            )))
        }
    }
}

/// Round a Decimal to `dp` decimal places using half-up (commercial rounding).
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// VAT amount for a net amount: `round(net * rate / 100, 2)`.
pub fn vat_amount(net: Decimal, rate: VatRate) -> Decimal {
    round_half_up(net * rate.percent() / dec!(100), 2)
}

/// Gross amount for a net amount: `round(net, 2) + vat`.
pub fn gross_amount(net: Decimal, rate: VatRate) -> Decimal {
    round_half_up(net, 2) + vat_amount(net, rate)
}

/// Format a Decimal as a German amount: comma separator, exactly 2 decimal
/// places, no thousands grouping. This is the DATEV field representation.
pub fn format_amount_de(d: Decimal) -> String {
    let scaled = round_half_up(d, 2);
    format!("{:.2}", scaled).replace('.', ",")
}

/// Parse a German-formatted amount (comma decimal separator).
pub fn parse_amount_de(s: &str) -> Result<Decimal, KontorError> {
    let normalized = s.trim().replace(',', ".");
    normalized
        .parse::<Decimal>()
        .map_err(|e| KontorError::Validation(format!("invalid amount '{s}': {e}")))
}

/// Encode a string as ISO-8859-1 bytes. Characters outside the Latin-1
/// range (e.g. `€`) are replaced with `?` — an export must not fail on a
/// stray character.
pub fn to_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF { code as u8 } else { b'?' }
        })
        .collect()
}
