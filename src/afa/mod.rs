//! Fixed-asset depreciation (AfA) and GWG immediate write-off.
//!
//! Schedules are a pure function of the asset's purchase data, category
//! and method — whenever one of those changes the schedule is recomputed
//! from scratch, never patched incrementally.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use kontor::afa::{Asset, AssetCategory, compute_schedule};
//! use rust_decimal_macros::dec;
//!
//! let asset = Asset::linear(
//!     "A-1",
//!     "ThinkPad X1",
//!     AssetCategory::Computer,
//!     NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
//!     dec!(2400),
//! );
//! let schedule = compute_schedule(&asset).unwrap();
//! assert_eq!(schedule.last().unwrap().book_value, rust_decimal::Decimal::ZERO);
//! ```

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::core::{KontorError, VatRate, round_half_up};

/// Asset category with a statutory useful life from the official AfA
/// table (AfA-Tabelle AV). Unknown categories are unrepresentable;
/// string input is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    /// Computer, Laptop, Peripherie — 3 Jahre.
    Computer,
    /// Telefon / Mobiltelefon — 5 Jahre.
    Phone,
    /// Büromöbel — 13 Jahre.
    Furniture,
    /// Allgemeine Betriebsausstattung — 8 Jahre.
    Equipment,
    /// Software — 3 Jahre.
    Software,
}

impl AssetCategory {
    /// Statutory useful life in years (betriebsgewöhnliche Nutzungsdauer).
    pub fn useful_life_years(&self) -> u32 {
        match self {
            Self::Computer => 3,
            Self::Phone => 5,
            Self::Furniture => 13,
            Self::Equipment => 8,
            Self::Software => 3,
        }
    }

    /// Parse from a lowercase category name.
    pub fn from_name(name: &str) -> Result<Self, KontorError> {
        match name {
            "computer" => Ok(Self::Computer),
            "phone" => Ok(Self::Phone),
            "furniture" => Ok(Self::Furniture),
            "equipment" => Ok(Self::Equipment),
            "software" => Ok(Self::Software),
            other => Err(KontorError::Validation(format!(
                "unknown asset category: '{other}'"
            ))),
        }
    }
}

/// Depreciation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AfaMethod {
    /// Linear AfA over the useful life.
    Linear,
    /// GWG full write-off in the purchase year.
    Immediate,
}

/// Lifecycle status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Active,
    Disposed,
    Sold,
}

/// Disposal details, present only when the asset is no longer active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disposal {
    pub date: NaiveDate,
    /// Sale proceeds; zero for scrapping.
    pub proceeds: Decimal,
    pub reason: Option<String>,
}

/// A fixed asset subject to AfA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub category: AssetCategory,
    pub purchase_date: NaiveDate,
    /// Net purchase price.
    pub purchase_price: Decimal,
    pub vat_rate: VatRate,
    pub method: AfaMethod,
    /// Depreciation period in years; for linear AfA this is the
    /// category's statutory useful life unless overridden.
    pub afa_years: u32,
    pub status: AssetStatus,
    pub disposal: Option<Disposal>,
}

impl Asset {
    /// An active asset depreciated linearly over the category's
    /// statutory useful life.
    pub fn linear(
        id: impl Into<String>,
        name: impl Into<String>,
        category: AssetCategory,
        purchase_date: NaiveDate,
        purchase_price: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            purchase_date,
            purchase_price,
            vat_rate: VatRate::Standard19,
            method: AfaMethod::Linear,
            afa_years: category.useful_life_years(),
            status: AssetStatus::Active,
            disposal: None,
        }
    }

    /// A GWG asset written off in full in the purchase year.
    pub fn immediate(
        id: impl Into<String>,
        name: impl Into<String>,
        category: AssetCategory,
        purchase_date: NaiveDate,
        purchase_price: Decimal,
    ) -> Self {
        Self {
            afa_years: 1,
            method: AfaMethod::Immediate,
            ..Self::linear(id, name, category, purchase_date, purchase_price)
        }
    }
}

/// One year of a depreciation schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepreciationEntry {
    pub year: i32,
    /// Months depreciated in this year (1–12, pro-rata for the
    /// acquisition and disposal year).
    pub months: u32,
    /// This year's AfA amount.
    pub amount: Decimal,
    /// Running total of depreciation.
    pub cumulative: Decimal,
    /// `purchase_price - cumulative`, floored at zero.
    pub book_value: Decimal,
}

/// GWG thresholds (net amounts). Explicit configuration — the statutory
/// values have moved repeatedly and the €800–€1000 band is a policy
/// choice, so callers can override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GwgThresholds {
    /// ≤ this: immediate write-off without a GWG register entry
    /// (§6 Abs. 2a Satz 4 EStG).
    pub minor_limit: Decimal,
    /// ≤ this: immediate write-off under §6 Abs. 2 EStG.
    pub immediate_limit: Decimal,
    /// ≤ this: eligible for the Sammelposten 5-year pool as an
    /// alternative to linear AfA.
    pub pool_limit: Decimal,
}

impl Default for GwgThresholds {
    fn default() -> Self {
        Self {
            minor_limit: dec!(250),
            immediate_limit: dec!(800),
            pool_limit: dec!(1000),
        }
    }
}

/// Depreciation regime suggested by the net purchase price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GwgClass {
    /// ≤ minor limit: full write-off in the purchase year, exempt from
    /// the GWG register.
    ImmediateMinor,
    /// Full write-off in the purchase year, recorded in the GWG
    /// register (§6 Abs. 2 EStG).
    ImmediateWriteOff,
    /// €800–€1000 band: Sammelposten pool or standard linear AfA.
    /// The legal regime is a policy choice, surfaced to the caller
    /// rather than decided here.
    PoolOrLinear,
    /// Standard linear AfA over the statutory useful life.
    Linear,
}

/// Classify a net purchase price against the GWG thresholds.
pub fn classify(net_price: Decimal, thresholds: &GwgThresholds) -> GwgClass {
    if net_price <= thresholds.minor_limit {
        GwgClass::ImmediateMinor
    } else if net_price <= thresholds.immediate_limit {
        GwgClass::ImmediateWriteOff
    } else if net_price <= thresholds.pool_limit {
        GwgClass::PoolOrLinear
    } else {
        GwgClass::Linear
    }
}

/// Result of disposing of an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisposalResult {
    /// Schedule truncated at the disposal date.
    pub schedule: Vec<DepreciationEntry>,
    /// Remaining book value at the disposal date.
    pub book_value_at_disposal: Decimal,
    /// `proceeds - book_value_at_disposal`; positive is a gain (EÜR
    /// income), negative a loss (EÜR expense). Classification happens
    /// upstream.
    pub gain_loss: Decimal,
}

/// Compute the full depreciation schedule for an asset.
///
/// Linear AfA: the annual amount is `price / afa_years` rounded to
/// cents; the acquisition year is pro-rated by remaining months and the
/// final year absorbs the rounding residue, so the cumulative total
/// equals the purchase price exactly and the terminal book value is 0.
pub fn compute_schedule(asset: &Asset) -> Result<Vec<DepreciationEntry>, KontorError> {
    if asset.purchase_price <= Decimal::ZERO {
        return Err(KontorError::Validation(format!(
            "purchase price must be positive, got {}",
            asset.purchase_price
        )));
    }

    let price = round_half_up(asset.purchase_price, 2);
    let start_year = asset.purchase_date.year();
    // Months remaining in the acquisition year, purchase month included.
    let first_year_months = 13 - asset.purchase_date.month();

    match asset.method {
        AfaMethod::Immediate => Ok(vec![DepreciationEntry {
            year: start_year,
            months: first_year_months,
            amount: price,
            cumulative: price,
            book_value: Decimal::ZERO,
        }]),
        AfaMethod::Linear => {
            if asset.afa_years == 0 {
                return Err(KontorError::Validation(
                    "afa_years must be at least 1 for linear depreciation".into(),
                ));
            }
            Ok(linear_schedule(
                price,
                start_year,
                first_year_months,
                asset.afa_years,
            ))
        }
    }
}

fn linear_schedule(
    price: Decimal,
    start_year: i32,
    first_year_months: u32,
    afa_years: u32,
) -> Vec<DepreciationEntry> {
    let annual = round_half_up(price / Decimal::from(afa_years), 2);

    // A mid-year acquisition stretches the schedule into one extra
    // calendar year carrying the months missing from the first.
    let tail_months = 12 - first_year_months;
    let total_years = if tail_months > 0 {
        afa_years + 1
    } else {
        afa_years
    };

    let mut entries = Vec::with_capacity(total_years as usize);
    let mut cumulative = Decimal::ZERO;

    for i in 0..total_years {
        let year = start_year + i as i32;
        let is_last = i == total_years - 1;

        let months = if i == 0 {
            first_year_months
        } else if is_last && tail_months > 0 {
            tail_months
        } else {
            12
        };

        let amount = if is_last {
            // Terminal year absorbs the rounding residue.
            price - cumulative
        } else {
            round_half_up(annual * Decimal::from(months) / dec!(12), 2)
        };

        cumulative += amount;
        let book_value = (price - cumulative).max(Decimal::ZERO);

        entries.push(DepreciationEntry {
            year,
            months,
            amount,
            cumulative,
            book_value,
        });
    }

    entries
}

/// Truncate an asset's schedule at a disposal date and report the
/// resulting gain or loss against the proceeds.
///
/// The disposal year is pro-rated up to and including the disposal month;
/// later entries are dropped.
pub fn dispose(
    asset: &Asset,
    disposal_date: NaiveDate,
    proceeds: Decimal,
) -> Result<DisposalResult, KontorError> {
    if disposal_date < asset.purchase_date {
        return Err(KontorError::Validation(format!(
            "disposal date {disposal_date} precedes purchase date {}",
            asset.purchase_date
        )));
    }
    if proceeds < Decimal::ZERO {
        return Err(KontorError::Validation(format!(
            "disposal proceeds must not be negative, got {proceeds}"
        )));
    }

    let full = compute_schedule(asset)?;
    let disposal_year = disposal_date.year();

    let mut schedule = Vec::new();
    let mut cumulative = Decimal::ZERO;
    let price = round_half_up(asset.purchase_price, 2);

    for entry in full {
        if entry.year > disposal_year {
            break;
        }
        if entry.year < disposal_year {
            cumulative = entry.cumulative;
            schedule.push(entry);
            continue;
        }

        // Disposal year: pro-rate by months held. In the acquisition
        // year the count starts at the purchase month.
        let first_month = if entry.year == asset.purchase_date.year() {
            asset.purchase_date.month()
        } else {
            1
        };
        let held_months = (disposal_date.month() + 1 - first_month).min(entry.months);
        let annual = round_half_up(price / Decimal::from(asset.afa_years.max(1)), 2);
        let amount = if held_months == entry.months {
            // Full final-period months held: keep the schedule's amount
            // (which already carries any rounding residue).
            entry.amount
        } else {
            match asset.method {
                AfaMethod::Immediate => entry.amount,
                AfaMethod::Linear => round_half_up(annual * Decimal::from(held_months) / dec!(12), 2)
                    .min(price - cumulative),
            }
        };
        cumulative += amount;
        schedule.push(DepreciationEntry {
            year: entry.year,
            months: held_months,
            amount,
            cumulative,
            book_value: (price - cumulative).max(Decimal::ZERO),
        });
        break;
    }

    let book_value_at_disposal = schedule
        .last()
        .map(|e| e.book_value)
        .unwrap_or(price);

    Ok(DisposalResult {
        schedule,
        book_value_at_disposal,
        gain_loss: round_half_up(proceeds, 2) - book_value_at_disposal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn useful_life_per_category() {
        assert_eq!(AssetCategory::Computer.useful_life_years(), 3);
        assert_eq!(AssetCategory::Furniture.useful_life_years(), 13);
    }

    #[test]
    fn unknown_category_rejected() {
        assert!(AssetCategory::from_name("yacht").is_err());
        assert_eq!(
            AssetCategory::from_name("software").unwrap(),
            AssetCategory::Software
        );
    }

    #[test]
    fn classify_bands() {
        let t = GwgThresholds::default();
        assert_eq!(classify(dec!(199), &t), GwgClass::ImmediateMinor);
        assert_eq!(classify(dec!(250), &t), GwgClass::ImmediateMinor);
        assert_eq!(classify(dec!(250.01), &t), GwgClass::ImmediateWriteOff);
        assert_eq!(classify(dec!(800), &t), GwgClass::ImmediateWriteOff);
        assert_eq!(classify(dec!(850), &t), GwgClass::PoolOrLinear);
        assert_eq!(classify(dec!(1000), &t), GwgClass::PoolOrLinear);
        assert_eq!(classify(dec!(1000.01), &t), GwgClass::Linear);
    }

    #[test]
    fn immediate_single_entry() {
        let a = Asset::immediate("g1", "USB-Hub", AssetCategory::Computer, date(2024, 9, 3), dec!(79.90));
        let s = compute_schedule(&a).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].amount, dec!(79.90));
        assert_eq!(s[0].book_value, dec!(0));
        assert_eq!(s[0].months, 4);
    }

    #[test]
    fn linear_jan_purchase_no_tail_year() {
        let a = Asset::linear("a1", "PC", AssetCategory::Computer, date(2024, 1, 1), dec!(3000));
        let s = compute_schedule(&a).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s[0].amount, dec!(1000.00));
        assert_eq!(s[2].cumulative, dec!(3000));
        assert_eq!(s[2].book_value, dec!(0));
    }

    #[test]
    fn linear_mid_year_pro_rata_with_tail() {
        // April purchase: 9 months year 1, 3 months tail year.
        let a = Asset::linear("a2", "PC", AssetCategory::Computer, date(2024, 4, 10), dec!(2400));
        let s = compute_schedule(&a).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s[0].months, 9);
        assert_eq!(s[0].amount, dec!(600.00)); // 800 * 9/12
        assert_eq!(s[1].amount, dec!(800.00));
        assert_eq!(s[3].months, 3);
        assert_eq!(s[3].cumulative, dec!(2400));
        assert_eq!(s[3].book_value, dec!(0));
    }

    #[test]
    fn rounding_residue_absorbed_in_final_year() {
        // 1000 / 3 = 333.33 per year; residue lands in the last entry.
        let a = Asset::linear("a3", "Software", AssetCategory::Software, date(2024, 1, 15), dec!(1000));
        let s = compute_schedule(&a).unwrap();
        let total: Decimal = s.iter().map(|e| e.amount).sum();
        assert_eq!(total, dec!(1000));
        assert_eq!(s.last().unwrap().book_value, dec!(0));
        assert_eq!(s.last().unwrap().amount, dec!(333.34));
    }

    #[test]
    fn zero_price_rejected() {
        let a = Asset::linear("a4", "PC", AssetCategory::Computer, date(2024, 1, 1), dec!(0));
        assert!(compute_schedule(&a).is_err());
    }

    #[test]
    fn disposal_truncates_and_reports_gain_loss() {
        let a = Asset::linear("a5", "PC", AssetCategory::Computer, date(2024, 1, 1), dec!(3000));
        // Disposed end of June 2025: 12 + 6 months of 36 used.
        let r = dispose(&a, date(2025, 6, 30), dec!(2000)).unwrap();
        assert_eq!(r.schedule.len(), 2);
        assert_eq!(r.schedule[1].months, 6);
        assert_eq!(r.schedule[1].amount, dec!(500.00));
        assert_eq!(r.book_value_at_disposal, dec!(1500.00));
        assert_eq!(r.gain_loss, dec!(500.00));
    }

    #[test]
    fn disposal_before_purchase_rejected() {
        let a = Asset::linear("a6", "PC", AssetCategory::Computer, date(2024, 6, 1), dec!(1200));
        assert!(dispose(&a, date(2024, 1, 1), dec!(100)).is_err());
    }
}
