//! SKR03 / SKR04 account numbers for EÜR bookkeeping.

use serde::{Deserialize, Serialize};

use crate::core::VatRate;

/// Standard German chart of accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ChartOfAccounts {
    /// Standardkontenrahmen 03 (Prozessgliederung, common for SMBs).
    Skr03,
    /// Standardkontenrahmen 04 (Abschlussgliederung).
    Skr04,
}

impl ChartOfAccounts {
    /// Identifier used in export filenames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Skr03 => "SKR03",
            Self::Skr04 => "SKR04",
        }
    }

    /// Revenue account (Erlöskonto) for an income record.
    pub fn income_account(&self, rate: VatRate) -> u32 {
        match (self, rate) {
            (Self::Skr03, VatRate::Standard19) => 8400,
            (Self::Skr03, VatRate::Reduced7) => 8300,
            (Self::Skr03, VatRate::Zero) => 8200,
            (Self::Skr04, VatRate::Standard19) => 4400,
            (Self::Skr04, VatRate::Reduced7) => 4300,
            (Self::Skr04, VatRate::Zero) => 4200,
        }
    }

    /// Generic operating-expense account (sonstige betriebliche
    /// Aufwendungen).
    pub fn expense_account(&self) -> u32 {
        match self {
            Self::Skr03 => 4900,
            Self::Skr04 => 6800,
        }
    }

    /// Depreciation expense account (Abschreibungen auf Sachanlagen).
    pub fn depreciation_account(&self) -> u32 {
        match self {
            Self::Skr03 => 4830,
            Self::Skr04 => 6220,
        }
    }

    /// Immediate write-off account for GWG
    /// (Sofortabschreibung geringwertiger Wirtschaftsgüter).
    pub fn gwg_account(&self) -> u32 {
        match self {
            Self::Skr03 => 4855,
            Self::Skr04 => 6260,
        }
    }

    /// Default bank clearing account (Gegenkonto).
    pub fn bank_account(&self) -> u32 {
        match self {
            Self::Skr03 => 1200,
            Self::Skr04 => 1800,
        }
    }

    /// BU-Schlüssel (tax key) for a booking against a non-Automatik
    /// account: 2/3 for revenue VAT, 8/9 for input VAT. Revenue accounts
    /// listed above are Automatikkonten, so income rows carry no key.
    pub fn bu_key(&self, rate: VatRate, is_expense: bool) -> Option<u8> {
        match (rate, is_expense) {
            (VatRate::Zero, _) => None,
            (VatRate::Reduced7, true) => Some(8),
            (VatRate::Standard19, true) => Some(9),
            // Income books on Automatikkonten.
            (_, false) => None,
        }
    }
}
