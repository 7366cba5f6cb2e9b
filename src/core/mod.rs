//! Core types shared by every compliance component: exact-decimal money
//! arithmetic, the normalized e-invoice model, booking records, and the
//! crate error taxonomy.

mod error;
mod money;
mod types;

pub use error::{KontorError, ValidationReport, Violation};
pub use money::{
    VatRate, format_amount_de, gross_amount, parse_amount_de, round_half_up, to_latin1,
    vat_amount,
};
pub use types::*;
