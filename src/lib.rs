//! # kontor
//!
//! Compliance engine for German freelance bookkeeping: fixed-asset
//! depreciation (AfA/GWG), GoBD period locks with an append-only audit
//! trail, DATEV Buchungsstapel export, and ZUGFeRD / XRechnung e-invoice
//! generation, validation, and parsing.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//! User-visible amounts are rounded to 2 decimal places half-up
//! (kaufmännisches Runden) at the point they are derived.
//!
//! ## Quick Start
//!
//! ```rust
//! use kontor::core::{VatRate, gross_amount, vat_amount};
//! use rust_decimal_macros::dec;
//!
//! let net = dec!(123.45);
//! let vat = vat_amount(net, VatRate::Standard19);
//! let gross = gross_amount(net, VatRate::Standard19);
//!
//! assert_eq!(vat, dec!(23.46));
//! assert_eq!(gross, dec!(146.91));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Money/VAT arithmetic, invoice & booking models, errors |
//! | `afa` | AfA/GWG depreciation schedules and disposal |
//! | `gobd` | Period locks, mutation gate, append-only audit trail |
//! | `datev` | DATEV Buchungsstapel CSV/XML export |
//! | `einvoice` | ZUGFeRD CII & XRechnung UBL generation, validation, parsing |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "afa")]
pub mod afa;

#[cfg(feature = "gobd")]
pub mod gobd;

#[cfg(feature = "datev")]
pub mod datev;

#[cfg(feature = "einvoice")]
pub mod einvoice;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
