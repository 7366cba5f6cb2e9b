//! DATEV Buchungsstapel export.
//!
//! Maps classified booking records (and depreciation entries) onto the
//! 21-field Buchungsstapel row set and serializes them as semicolon CSV
//! (ISO-8859-1) or as a `LedgerImport` XML document.
//!
//! Per-record problems never abort an export: invalid rows are collected
//! into the result's error list so a batch can report partial success.

mod accounts;
mod csv;
mod xml;

pub use accounts::ChartOfAccounts;
pub use csv::{
    DATEV_HEADERS, DatevExport, DatevRecord, SollHaben, export_filename, generate_csv,
    map_bookings,
};
#[cfg(feature = "afa")]
pub use csv::map_depreciation;
pub use xml::generate_xml;
