//! `LedgerImport` XML — alternate serialization of a Buchungsstapel.

use chrono::NaiveDate;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

use super::accounts::ChartOfAccounts;
use super::csv::DatevRecord;
use crate::core::{KontorError, format_amount_de};

fn xml_err(e: impl std::fmt::Display) -> KontorError {
    KontorError::Xml(format!("LedgerImport write error: {e}"))
}

/// Serialize Buchungsstapel records as a `LedgerImport` XML document
/// covering the given date range.
pub fn generate_xml(
    records: &[DatevRecord],
    chart: ChartOfAccounts,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<String, KontorError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("LedgerImport");
    root.push_attribute(("generator_info", "kontor"));
    root.push_attribute(("xml_data", "Kennzeichen fuer Buchungsstapel"));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("consolidate")))
        .map_err(xml_err)?;
    text_element(&mut writer, "chartOfAccounts", chart.code())?;
    text_element(
        &mut writer,
        "dateStart",
        &period_start.format("%Y-%m-%d").to_string(),
    )?;
    text_element(
        &mut writer,
        "dateEnd",
        &period_end.format("%Y-%m-%d").to_string(),
    )?;
    writer
        .write_event(Event::End(BytesEnd::new("consolidate")))
        .map_err(xml_err)?;

    for record in records {
        writer
            .write_event(Event::Start(BytesStart::new("LedgerRecord")))
            .map_err(xml_err)?;
        text_element(&mut writer, "amount", &format_amount_de(record.amount))?;
        text_element(&mut writer, "debitCreditCode", record.debit_credit.code())?;
        text_element(&mut writer, "currencyCode", &record.currency)?;
        text_element(&mut writer, "accountNo", &record.account.to_string())?;
        text_element(
            &mut writer,
            "contraAccountNo",
            &record.contra_account.to_string(),
        )?;
        if let Some(bu) = record.bu_key {
            text_element(&mut writer, "buKey", &bu.to_string())?;
        }
        text_element(
            &mut writer,
            "date",
            &record.date.format("%Y-%m-%d").to_string(),
        )?;
        text_element(&mut writer, "documentField1", &record.document_ref)?;
        text_element(&mut writer, "bookingText", &record.posting_text)?;
        writer
            .write_event(Event::End(BytesEnd::new("LedgerRecord")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("LedgerImport")))
        .map_err(xml_err)?;

    let buf = writer.into_inner().into_inner();
    String::from_utf8(buf).map_err(|e| KontorError::Xml(format!("UTF-8 error: {e}")))
}

fn text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<(), KontorError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}
