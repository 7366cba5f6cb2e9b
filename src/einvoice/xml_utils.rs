use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::{KontorError, round_half_up};

pub type XmlResult = Result<String, KontorError>;

fn xml_io(e: std::io::Error) -> KontorError {
    KontorError::Xml(format!("XML write error: {e}"))
}

/// Thin event-writer wrapper. Free text goes through quick-xml's text
/// events, which escape `&`, `<`, `>`, `"` and `'`.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, KontorError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, KontorError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| KontorError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, KontorError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, KontorError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, KontorError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, KontorError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, KontorError> {
        self.start_element_with_attrs(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write an amount with a currencyID attribute.
    pub fn amount_element(
        &mut self,
        name: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<&mut Self, KontorError> {
        self.text_element_with_attrs(name, &format_xml_amount(amount), &[("currencyID", currency)])
    }

    /// Write a quantity with a unitCode attribute.
    pub fn quantity_element(
        &mut self,
        name: &str,
        qty: Decimal,
        unit: &str,
    ) -> Result<&mut Self, KontorError> {
        self.text_element_with_attrs(name, &format_xml_amount(qty), &[("unitCode", unit)])
    }
}

/// Format a numeric value for the e-invoice schemas: exactly 2 decimal
/// places, dot separator.
pub fn format_xml_amount(d: Decimal) -> String {
    format!("{:.2}", round_half_up(d, 2))
}

/// Parse the schema decimal representation back into a Decimal.
pub fn parse_xml_amount(s: &str) -> Result<Decimal, KontorError> {
    s.trim()
        .parse::<Decimal>()
        .map_err(|e| KontorError::Xml(format!("invalid amount '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_always_two_decimals() {
        assert_eq!(format_xml_amount(dec!(100)), "100.00");
        assert_eq!(format_xml_amount(dec!(49.9)), "49.90");
        assert_eq!(format_xml_amount(dec!(5474)), "5474.00");
        assert_eq!(format_xml_amount(dec!(0.005)), "0.01");
    }

    #[test]
    fn parse_roundtrip() {
        assert_eq!(parse_xml_amount("5474.00").unwrap(), dec!(5474.00));
        assert!(parse_xml_amount("12,5").is_err());
    }

    #[test]
    fn free_text_is_escaped() {
        let mut w = XmlWriter::new().unwrap();
        w.start_element("root").unwrap();
        w.text_element("note", "Müller & Söhne <GmbH>").unwrap();
        w.end_element("root").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains("Müller &amp; Söhne &lt;GmbH&gt;"));
    }
}
