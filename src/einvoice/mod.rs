//! E-invoice generation, validation, and parsing.
//!
//! Both wire formats are produced from, and parsed back into, the single
//! canonical [`EInvoiceData`](crate::core::EInvoiceData) model:
//!
//! - **ZUGFeRD** — UN/CEFACT CII syntax, Factur-X comfort profile
//!   ([`to_zugferd`], parse via [`parse`])
//! - **XRechnung** — UBL 2.1 syntax, XRechnung 3.0 customization
//!   ([`to_xrechnung`])
//!
//! [`validate`] checks the model against the EN 16931 business rules
//! before generation; [`parse`] sniffs the format from the root element
//! and namespace.

mod validate;
mod xml_utils;
mod xrechnung;
mod zugferd;

use serde::{Deserialize, Serialize};

use crate::core::{EInvoiceData, KontorError};

pub use validate::validate;
pub use xrechnung::to_xrechnung;
pub use zugferd::to_zugferd;

/// ZUGFeRD guideline identifier (Factur-X comfort / EN 16931 profile).
pub const ZUGFERD_GUIDELINE_ID: &str = "urn:factur-x.eu:1p0:comfort";

/// XRechnung 3.0 customization identifier (BT-24).
pub const XRECHNUNG_CUSTOMIZATION_ID: &str =
    "urn:cen.eu:en16931:2017#compliant#urn:xoev-de:kosit:standard:xrechnung_3.0";

/// CII namespace URIs.
pub mod cii_ns {
    pub const RSM: &str = "urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100";
    pub const RAM: &str =
        "urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100";
    pub const UDT: &str = "urn:un:unece:uncefact:data:standard:UnqualifiedDataType:100";
}

/// UBL 2.1 namespace URIs.
pub mod ubl_ns {
    pub const INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    pub const CAC: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
}

/// Recognized e-invoice wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EInvoiceFormat {
    /// CII syntax (`rsm:CrossIndustryInvoice`).
    Zugferd,
    /// UBL syntax (`ubl:Invoice`).
    XrechnungUbl,
}

/// A parsed e-invoice: the normalized data plus the detected format.
#[derive(Debug, Clone)]
pub struct ParsedInvoice {
    pub data: EInvoiceData,
    pub format: EInvoiceFormat,
}

/// Detect the e-invoice format from the root element and its namespaces.
/// Anything other than a CII `CrossIndustryInvoice` or a UBL `Invoice`
/// is an [`KontorError::UnsupportedFormat`].
pub fn detect_format(xml: &str) -> Result<EInvoiceFormat, KontorError> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let local = name.rsplit(':').next().unwrap_or(&name).to_string();

                let mut namespaces = Vec::new();
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref().starts_with(b"xmlns") {
                        namespaces.push(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }

                return match local.as_str() {
                    "CrossIndustryInvoice" if namespaces.iter().any(|ns| ns == cii_ns::RSM) => {
                        Ok(EInvoiceFormat::Zugferd)
                    }
                    "Invoice" if namespaces.iter().any(|ns| ns == ubl_ns::INVOICE) => {
                        Ok(EInvoiceFormat::XrechnungUbl)
                    }
                    _ => Err(KontorError::UnsupportedFormat(format!(
                        "unrecognized root element <{name}>"
                    ))),
                };
            }
            Ok(Event::Eof) => {
                return Err(KontorError::UnsupportedFormat(
                    "document has no root element".into(),
                ));
            }
            Err(e) => return Err(KontorError::Xml(format!("XML parse error: {e}"))),
            _ => {}
        }
    }
}

/// Parse a ZUGFeRD or XRechnung XML document into the canonical model.
pub fn parse(xml: &str) -> Result<ParsedInvoice, KontorError> {
    let format = detect_format(xml)?;
    let data = match format {
        EInvoiceFormat::Zugferd => zugferd::from_zugferd(xml)?,
        EInvoiceFormat::XrechnungUbl => xrechnung::from_xrechnung(xml)?,
    };
    Ok(ParsedInvoice { data, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_root_rejected() {
        let err = detect_format("<foo><bar/></foo>").unwrap_err();
        assert!(matches!(err, KontorError::UnsupportedFormat(_)));
    }

    #[test]
    fn empty_document_rejected() {
        assert!(detect_format("").is_err());
    }

    #[test]
    fn cii_root_requires_the_rsm_namespace() {
        // The root namespace decides; mentions of the profile in free
        // text must not.
        let xml = r#"<rsm:CrossIndustryInvoice xmlns:rsm="urn:example:other">
            <ram:Content>siehe factur-x.eu</ram:Content>
        </rsm:CrossIndustryInvoice>"#;
        let err = detect_format(xml).unwrap_err();
        assert!(matches!(err, KontorError::UnsupportedFormat(_)));
    }
}
