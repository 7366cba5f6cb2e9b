//! XRechnung (UBL 2.1) generation and parsing.

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;

use super::xml_utils::{XmlResult, XmlWriter, format_xml_amount, parse_xml_amount};
use super::{XRECHNUNG_CUSTOMIZATION_ID, ubl_ns};
use crate::core::{
    EInvoiceData, InvoiceLine, KontorError, PaymentDetails, PostalAddress, TradeParty,
    VatBreakdown,
};

/// Generate an XRechnung 3.0 UBL invoice document.
pub fn to_xrechnung(data: &EInvoiceData) -> XmlResult {
    let currency = &data.currency;
    let mut w = XmlWriter::new()?;

    w.start_element_with_attrs(
        "ubl:Invoice",
        &[
            ("xmlns:ubl", ubl_ns::INVOICE),
            ("xmlns:cac", ubl_ns::CAC),
            ("xmlns:cbc", ubl_ns::CBC),
        ],
    )?;

    w.text_element("cbc:CustomizationID", XRECHNUNG_CUSTOMIZATION_ID)?;
    w.text_element(
        "cbc:ProfileID",
        "urn:fdc:peppol.eu:2017:poacc:billing:01:1.0",
    )?;
    w.text_element("cbc:ID", &data.invoice_number)?;
    w.text_element("cbc:IssueDate", &iso_date(data.issue_date))?;
    if let Some(due) = data.due_date {
        w.text_element("cbc:DueDate", &iso_date(due))?;
    }
    w.text_element("cbc:InvoiceTypeCode", "380")?;
    for note in &data.notes {
        w.text_element("cbc:Note", note)?;
    }
    w.text_element("cbc:DocumentCurrencyCode", currency)?;
    if let Some(leitweg) = &data.leitweg_id {
        w.text_element("cbc:BuyerReference", leitweg)?;
    }

    write_ubl_party(&mut w, &data.seller, "cac:AccountingSupplierParty")?;
    write_ubl_party(&mut w, &data.buyer, "cac:AccountingCustomerParty")?;

    if let Some(payment) = &data.payment {
        w.start_element("cac:PaymentMeans")?;
        // 58 = SEPA credit transfer.
        w.text_element("cbc:PaymentMeansCode", "58")?;
        w.start_element("cac:PayeeFinancialAccount")?;
        w.text_element("cbc:ID", &payment.iban)?;
        if let Some(holder) = &payment.account_holder {
            w.text_element("cbc:Name", holder)?;
        }
        if let Some(bic) = &payment.bic {
            w.start_element("cac:FinancialInstitutionBranch")?;
            w.text_element("cbc:ID", bic)?;
            w.end_element("cac:FinancialInstitutionBranch")?;
        }
        w.end_element("cac:PayeeFinancialAccount")?;
        w.end_element("cac:PaymentMeans")?;
        if let Some(terms) = &payment.terms {
            w.start_element("cac:PaymentTerms")?;
            w.text_element("cbc:Note", terms)?;
            w.end_element("cac:PaymentTerms")?;
        }
    }

    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", data.vat_total, currency)?;
    for vb in &data.vat_breakdown {
        w.start_element("cac:TaxSubtotal")?;
        w.amount_element("cbc:TaxableAmount", vb.taxable_amount, currency)?;
        w.amount_element("cbc:TaxAmount", vb.tax_amount, currency)?;
        w.start_element("cac:TaxCategory")?;
        w.text_element("cbc:ID", &vb.category)?;
        w.text_element("cbc:Percent", &format_xml_amount(vb.rate))?;
        w.start_element("cac:TaxScheme")?;
        w.text_element("cbc:ID", "VAT")?;
        w.end_element("cac:TaxScheme")?;
        w.end_element("cac:TaxCategory")?;
        w.end_element("cac:TaxSubtotal")?;
    }
    w.end_element("cac:TaxTotal")?;

    w.start_element("cac:LegalMonetaryTotal")?;
    w.amount_element("cbc:LineExtensionAmount", data.subtotal, currency)?;
    w.amount_element("cbc:TaxExclusiveAmount", data.subtotal, currency)?;
    w.amount_element("cbc:TaxInclusiveAmount", data.total, currency)?;
    w.amount_element("cbc:PayableAmount", data.total, currency)?;
    w.end_element("cac:LegalMonetaryTotal")?;

    for line in &data.lines {
        write_ubl_line(&mut w, line, currency)?;
    }

    w.end_element("ubl:Invoice")?;
    w.into_string()
}

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn write_ubl_party(w: &mut XmlWriter, party: &TradeParty, element: &str) -> Result<(), KontorError> {
    w.start_element(element)?;
    w.start_element("cac:Party")?;

    w.start_element("cac:PostalAddress")?;
    w.text_element("cbc:StreetName", &party.address.street)?;
    w.text_element("cbc:CityName", &party.address.city)?;
    w.text_element("cbc:PostalZone", &party.address.postal_code)?;
    w.start_element("cac:Country")?;
    w.text_element("cbc:IdentificationCode", &party.address.country_code)?;
    w.end_element("cac:Country")?;
    w.end_element("cac:PostalAddress")?;

    if let Some(vat_id) = &party.vat_id {
        w.start_element("cac:PartyTaxScheme")?;
        w.text_element("cbc:CompanyID", vat_id)?;
        w.start_element("cac:TaxScheme")?;
        w.text_element("cbc:ID", "VAT")?;
        w.end_element("cac:TaxScheme")?;
        w.end_element("cac:PartyTaxScheme")?;
    }
    if let Some(tax_number) = &party.tax_number {
        w.start_element("cac:PartyTaxScheme")?;
        w.text_element("cbc:CompanyID", tax_number)?;
        w.start_element("cac:TaxScheme")?;
        w.text_element("cbc:ID", "FC")?;
        w.end_element("cac:TaxScheme")?;
        w.end_element("cac:PartyTaxScheme")?;
    }

    w.start_element("cac:PartyLegalEntity")?;
    w.text_element("cbc:RegistrationName", &party.name)?;
    w.end_element("cac:PartyLegalEntity")?;

    if let Some(email) = &party.email {
        w.start_element("cac:Contact")?;
        w.text_element("cbc:ElectronicMail", email)?;
        w.end_element("cac:Contact")?;
    }

    w.end_element("cac:Party")?;
    w.end_element(element)?;
    Ok(())
}

fn write_ubl_line(w: &mut XmlWriter, line: &InvoiceLine, currency: &str) -> Result<(), KontorError> {
    w.start_element("cac:InvoiceLine")?;
    w.text_element("cbc:ID", &line.position.to_string())?;
    w.quantity_element("cbc:InvoicedQuantity", line.quantity, &line.unit_code)?;
    w.amount_element("cbc:LineExtensionAmount", line.line_total, currency)?;

    w.start_element("cac:Item")?;
    if let Some(desc) = &line.description {
        w.text_element("cbc:Description", desc)?;
    }
    w.text_element("cbc:Name", &line.name)?;
    w.start_element("cac:ClassifiedTaxCategory")?;
    w.text_element("cbc:ID", &line.tax_category)?;
    w.text_element("cbc:Percent", &format_xml_amount(line.vat_rate))?;
    w.start_element("cac:TaxScheme")?;
    w.text_element("cbc:ID", "VAT")?;
    w.end_element("cac:TaxScheme")?;
    w.end_element("cac:ClassifiedTaxCategory")?;
    w.end_element("cac:Item")?;

    w.start_element("cac:Price")?;
    w.amount_element("cbc:PriceAmount", line.unit_price, currency)?;
    w.end_element("cac:Price")?;

    w.end_element("cac:InvoiceLine")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a UBL invoice document into the canonical model.
pub fn from_xrechnung(xml: &str) -> Result<EInvoiceData, KontorError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = UblParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "cbc:InvoicedQuantity" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"unitCode" {
                            if let Some(line) = p.current_line.as_mut() {
                                line.unit_code = String::from_utf8_lossy(&attr.value).to_string();
                            }
                        }
                    }
                }
                if name == "cac:InvoiceLine" {
                    p.current_line = Some(UblLine::default());
                }
                if name == "cac:TaxSubtotal" {
                    p.current_subtotal = Some(UblSubtotal::default());
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if !text.is_empty() {
                    p.handle_text(&path, &text);
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                if ended == "cac:InvoiceLine" {
                    if let Some(line) = p.current_line.take() {
                        p.lines.push(line);
                    }
                }
                if ended == "cac:TaxSubtotal" {
                    if let Some(sub) = p.current_subtotal.take() {
                        p.subtotals.push(sub);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(KontorError::Xml(format!("XML parse error: {e}"))),
            _ => {}
        }
    }

    p.into_data()
}

fn last_is(path: &[String], name: &str) -> bool {
    path.last().is_some_and(|l| l == name)
}

fn under(path: &[String], name: &str) -> bool {
    path.iter().any(|p| p == name)
}

#[derive(Default)]
struct UblParsed {
    number: Option<String>,
    issue_date: Option<String>,
    due_date: Option<String>,
    currency: Option<String>,
    leitweg_id: Option<String>,
    notes: Vec<String>,

    seller: UblParty,
    buyer: UblParty,

    iban: Option<String>,
    bic: Option<String>,
    account_holder: Option<String>,
    payment_terms: Option<String>,

    vat_total: Option<String>,
    subtotal: Option<String>,
    total: Option<String>,

    lines: Vec<UblLine>,
    current_line: Option<UblLine>,
    subtotals: Vec<UblSubtotal>,
    current_subtotal: Option<UblSubtotal>,

    // Scheme for the PartyTaxScheme currently being read.
    tax_scheme_company_id: Option<String>,
}

#[derive(Default)]
struct UblParty {
    name: Option<String>,
    street: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
    country: Option<String>,
    vat_id: Option<String>,
    tax_number: Option<String>,
    email: Option<String>,
}

#[derive(Default)]
struct UblLine {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    quantity: Option<String>,
    unit_code: String,
    unit_price: Option<String>,
    line_total: Option<String>,
    rate: Option<String>,
    category: Option<String>,
}

#[derive(Default)]
struct UblSubtotal {
    taxable: Option<String>,
    tax: Option<String>,
    category: Option<String>,
    rate: Option<String>,
}

impl UblParsed {
    fn handle_text(&mut self, path: &[String], text: &str) {
        if under(path, "cac:InvoiceLine") {
            let Some(line) = self.current_line.as_mut() else {
                return;
            };
            if last_is(path, "cbc:ID") {
                if under(path, "cac:ClassifiedTaxCategory") {
                    if !under(path, "cac:TaxScheme") {
                        line.category = Some(text.into());
                    }
                } else if !under(path, "cac:Item") && !under(path, "cac:Price") {
                    line.id = Some(text.into());
                }
            } else if last_is(path, "cbc:Name") {
                line.name = Some(text.into());
            } else if last_is(path, "cbc:Description") {
                line.description = Some(text.into());
            } else if last_is(path, "cbc:InvoicedQuantity") {
                line.quantity = Some(text.into());
            } else if last_is(path, "cbc:LineExtensionAmount") {
                line.line_total = Some(text.into());
            } else if last_is(path, "cbc:Percent") {
                line.rate = Some(text.into());
            } else if last_is(path, "cbc:PriceAmount") {
                line.unit_price = Some(text.into());
            }
            return;
        }

        if under(path, "cac:AccountingSupplierParty") {
            Self::party_text(&mut self.seller, path, text, &mut self.tax_scheme_company_id);
        } else if under(path, "cac:AccountingCustomerParty") {
            Self::party_text(&mut self.buyer, path, text, &mut self.tax_scheme_company_id);
        } else if under(path, "cac:TaxSubtotal") {
            let Some(sub) = self.current_subtotal.as_mut() else {
                return;
            };
            if last_is(path, "cbc:TaxableAmount") {
                sub.taxable = Some(text.into());
            } else if last_is(path, "cbc:TaxAmount") {
                sub.tax = Some(text.into());
            } else if last_is(path, "cbc:ID") && under(path, "cac:TaxCategory") {
                if !under(path, "cac:TaxScheme") {
                    sub.category = Some(text.into());
                }
            } else if last_is(path, "cbc:Percent") {
                sub.rate = Some(text.into());
            }
        } else if last_is(path, "cbc:TaxAmount") && under(path, "cac:TaxTotal") {
            self.vat_total = Some(text.into());
        } else if under(path, "cac:LegalMonetaryTotal") {
            if last_is(path, "cbc:LineExtensionAmount") {
                self.subtotal = Some(text.into());
            } else if last_is(path, "cbc:PayableAmount") {
                self.total = Some(text.into());
            }
        } else if under(path, "cac:PaymentMeans") {
            if last_is(path, "cbc:ID") {
                if under(path, "cac:FinancialInstitutionBranch") {
                    self.bic = Some(text.into());
                } else if under(path, "cac:PayeeFinancialAccount") {
                    self.iban = Some(text.into());
                }
            } else if last_is(path, "cbc:Name") && under(path, "cac:PayeeFinancialAccount") {
                self.account_holder = Some(text.into());
            }
        } else if last_is(path, "cbc:Note") && under(path, "cac:PaymentTerms") {
            self.payment_terms = Some(text.into());
        } else if path.len() == 2 {
            // Direct children of ubl:Invoice.
            match path[1].as_str() {
                "cbc:ID" => self.number = Some(text.into()),
                "cbc:IssueDate" => self.issue_date = Some(text.into()),
                "cbc:DueDate" => self.due_date = Some(text.into()),
                "cbc:DocumentCurrencyCode" => self.currency = Some(text.into()),
                "cbc:BuyerReference" => self.leitweg_id = Some(text.into()),
                "cbc:Note" => self.notes.push(text.into()),
                _ => {}
            }
        }
    }

    fn party_text(
        party: &mut UblParty,
        path: &[String],
        text: &str,
        pending_company_id: &mut Option<String>,
    ) {
        if last_is(path, "cbc:RegistrationName") {
            party.name = Some(text.into());
        } else if last_is(path, "cbc:StreetName") {
            party.street = Some(text.into());
        } else if last_is(path, "cbc:PostalZone") {
            party.postal_code = Some(text.into());
        } else if last_is(path, "cbc:CityName") {
            party.city = Some(text.into());
        } else if last_is(path, "cbc:IdentificationCode") {
            party.country = Some(text.into());
        } else if last_is(path, "cbc:ElectronicMail") {
            party.email = Some(text.into());
        } else if last_is(path, "cbc:CompanyID") && under(path, "cac:PartyTaxScheme") {
            // The tax scheme ID follows; stash until it arrives.
            *pending_company_id = Some(text.into());
        } else if last_is(path, "cbc:ID")
            && under(path, "cac:PartyTaxScheme")
            && under(path, "cac:TaxScheme")
        {
            if let Some(company_id) = pending_company_id.take() {
                match text {
                    "FC" => party.tax_number = Some(company_id),
                    _ => party.vat_id = Some(company_id),
                }
            }
        }
    }

    fn into_data(self) -> Result<EInvoiceData, KontorError> {
        let number = self
            .number
            .ok_or_else(|| KontorError::Xml("missing invoice number (cbc:ID)".into()))?;
        let issue_date = parse_iso_date(
            self.issue_date
                .as_deref()
                .ok_or_else(|| KontorError::Xml("missing issue date".into()))?,
        )?;
        let due_date = self.due_date.as_deref().map(parse_iso_date).transpose()?;

        let mut lines = Vec::with_capacity(self.lines.len());
        for (i, line) in self.lines.into_iter().enumerate() {
            lines.push(InvoiceLine {
                position: line
                    .id
                    .and_then(|id| id.parse().ok())
                    .unwrap_or(i as u32 + 1),
                name: line.name.unwrap_or_default(),
                description: line.description,
                quantity: parse_xml_amount(line.quantity.as_deref().unwrap_or("0"))?,
                unit_code: if line.unit_code.is_empty() {
                    "C62".into()
                } else {
                    line.unit_code
                },
                unit_price: parse_xml_amount(line.unit_price.as_deref().unwrap_or("0"))?,
                line_total: parse_xml_amount(line.line_total.as_deref().unwrap_or("0"))?,
                vat_rate: parse_xml_amount(line.rate.as_deref().unwrap_or("0"))?,
                tax_category: line.category.unwrap_or_else(|| "S".into()),
            });
        }

        let mut vat_breakdown = Vec::with_capacity(self.subtotals.len());
        for sub in self.subtotals {
            vat_breakdown.push(VatBreakdown {
                category: sub.category.unwrap_or_else(|| "S".into()),
                rate: parse_xml_amount(sub.rate.as_deref().unwrap_or("0"))?,
                taxable_amount: parse_xml_amount(sub.taxable.as_deref().unwrap_or("0"))?,
                tax_amount: parse_xml_amount(sub.tax.as_deref().unwrap_or("0"))?,
            });
        }

        let payment = self.iban.map(|iban| PaymentDetails {
            iban,
            bic: self.bic,
            account_holder: self.account_holder,
            terms: self.payment_terms,
        });

        Ok(EInvoiceData {
            invoice_number: number,
            issue_date,
            due_date,
            currency: self.currency.unwrap_or_else(|| "EUR".into()),
            leitweg_id: self.leitweg_id,
            seller: party_from(self.seller),
            buyer: party_from(self.buyer),
            lines,
            subtotal: parse_xml_amount(self.subtotal.as_deref().unwrap_or("0"))?,
            vat_total: parse_xml_amount(self.vat_total.as_deref().unwrap_or("0"))?,
            total: parse_xml_amount(self.total.as_deref().unwrap_or("0"))?,
            vat_breakdown,
            payment,
            notes: self.notes,
        })
    }
}

fn party_from(acc: UblParty) -> TradeParty {
    TradeParty {
        name: acc.name.unwrap_or_default(),
        address: PostalAddress {
            street: acc.street.unwrap_or_default(),
            postal_code: acc.postal_code.unwrap_or_default(),
            city: acc.city.unwrap_or_default(),
            country_code: acc.country.unwrap_or_default(),
        },
        vat_id: acc.vat_id,
        tax_number: acc.tax_number,
        email: acc.email,
    }
}

fn parse_iso_date(s: &str) -> Result<NaiveDate, KontorError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| KontorError::Xml(format!("invalid date '{s}': {e}")))
}
