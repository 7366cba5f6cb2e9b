//! ZUGFeRD (UN/CEFACT CII) generation and parsing.

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;

use super::xml_utils::{XmlResult, XmlWriter, format_xml_amount, parse_xml_amount};
use super::{ZUGFERD_GUIDELINE_ID, cii_ns};
use crate::core::{
    EInvoiceData, InvoiceLine, KontorError, PaymentDetails, PostalAddress, TradeParty,
    VatBreakdown,
};

/// CII date format qualifier for `YYYYMMDD`.
const CII_DATE_FORMAT: &str = "102";

/// Generate a ZUGFeRD CII XML document (Factur-X comfort profile).
pub fn to_zugferd(data: &EInvoiceData) -> XmlResult {
    let currency = &data.currency;
    let mut w = XmlWriter::new()?;

    w.start_element_with_attrs(
        "rsm:CrossIndustryInvoice",
        &[
            ("xmlns:rsm", cii_ns::RSM),
            ("xmlns:ram", cii_ns::RAM),
            ("xmlns:udt", cii_ns::UDT),
        ],
    )?;

    // --- ExchangedDocumentContext ---
    w.start_element("rsm:ExchangedDocumentContext")?;
    w.start_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.text_element("ram:ID", ZUGFERD_GUIDELINE_ID)?;
    w.end_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.end_element("rsm:ExchangedDocumentContext")?;

    // --- ExchangedDocument ---
    w.start_element("rsm:ExchangedDocument")?;
    w.text_element("ram:ID", &data.invoice_number)?;
    w.text_element("ram:TypeCode", "380")?;
    w.start_element("ram:IssueDateTime")?;
    write_cii_date(&mut w, data.issue_date)?;
    w.end_element("ram:IssueDateTime")?;
    for note in &data.notes {
        w.start_element("ram:IncludedNote")?;
        w.text_element("ram:Content", note)?;
        w.end_element("ram:IncludedNote")?;
    }
    w.end_element("rsm:ExchangedDocument")?;

    // --- SupplyChainTradeTransaction ---
    w.start_element("rsm:SupplyChainTradeTransaction")?;

    for line in &data.lines {
        write_cii_line(&mut w, line)?;
    }

    w.start_element("ram:ApplicableHeaderTradeAgreement")?;
    if let Some(leitweg) = &data.leitweg_id {
        w.text_element("ram:BuyerReference", leitweg)?;
    }
    write_cii_party(&mut w, &data.seller, "ram:SellerTradeParty")?;
    write_cii_party(&mut w, &data.buyer, "ram:BuyerTradeParty")?;
    w.end_element("ram:ApplicableHeaderTradeAgreement")?;

    w.start_element("ram:ApplicableHeaderTradeDelivery")?;
    w.end_element("ram:ApplicableHeaderTradeDelivery")?;

    w.start_element("ram:ApplicableHeaderTradeSettlement")?;
    w.text_element("ram:InvoiceCurrencyCode", currency)?;

    if let Some(payment) = &data.payment {
        w.start_element("ram:SpecifiedTradeSettlementPaymentMeans")?;
        w.text_element("ram:TypeCode", "58")?;
        w.start_element("ram:PayeePartyCreditorFinancialAccount")?;
        w.text_element("ram:IBANID", &payment.iban)?;
        if let Some(holder) = &payment.account_holder {
            w.text_element("ram:AccountName", holder)?;
        }
        w.end_element("ram:PayeePartyCreditorFinancialAccount")?;
        if let Some(bic) = &payment.bic {
            w.start_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
            w.text_element("ram:BICID", bic)?;
            w.end_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
        }
        w.end_element("ram:SpecifiedTradeSettlementPaymentMeans")?;
    }

    for vb in &data.vat_breakdown {
        w.start_element("ram:ApplicableTradeTax")?;
        w.text_element("ram:CalculatedAmount", &format_xml_amount(vb.tax_amount))?;
        w.text_element("ram:TypeCode", "VAT")?;
        w.text_element("ram:BasisAmount", &format_xml_amount(vb.taxable_amount))?;
        w.text_element("ram:CategoryCode", &vb.category)?;
        w.text_element("ram:RateApplicablePercent", &format_xml_amount(vb.rate))?;
        w.end_element("ram:ApplicableTradeTax")?;
    }

    if data.due_date.is_some() || data.payment.as_ref().is_some_and(|p| p.terms.is_some()) {
        w.start_element("ram:SpecifiedTradePaymentTerms")?;
        if let Some(terms) = data.payment.as_ref().and_then(|p| p.terms.as_deref()) {
            w.text_element("ram:Description", terms)?;
        }
        if let Some(due) = data.due_date {
            w.start_element("ram:DueDateDateTime")?;
            write_cii_date(&mut w, due)?;
            w.end_element("ram:DueDateDateTime")?;
        }
        w.end_element("ram:SpecifiedTradePaymentTerms")?;
    }

    w.start_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;
    w.text_element("ram:LineTotalAmount", &format_xml_amount(data.subtotal))?;
    w.text_element("ram:TaxBasisTotalAmount", &format_xml_amount(data.subtotal))?;
    w.amount_element("ram:TaxTotalAmount", data.vat_total, currency)?;
    w.text_element("ram:GrandTotalAmount", &format_xml_amount(data.total))?;
    w.text_element("ram:DuePayableAmount", &format_xml_amount(data.total))?;
    w.end_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;

    w.end_element("ram:ApplicableHeaderTradeSettlement")?;
    w.end_element("rsm:SupplyChainTradeTransaction")?;
    w.end_element("rsm:CrossIndustryInvoice")?;

    w.into_string()
}

fn write_cii_date(w: &mut XmlWriter, date: NaiveDate) -> Result<(), KontorError> {
    w.text_element_with_attrs(
        "udt:DateTimeString",
        &date.format("%Y%m%d").to_string(),
        &[("format", CII_DATE_FORMAT)],
    )?;
    Ok(())
}

fn write_cii_line(w: &mut XmlWriter, line: &InvoiceLine) -> Result<(), KontorError> {
    w.start_element("ram:IncludedSupplyChainTradeLineItem")?;

    w.start_element("ram:AssociatedDocumentLineDocument")?;
    w.text_element("ram:LineID", &line.position.to_string())?;
    w.end_element("ram:AssociatedDocumentLineDocument")?;

    w.start_element("ram:SpecifiedTradeProduct")?;
    w.text_element("ram:Name", &line.name)?;
    if let Some(desc) = &line.description {
        w.text_element("ram:Description", desc)?;
    }
    w.end_element("ram:SpecifiedTradeProduct")?;

    w.start_element("ram:SpecifiedLineTradeAgreement")?;
    w.start_element("ram:NetPriceProductTradePrice")?;
    w.text_element("ram:ChargeAmount", &format_xml_amount(line.unit_price))?;
    w.end_element("ram:NetPriceProductTradePrice")?;
    w.end_element("ram:SpecifiedLineTradeAgreement")?;

    w.start_element("ram:SpecifiedLineTradeDelivery")?;
    w.quantity_element("ram:BilledQuantity", line.quantity, &line.unit_code)?;
    w.end_element("ram:SpecifiedLineTradeDelivery")?;

    w.start_element("ram:SpecifiedLineTradeSettlement")?;
    w.start_element("ram:ApplicableTradeTax")?;
    w.text_element("ram:TypeCode", "VAT")?;
    w.text_element("ram:CategoryCode", &line.tax_category)?;
    w.text_element("ram:RateApplicablePercent", &format_xml_amount(line.vat_rate))?;
    w.end_element("ram:ApplicableTradeTax")?;
    w.start_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
    w.text_element("ram:LineTotalAmount", &format_xml_amount(line.line_total))?;
    w.end_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
    w.end_element("ram:SpecifiedLineTradeSettlement")?;

    w.end_element("ram:IncludedSupplyChainTradeLineItem")?;
    Ok(())
}

fn write_cii_party(w: &mut XmlWriter, party: &TradeParty, element: &str) -> Result<(), KontorError> {
    w.start_element(element)?;
    w.text_element("ram:Name", &party.name)?;
    w.start_element("ram:PostalTradeAddress")?;
    w.text_element("ram:PostcodeCode", &party.address.postal_code)?;
    w.text_element("ram:LineOne", &party.address.street)?;
    w.text_element("ram:CityName", &party.address.city)?;
    w.text_element("ram:CountryID", &party.address.country_code)?;
    w.end_element("ram:PostalTradeAddress")?;
    if let Some(vat_id) = &party.vat_id {
        w.start_element("ram:SpecifiedTaxRegistration")?;
        w.text_element_with_attrs("ram:ID", vat_id, &[("schemeID", "VA")])?;
        w.end_element("ram:SpecifiedTaxRegistration")?;
    }
    if let Some(tax_number) = &party.tax_number {
        w.start_element("ram:SpecifiedTaxRegistration")?;
        w.text_element_with_attrs("ram:ID", tax_number, &[("schemeID", "FC")])?;
        w.end_element("ram:SpecifiedTaxRegistration")?;
    }
    w.end_element(element)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a ZUGFeRD CII XML document into the canonical model.
pub fn from_zugferd(xml: &str) -> Result<EInvoiceData, KontorError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = CiiParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "ram:ID" {
                    p.current_scheme_id = None;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"schemeID" {
                            p.current_scheme_id =
                                Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
                if name == "ram:BilledQuantity" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"unitCode" {
                            if let Some(line) = p.current_line.as_mut() {
                                line.unit_code = String::from_utf8_lossy(&attr.value).to_string();
                            }
                        }
                    }
                }
                if name == "ram:IncludedSupplyChainTradeLineItem" {
                    p.current_line = Some(CiiLine::default());
                }
                if name == "ram:ApplicableTradeTax" && !in_line(&path) {
                    p.current_breakdown = Some(CiiBreakdown::default());
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
                if ended == "ram:IncludedSupplyChainTradeLineItem" {
                    if let Some(line) = p.current_line.take() {
                        p.lines.push(line);
                    }
                }
                if ended == "ram:ApplicableTradeTax" && !in_line(&path) {
                    if let Some(vb) = p.current_breakdown.take() {
                        p.breakdowns.push(vb);
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

fn in_line(path: &[String]) -> bool {
    path.iter().any(|p| p == "ram:IncludedSupplyChainTradeLineItem")
}

fn last_is(path: &[String], name: &str) -> bool {
    path.last().is_some_and(|l| l == name)
}

fn under(path: &[String], name: &str) -> bool {
    path.iter().any(|p| p == name)
}

#[derive(Default)]
struct CiiParsed {
    number: Option<String>,
    issue_date: Option<String>,
    due_date: Option<String>,
    currency: Option<String>,
    leitweg_id: Option<String>,
    notes: Vec<String>,

    seller: PartyAcc,
    buyer: PartyAcc,

    iban: Option<String>,
    bic: Option<String>,
    account_holder: Option<String>,
    payment_terms: Option<String>,

    subtotal: Option<String>,
    vat_total: Option<String>,
    total: Option<String>,

    lines: Vec<CiiLine>,
    current_line: Option<CiiLine>,
    breakdowns: Vec<CiiBreakdown>,
    current_breakdown: Option<CiiBreakdown>,

    current_scheme_id: Option<String>,
}

#[derive(Default)]
struct PartyAcc {
    name: Option<String>,
    street: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
    country: Option<String>,
    vat_id: Option<String>,
    tax_number: Option<String>,
}

#[derive(Default, Clone)]
struct CiiLine {
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

#[derive(Default, Clone)]
struct CiiBreakdown {
    tax_amount: Option<String>,
    basis: Option<String>,
    category: Option<String>,
    rate: Option<String>,
}

impl CiiParsed {
    fn handle_text(&mut self, path: &[String], text: &str) {
        // Line context first — several element names repeat at header level.
        if in_line(path) {
            let Some(line) = self.current_line.as_mut() else {
                return;
            };
            if last_is(path, "ram:LineID") {
                line.id = Some(text.into());
            } else if last_is(path, "ram:Name") {
                line.name = Some(text.into());
            } else if last_is(path, "ram:Description") {
                line.description = Some(text.into());
            } else if last_is(path, "ram:ChargeAmount") {
                line.unit_price = Some(text.into());
            } else if last_is(path, "ram:BilledQuantity") {
                line.quantity = Some(text.into());
            } else if last_is(path, "ram:RateApplicablePercent") {
                line.rate = Some(text.into());
            } else if last_is(path, "ram:CategoryCode") {
                line.category = Some(text.into());
            } else if last_is(path, "ram:LineTotalAmount") {
                line.line_total = Some(text.into());
            }
            return;
        }

        if last_is(path, "ram:ID") && under(path, "rsm:ExchangedDocument") {
            self.number = Some(text.into());
        } else if last_is(path, "udt:DateTimeString") {
            if under(path, "ram:IssueDateTime") {
                self.issue_date = Some(text.into());
            } else if under(path, "ram:DueDateDateTime") {
                self.due_date = Some(text.into());
            }
        } else if last_is(path, "ram:Content") && under(path, "ram:IncludedNote") {
            self.notes.push(text.into());
        } else if last_is(path, "ram:BuyerReference") {
            self.leitweg_id = Some(text.into());
        } else if last_is(path, "ram:InvoiceCurrencyCode") {
            self.currency = Some(text.into());
        } else if under(path, "ram:SellerTradeParty") {
            Self::party_text(&mut self.seller, path, text, &self.current_scheme_id);
        } else if under(path, "ram:BuyerTradeParty") {
            Self::party_text(&mut self.buyer, path, text, &self.current_scheme_id);
        } else if last_is(path, "ram:IBANID") {
            self.iban = Some(text.into());
        } else if last_is(path, "ram:BICID") {
            self.bic = Some(text.into());
        } else if last_is(path, "ram:AccountName") {
            self.account_holder = Some(text.into());
        } else if last_is(path, "ram:Description") && under(path, "ram:SpecifiedTradePaymentTerms")
        {
            self.payment_terms = Some(text.into());
        } else if under(path, "ram:ApplicableTradeTax") {
            let Some(vb) = self.current_breakdown.as_mut() else {
                return;
            };
            if last_is(path, "ram:CalculatedAmount") {
                vb.tax_amount = Some(text.into());
            } else if last_is(path, "ram:BasisAmount") {
                vb.basis = Some(text.into());
            } else if last_is(path, "ram:CategoryCode") {
                vb.category = Some(text.into());
            } else if last_is(path, "ram:RateApplicablePercent") {
                vb.rate = Some(text.into());
            }
        } else if under(path, "ram:SpecifiedTradeSettlementHeaderMonetarySummation") {
            if last_is(path, "ram:LineTotalAmount") {
                self.subtotal = Some(text.into());
            } else if last_is(path, "ram:TaxTotalAmount") {
                self.vat_total = Some(text.into());
            } else if last_is(path, "ram:GrandTotalAmount") {
                self.total = Some(text.into());
            }
        }
    }

    fn party_text(party: &mut PartyAcc, path: &[String], text: &str, scheme: &Option<String>) {
        if last_is(path, "ram:Name") && !under(path, "ram:PostalTradeAddress") {
            party.name = Some(text.into());
        } else if last_is(path, "ram:LineOne") {
            party.street = Some(text.into());
        } else if last_is(path, "ram:PostcodeCode") {
            party.postal_code = Some(text.into());
        } else if last_is(path, "ram:CityName") {
            party.city = Some(text.into());
        } else if last_is(path, "ram:CountryID") {
            party.country = Some(text.into());
        } else if last_is(path, "ram:ID") && under(path, "ram:SpecifiedTaxRegistration") {
            match scheme.as_deref() {
                Some("FC") => party.tax_number = Some(text.into()),
                _ => party.vat_id = Some(text.into()),
            }
        }
    }

    fn into_data(self) -> Result<EInvoiceData, KontorError> {
        let number = self
            .number
            .ok_or_else(|| KontorError::Xml("missing invoice number (ram:ID)".into()))?;
        let issue_date = parse_cii_date(
            self.issue_date
                .as_deref()
                .ok_or_else(|| KontorError::Xml("missing issue date".into()))?,
        )?;
        let due_date = self.due_date.as_deref().map(parse_cii_date).transpose()?;

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

        let mut vat_breakdown = Vec::with_capacity(self.breakdowns.len());
        for vb in self.breakdowns {
            vat_breakdown.push(VatBreakdown {
                category: vb.category.unwrap_or_else(|| "S".into()),
                rate: parse_xml_amount(vb.rate.as_deref().unwrap_or("0"))?,
                taxable_amount: parse_xml_amount(vb.basis.as_deref().unwrap_or("0"))?,
                tax_amount: parse_xml_amount(vb.tax_amount.as_deref().unwrap_or("0"))?,
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

fn party_from(acc: PartyAcc) -> TradeParty {
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
        email: None,
    }
}

fn parse_cii_date(s: &str) -> Result<NaiveDate, KontorError> {
    NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
        .map_err(|e| KontorError::Xml(format!("invalid CII date '{s}': {e}")))
}
