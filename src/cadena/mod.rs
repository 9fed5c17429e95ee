//! Cadena original generation.
//!
//! The cadena original is the canonical pipe-delimited string the issuer
//! signs. It is a pure function of document content: same document, same
//! bytes, regardless of signing or network state.
//!
//! Field order is mandated by the authority's published transformation and
//! is not negotiable. In particular, when a document-level tax section
//! exists, retention fields come first, then the retentions total, then the
//! document's SubTotal re-emitted, then the transfer fields, then the
//! transfers total. A string with the wrong order still signs fine and only
//! fails later, at certification, so the ordering tests here matter.

use crate::core::{
    format_amount, format_quantity, format_rate, FiscalDocument, LineItem, Party, TaxSummary,
};

/// Fecha format inside the cadena: local time, second precision.
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Accumulates cadena fields. Absent optional values are pushed as empty
/// strings so the pipe count never varies with content.
struct Cadena {
    fields: Vec<String>,
}

impl Cadena {
    fn new() -> Self {
        Self { fields: Vec::new() }
    }

    fn push(&mut self, value: impl Into<String>) {
        self.fields.push(value.into());
    }

    fn push_opt(&mut self, value: Option<&str>) {
        self.fields.push(value.unwrap_or("").to_string());
    }

    fn finish(self) -> String {
        format!("||{}||", self.fields.join("|"))
    }
}

/// Generate the cadena original for a document.
pub fn cadena_original(doc: &FiscalDocument) -> String {
    let mut c = Cadena::new();

    c.push("4.0");
    c.push_opt(doc.series.as_deref());
    c.push_opt(doc.folio.as_deref());
    c.push(doc.issued_at.format(DATETIME_FORMAT).to_string());
    c.push_opt(doc.payment_form.as_deref());
    c.push(format_amount(doc.sub_total));
    c.push_opt(doc.discount.map(format_amount).as_deref());
    c.push(doc.currency.as_str());
    c.push(format_amount(doc.total));
    c.push(doc.doc_type.code());
    c.push_opt(doc.payment_method.map(|m| m.code().to_string()).as_deref());
    c.push(doc.expedition_place.as_str());

    push_issuer(&mut c, &doc.issuer);
    push_recipient(&mut c, &doc.recipient);

    for line in &doc.lines {
        push_line(&mut c, line);
    }

    if let Some(taxes) = &doc.taxes {
        push_tax_summary(&mut c, taxes, doc.sub_total);
    }

    c.finish()
}

fn push_issuer(c: &mut Cadena, issuer: &Party) {
    c.push(issuer.rfc.as_str());
    c.push(issuer.name.as_str());
    c.push_opt(issuer.fiscal_regime.as_deref());
}

fn push_recipient(c: &mut Cadena, recipient: &Party) {
    c.push(recipient.rfc.as_str());
    c.push(recipient.name.as_str());
    c.push_opt(recipient.zip.as_deref());
    c.push_opt(recipient.cfdi_usage.as_deref());
}

fn push_line(c: &mut Cadena, line: &LineItem) {
    c.push(line.product_code.as_str());
    c.push(format_quantity(line.quantity));
    c.push(line.unit.as_str());
    c.push(line.description.as_str());
    c.push(line.unit_price.to_string());
    c.push(format_amount(line.amount));
    // Line-level entries include Base; the normalizer has already put
    // withheld entries ahead of transferred ones.
    for tax in &line.taxes {
        c.push(format_amount(tax.base));
        c.push(tax.code.as_str());
        c.push(tax.factor.code());
        c.push_opt(tax.rate.map(format_rate).as_deref());
        c.push_opt(tax.amount.map(format_amount).as_deref());
    }
}

/// Document-level section: retentions, retentions total, the SubTotal
/// re-emission, transfers, transfers total. Base is omitted at this level.
fn push_tax_summary(c: &mut Cadena, taxes: &TaxSummary, sub_total: rust_decimal::Decimal) {
    for retention in &taxes.retentions {
        c.push(retention.code.as_str());
        c.push(format_amount(retention.amount));
    }
    c.push(format_amount(taxes.total_withheld));
    c.push(format_amount(sub_total));
    for transfer in &taxes.transfers {
        c.push(transfer.code.as_str());
        c.push(transfer.factor.code());
        c.push_opt(transfer.rate.map(format_rate).as_deref());
        c.push_opt(transfer.amount.map(format_amount).as_deref());
    }
    c.push(format_amount(taxes.total_transferred));
}
