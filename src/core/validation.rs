//! Build-time document validation against SAT CFDI 4.0 rules.
//!
//! Runs after normalization and before any cryptographic work. Returns all
//! errors found, not just the first.

use rust_decimal::Decimal;

use super::catalogs;
use super::error::ValidationError;
use super::normalize::round2;
use super::types::*;

/// Validate a normalized document. An empty result means the document may
/// proceed to canonicalization and signing.
pub fn validate(doc: &FiscalDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if doc.currency.trim().is_empty() {
        errors.push(ValidationError::new(
            "currency",
            "currency code must not be empty",
        ));
    } else if doc.currency.len() != 3 {
        errors.push(ValidationError::new(
            "currency",
            "currency code must be 3 characters (ISO 4217)",
        ));
    }

    if !is_zip(&doc.expedition_place) {
        errors.push(ValidationError::with_rule(
            "expedition_place",
            "LugarExpedicion must be a 5-digit zip code",
            "CFDI40111",
        ));
    }

    validate_issuer(&doc.issuer, &mut errors);
    validate_recipient(doc, &mut errors);
    validate_payment(doc, &mut errors);

    if doc.lines.is_empty() {
        errors.push(ValidationError::with_rule(
            "lines",
            "document must have at least one line item",
            "CFDI40153",
        ));
    }
    for (i, line) in doc.lines.iter().enumerate() {
        validate_line(line, i, &mut errors);
    }

    errors.extend(validate_arithmetic(doc));

    errors
}

fn validate_issuer(issuer: &Party, errors: &mut Vec<ValidationError>) {
    if !is_rfc(&issuer.rfc) {
        errors.push(ValidationError::with_rule(
            "issuer.rfc",
            "issuer RFC must be 12 or 13 alphanumeric characters",
            "CFDI40110",
        ));
    }
    if issuer.name.trim().is_empty() {
        errors.push(ValidationError::new(
            "issuer.name",
            "issuer legal name must not be empty",
        ));
    }
    match &issuer.fiscal_regime {
        None => errors.push(ValidationError::with_rule(
            "issuer.fiscal_regime",
            "issuer fiscal regime is required",
            "CFDI40113",
        )),
        Some(code) if !catalogs::is_known_fiscal_regime(code) => {
            errors.push(ValidationError::with_rule(
                "issuer.fiscal_regime",
                format!("'{code}' is not a known c_RegimenFiscal code"),
                "CFDI40113",
            ));
        }
        Some(_) => {}
    }
}

fn validate_recipient(doc: &FiscalDocument, errors: &mut Vec<ValidationError>) {
    let recipient = &doc.recipient;
    if !is_rfc(&recipient.rfc) {
        errors.push(ValidationError::with_rule(
            "recipient.rfc",
            "recipient RFC must be 12 or 13 alphanumeric characters",
            "CFDI40130",
        ));
    }
    if recipient.name.trim().is_empty() {
        errors.push(ValidationError::new(
            "recipient.name",
            "recipient legal name must not be empty",
        ));
    }
    match &recipient.zip {
        Some(zip) if !is_zip(zip) => errors.push(ValidationError::with_rule(
            "recipient.zip",
            "DomicilioFiscalReceptor must be a 5-digit zip code",
            "CFDI40133",
        )),
        None => errors.push(ValidationError::with_rule(
            "recipient.zip",
            "recipient domicile zip is required",
            "CFDI40133",
        )),
        Some(_) => {}
    }
    if let Some(usage) = &recipient.cfdi_usage {
        if !catalogs::is_known_cfdi_usage(usage) {
            errors.push(ValidationError::with_rule(
                "recipient.cfdi_usage",
                format!("'{usage}' is not a known c_UsoCFDI code"),
                "CFDI40143",
            ));
        }
    }
}

fn validate_payment(doc: &FiscalDocument, errors: &mut Vec<ValidationError>) {
    if let Some(form) = &doc.payment_form {
        if !catalogs::is_known_payment_form(form) {
            errors.push(ValidationError::new(
                "payment_form",
                format!("'{form}' is not a known c_FormaPago code"),
            ));
        }
    }
    // PUE promises payment at issue time; "99" (to be defined) contradicts it.
    if doc.payment_method == Some(PaymentMethod::Single)
        && doc.payment_form.as_deref() == Some(catalogs::PAYMENT_FORM_TO_BE_DEFINED)
    {
        errors.push(ValidationError::with_rule(
            "payment_form",
            "payment form '99' is inconsistent with payment method PUE",
            "CFDI40117",
        ));
    }
}

fn validate_line(line: &LineItem, index: usize, errors: &mut Vec<ValidationError>) {
    let path = |field: &str| format!("lines[{index}].{field}");

    if line.product_code.trim().is_empty() {
        errors.push(ValidationError::new(
            path("product_code"),
            "ClaveProdServ must not be empty",
        ));
    }
    if line.description.trim().is_empty() {
        errors.push(ValidationError::new(
            path("description"),
            "description must not be empty",
        ));
    }
    if line.quantity <= Decimal::ZERO {
        errors.push(ValidationError::new(
            path("quantity"),
            "quantity must be positive",
        ));
    }
    if line.unit_price < Decimal::ZERO {
        errors.push(ValidationError::new(
            path("unit_price"),
            "unit price must not be negative",
        ));
    }
    if line.amount != round2(line.quantity * line.unit_price) {
        errors.push(ValidationError::new(
            path("amount"),
            format!(
                "amount {} does not equal round2(quantity * unit_price) = {}",
                line.amount,
                round2(line.quantity * line.unit_price)
            ),
        ));
    }

    for (j, tax) in line.taxes.iter().enumerate() {
        let tax_path = |field: &str| format!("lines[{index}].taxes[{j}].{field}");
        if !catalogs::is_known_tax_code(&tax.code) {
            errors.push(ValidationError::new(
                tax_path("code"),
                format!("'{}' is not a known c_Impuesto code", tax.code),
            ));
        }
        match tax.factor {
            FactorType::Exempt => {
                if tax.rate.is_some() || tax.amount.is_some() {
                    errors.push(ValidationError::new(
                        tax_path("factor"),
                        "exempt tax entries must not carry a rate or amount",
                    ));
                }
            }
            FactorType::Rate => {
                match tax.rate {
                    None => errors.push(ValidationError::new(
                        tax_path("rate"),
                        "factor 'Tasa' requires a rate",
                    )),
                    Some(rate) if rate < Decimal::ZERO || rate > Decimal::ONE => {
                        errors.push(ValidationError::new(
                            tax_path("rate"),
                            "rate must be between 0 and 1",
                        ));
                    }
                    Some(_) => {}
                }
                if tax.amount.is_none() {
                    errors.push(ValidationError::new(
                        tax_path("amount"),
                        "factor 'Tasa' requires an amount",
                    ));
                }
            }
            FactorType::Quota => {
                if tax.amount.is_none() {
                    errors.push(ValidationError::new(
                        tax_path("amount"),
                        "factor 'Cuota' requires an amount",
                    ));
                }
            }
        }
    }
}

/// Check totals against the normalization rules. Useful on its own to
/// re-check documents loaded from storage.
pub fn validate_arithmetic(doc: &FiscalDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let expected_sub_total = round2(doc.lines.iter().map(|l| l.amount).sum());
    if doc.sub_total != expected_sub_total {
        errors.push(ValidationError::with_rule(
            "sub_total",
            format!(
                "SubTotal {} does not match sum of line amounts {}",
                doc.sub_total, expected_sub_total
            ),
            "CFDI40108",
        ));
    }

    let withheld = doc
        .taxes
        .as_ref()
        .map(|t| t.total_withheld)
        .unwrap_or(Decimal::ZERO);
    let transferred = doc
        .taxes
        .as_ref()
        .map(|t| t.total_transferred)
        .unwrap_or(Decimal::ZERO);
    let discount = doc.discount.unwrap_or(Decimal::ZERO);
    let expected_total = round2(doc.sub_total - discount + transferred - withheld);
    if doc.total != expected_total {
        errors.push(ValidationError::with_rule(
            "total",
            format!(
                "Total {} does not match SubTotal {} - Descuento {} + Traslados {} - Retenciones {}",
                doc.total, doc.sub_total, discount, transferred, withheld
            ),
            "CFDI40109",
        ));
    }

    errors
}

/// RFC: 12 characters for companies, 13 for individuals. Uppercase letters
/// (Ñ and & allowed in the name part), then 6 date digits, then a 3-char
/// homoclave.
fn is_rfc(value: &str) -> bool {
    let len = value.chars().count();
    if len != 12 && len != 13 {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == 'Ñ' || c == '&')
}

fn is_zip(value: &str) -> bool {
    value.len() == 5 && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc_format() {
        assert!(is_rfc("EKU9003173C9")); // 12, company
        assert!(is_rfc("XAXX010101000")); // 13, individual
        assert!(is_rfc("ÑAD861024AB1"));
        assert!(!is_rfc("eku9003173c9"));
        assert!(!is_rfc("SHORT"));
        assert!(!is_rfc("TOOLONGRFC12345"));
    }

    #[test]
    fn zip_format() {
        assert!(is_zip("64000"));
        assert!(!is_zip("6400"));
        assert!(!is_zip("6400A"));
        assert!(!is_zip("640000"));
    }
}
