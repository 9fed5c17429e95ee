//! SAT value normalization, applied before canonicalization.
//!
//! Normalization is a pure function of document content. It must leave the
//! document in the exact state the cadena original and the serializer will
//! see, so that repeated canonicalization is byte-stable.

use rust_decimal::{Decimal, RoundingStrategy};

use super::catalogs::{DEFAULT_CFDI_USAGE, PAYMENT_FORM_TO_BE_DEFINED};
use super::types::*;

/// Round a monetary amount to exactly 2 decimals, half away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a tax rate to exactly 6 decimals, half away from zero.
pub fn round6(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(6, RoundingStrategy::MidpointAwayFromZero)
}

/// Format a monetary amount with exactly 2 decimals, as the serializer and
/// the cadena original emit it. The value must already be rounded.
pub fn format_amount(value: Decimal) -> String {
    format!("{value:.2}")
}

/// Format a tax rate with exactly 6 decimals ("0.160000").
pub fn format_rate(value: Decimal) -> String {
    format!("{value:.6}")
}

/// Format a quantity without trailing zeros ("2", "1.5").
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Apply SAT normalization rules in place:
///
/// - monetary amounts to 2 decimals, rates to 6;
/// - `amount = round2(quantity * unit_price)` per line;
/// - `SubTotal` = Σ line amounts; `Total` = SubTotal − Descuento +
///   ΣTraslados − ΣRetenciones, each sub-sum rounded before combining;
/// - withheld entries ordered before transferred ones inside every tax list;
/// - document-level tax summary rebuilt from the lines;
/// - CFDI usage defaulted, PPD forcing payment form "99".
pub fn normalize(doc: &mut FiscalDocument) {
    for line in &mut doc.lines {
        line.unit_price = round6(line.unit_price);
        line.amount = round2(line.quantity * line.unit_price);
        for tax in &mut line.taxes {
            tax.base = round2(tax.base);
            match tax.factor {
                FactorType::Exempt => {
                    tax.rate = None;
                    tax.amount = None;
                }
                FactorType::Rate | FactorType::Quota => {
                    tax.rate = tax.rate.map(round6);
                    tax.amount = tax.amount.map(round2);
                }
            }
        }
        // Retenciones must precede Traslados. Stable sort keeps the
        // caller's relative order within each kind.
        line.taxes.sort_by_key(|t| match t.kind {
            TaxKind::Withheld => 0u8,
            TaxKind::Transferred => 1u8,
        });
    }

    doc.sub_total = round2(doc.lines.iter().map(|l| l.amount).sum());
    doc.discount = doc.discount.map(round2);
    doc.taxes = summarize_taxes(&doc.lines);

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
    doc.total = round2(doc.sub_total - discount + transferred - withheld);

    if doc.recipient.cfdi_usage.is_none() {
        doc.recipient.cfdi_usage = Some(DEFAULT_CFDI_USAGE.to_string());
    }
    if doc.payment_method == Some(PaymentMethod::DeferredOrPartial) {
        doc.payment_form = Some(PAYMENT_FORM_TO_BE_DEFINED.to_string());
    }
}

/// Aggregate line taxes into the document-level summary. Returns `None` when
/// no line carries taxes, so the document root gets no tax section.
fn summarize_taxes(lines: &[LineItem]) -> Option<TaxSummary> {
    let mut retentions: Vec<RetainedTax> = Vec::new();
    let mut transfers: Vec<TransferredTax> = Vec::new();
    let mut any = false;

    for line in lines {
        for tax in &line.taxes {
            any = true;
            match tax.kind {
                TaxKind::Withheld => {
                    let amount = tax.amount.unwrap_or(Decimal::ZERO);
                    match retentions.iter_mut().find(|r| r.code == tax.code) {
                        Some(existing) => existing.amount += amount,
                        None => retentions.push(RetainedTax {
                            code: tax.code.clone(),
                            amount,
                        }),
                    }
                }
                TaxKind::Transferred if tax.factor == FactorType::Exempt => {
                    // Exempt groups carry no rate or amount; one entry per code.
                    let present = transfers
                        .iter()
                        .any(|t| t.code == tax.code && t.factor == FactorType::Exempt);
                    if !present {
                        transfers.push(TransferredTax {
                            code: tax.code.clone(),
                            factor: FactorType::Exempt,
                            rate: None,
                            amount: None,
                        });
                    }
                }
                TaxKind::Transferred => {
                    let amount = tax.amount.unwrap_or(Decimal::ZERO);
                    let slot = transfers.iter_mut().find(|t| {
                        t.code == tax.code && t.factor == tax.factor && t.rate == tax.rate
                    });
                    match slot {
                        Some(existing) => {
                            existing.amount =
                                Some(existing.amount.unwrap_or(Decimal::ZERO) + amount);
                        }
                        None => transfers.push(TransferredTax {
                            code: tax.code.clone(),
                            factor: tax.factor,
                            rate: tax.rate,
                            amount: Some(amount),
                        }),
                    }
                }
            }
        }
    }

    if !any {
        return None;
    }

    for r in &mut retentions {
        r.amount = round2(r.amount);
    }
    for t in &mut transfers {
        t.amount = t.amount.map(round2);
    }
    let total_withheld = round2(retentions.iter().map(|r| r.amount).sum());
    let total_transferred = round2(
        transfers
            .iter()
            .filter_map(|t| t.amount)
            .sum::<Decimal>(),
    );

    Some(TaxSummary {
        retentions,
        transfers,
        total_withheld,
        total_transferred,
    })
}
