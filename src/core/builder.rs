//! Typed builders for fiscal documents.
//!
//! Builders assemble a draft, run SAT normalization, then validate. A
//! document that comes out of `build()` is ready for canonicalization.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use super::error::DocumentError;
use super::normalize::{normalize, round2};
use super::types::*;
use super::validation::validate;

/// Builder for income, expense, payroll and payment documents.
///
/// For payroll and payment documents prefer [`PayrollBuilder`] and
/// [`PaymentBuilder`], which derive the mandated line and totals.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    doc: FiscalDocument,
}

impl DocumentBuilder {
    pub fn new(doc_type: DocumentType, issued_at: NaiveDateTime) -> Self {
        Self {
            doc: FiscalDocument {
                doc_type,
                series: None,
                folio: None,
                issued_at,
                expedition_place: String::new(),
                currency: "MXN".to_string(),
                payment_method: None,
                payment_form: None,
                sub_total: Decimal::ZERO,
                discount: None,
                total: Decimal::ZERO,
                status: DocumentStatus::Draft,
                issuer: Party::empty(),
                recipient: Party::empty(),
                lines: Vec::new(),
                taxes: None,
                complement: None,
                signature: None,
                stamp: None,
                cancellation: None,
            },
        }
    }

    pub fn series(mut self, series: impl Into<String>) -> Self {
        self.doc.series = Some(series.into());
        self
    }

    pub fn folio(mut self, folio: impl Into<String>) -> Self {
        self.doc.folio = Some(folio.into());
        self
    }

    pub fn expedition_place(mut self, zip: impl Into<String>) -> Self {
        self.doc.expedition_place = zip.into();
        self
    }

    /// Currency code (default "MXN").
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.doc.currency = currency.into();
        self
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.doc.payment_method = Some(method);
        self
    }

    pub fn payment_form(mut self, form: impl Into<String>) -> Self {
        self.doc.payment_form = Some(form.into());
        self
    }

    /// Document-level discount (Descuento).
    pub fn discount(mut self, discount: Decimal) -> Self {
        self.doc.discount = Some(discount);
        self
    }

    pub fn issuer(mut self, issuer: Party) -> Self {
        self.doc.issuer = issuer;
        self
    }

    pub fn recipient(mut self, recipient: Party) -> Self {
        self.doc.recipient = recipient;
        self
    }

    pub fn add_line(mut self, line: LineItem) -> Self {
        self.doc.lines.push(line);
        self
    }

    pub fn complement(mut self, complement: Complement) -> Self {
        self.doc.complement = Some(complement);
        self
    }

    /// Normalize and validate, producing a draft document.
    pub fn build(self) -> Result<FiscalDocument, DocumentError> {
        let mut doc = self.doc;
        normalize(&mut doc);
        let errors = validate(&doc);
        if errors.is_empty() {
            Ok(doc)
        } else {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Err(DocumentError::Validation(joined))
        }
    }

    /// Normalize without validating. Useful for constructing deliberately
    /// invalid documents in tests and for partial drafts.
    pub fn build_unchecked(self) -> FiscalDocument {
        let mut doc = self.doc;
        normalize(&mut doc);
        doc
    }
}

impl Party {
    fn empty() -> Self {
        Self {
            rfc: String::new(),
            name: String::new(),
            fiscal_regime: None,
            zip: None,
            cfdi_usage: None,
        }
    }
}

/// Builder for [`Party`] values.
#[derive(Debug, Clone)]
pub struct PartyBuilder {
    party: Party,
}

impl PartyBuilder {
    pub fn new(rfc: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            party: Party {
                rfc: rfc.into(),
                name: name.into(),
                fiscal_regime: None,
                zip: None,
                cfdi_usage: None,
            },
        }
    }

    pub fn fiscal_regime(mut self, code: impl Into<String>) -> Self {
        self.party.fiscal_regime = Some(code.into());
        self
    }

    pub fn zip(mut self, zip: impl Into<String>) -> Self {
        self.party.zip = Some(zip.into());
        self
    }

    pub fn cfdi_usage(mut self, code: impl Into<String>) -> Self {
        self.party.cfdi_usage = Some(code.into());
        self
    }

    pub fn build(self) -> Party {
        self.party
    }
}

/// Builder for [`LineItem`] values.
///
/// The tax conveniences compute `Base` from the line amount and `Importe`
/// from the rate, so callers only state the code and the rate.
#[derive(Debug, Clone)]
pub struct LineItemBuilder {
    line: LineItem,
}

impl LineItemBuilder {
    pub fn new(
        product_code: impl Into<String>,
        description: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        unit_price: Decimal,
    ) -> Self {
        let amount = round2(quantity * unit_price);
        Self {
            line: LineItem {
                product_code: product_code.into(),
                quantity,
                unit: unit.into(),
                description: description.into(),
                unit_price,
                amount,
                taxes: Vec::new(),
            },
        }
    }

    /// Add a transferred tax (traslado) at a Tasa rate over the line amount.
    pub fn transferred(self, code: impl Into<String>, rate: Decimal) -> Self {
        let base = self.line.amount;
        self.tax(TaxEntry {
            code: code.into(),
            kind: TaxKind::Transferred,
            factor: FactorType::Rate,
            rate: Some(rate),
            base,
            amount: Some(round2(base * rate)),
        })
    }

    /// Add a withheld tax (retención) at a Tasa rate over the line amount.
    pub fn withheld(self, code: impl Into<String>, rate: Decimal) -> Self {
        let base = self.line.amount;
        self.tax(TaxEntry {
            code: code.into(),
            kind: TaxKind::Withheld,
            factor: FactorType::Rate,
            rate: Some(rate),
            base,
            amount: Some(round2(base * rate)),
        })
    }

    /// Add an exempt transferred tax over the line amount.
    pub fn exempt(self, code: impl Into<String>) -> Self {
        let base = self.line.amount;
        self.tax(TaxEntry {
            code: code.into(),
            kind: TaxKind::Transferred,
            factor: FactorType::Exempt,
            rate: None,
            base,
            amount: None,
        })
    }

    /// Add a fully specified tax entry.
    pub fn tax(mut self, entry: TaxEntry) -> Self {
        self.line.taxes.push(entry);
        self
    }

    pub fn build(self) -> LineItem {
        self.line
    }
}

/// Builder for payroll (Nómina) documents.
///
/// Produces the mandated shape: one line whose amount is the perception
/// total, the deduction total as the document discount, and the payroll
/// schedules as a complement. Payroll documents carry no payment method.
#[derive(Debug, Clone)]
pub struct PayrollBuilder {
    issued_at: NaiveDateTime,
    payment_date: NaiveDate,
    series: Option<String>,
    folio: Option<String>,
    expedition_place: String,
    issuer: Option<Party>,
    employee: Option<Party>,
    perceptions: Vec<PayrollConcept>,
    deductions: Vec<PayrollConcept>,
}

impl PayrollBuilder {
    pub fn new(issued_at: NaiveDateTime, payment_date: NaiveDate) -> Self {
        Self {
            issued_at,
            payment_date,
            series: None,
            folio: None,
            expedition_place: String::new(),
            issuer: None,
            employee: None,
            perceptions: Vec::new(),
            deductions: Vec::new(),
        }
    }

    pub fn series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn folio(mut self, folio: impl Into<String>) -> Self {
        self.folio = Some(folio.into());
        self
    }

    pub fn expedition_place(mut self, zip: impl Into<String>) -> Self {
        self.expedition_place = zip.into();
        self
    }

    pub fn issuer(mut self, issuer: Party) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// The employee receiving the payroll document. Usage is forced to CN01.
    pub fn employee(mut self, employee: Party) -> Self {
        self.employee = Some(employee);
        self
    }

    pub fn perception(
        mut self,
        code: impl Into<String>,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        self.perceptions.push(PayrollConcept {
            code: code.into(),
            description: description.into(),
            amount,
        });
        self
    }

    pub fn deduction(
        mut self,
        code: impl Into<String>,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        self.deductions.push(PayrollConcept {
            code: code.into(),
            description: description.into(),
            amount,
        });
        self
    }

    pub fn build(self) -> Result<FiscalDocument, DocumentError> {
        if self.perceptions.is_empty() {
            return Err(DocumentError::Builder(
                "payroll document requires at least one perception".to_string(),
            ));
        }
        let issuer = self
            .issuer
            .ok_or_else(|| DocumentError::Builder("payroll document requires an issuer".to_string()))?;
        let mut employee = self
            .employee
            .ok_or_else(|| DocumentError::Builder("payroll document requires an employee".to_string()))?;
        employee.cfdi_usage = Some("CN01".to_string());

        let total_perceptions = round2(self.perceptions.iter().map(|p| p.amount).sum());
        let total_deductions = round2(self.deductions.iter().map(|d| d.amount).sum());

        let line = LineItemBuilder::new(
            "84111505",
            "Pago de nómina",
            Decimal::ONE,
            "ACT",
            total_perceptions,
        )
        .build();

        let mut builder = DocumentBuilder::new(DocumentType::Payroll, self.issued_at)
            .expedition_place(self.expedition_place)
            .issuer(issuer)
            .recipient(employee)
            .add_line(line)
            .complement(Complement::Payroll(PayrollComplement {
                payment_date: self.payment_date,
                perceptions: self.perceptions,
                deductions: self.deductions,
                total_perceptions,
                total_deductions,
            }));
        if total_deductions > Decimal::ZERO {
            builder = builder.discount(total_deductions);
        }
        if let Some(series) = self.series {
            builder = builder.series(series);
        }
        if let Some(folio) = self.folio {
            builder = builder.folio(folio);
        }
        builder.build()
    }
}

/// Builder for payment (Pago) documents.
///
/// Produces the mandated zero-total shape: one "84111506" line at quantity 1,
/// unit "ACT", description "Pago", zero value, with the payment records as a
/// complement. Recipient usage is forced to CP01.
#[derive(Debug, Clone)]
pub struct PaymentBuilder {
    issued_at: NaiveDateTime,
    series: Option<String>,
    folio: Option<String>,
    expedition_place: String,
    issuer: Option<Party>,
    recipient: Option<Party>,
    payments: Vec<PaymentRecord>,
}

impl PaymentBuilder {
    pub fn new(issued_at: NaiveDateTime) -> Self {
        Self {
            issued_at,
            series: None,
            folio: None,
            expedition_place: String::new(),
            issuer: None,
            recipient: None,
            payments: Vec::new(),
        }
    }

    pub fn series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    pub fn folio(mut self, folio: impl Into<String>) -> Self {
        self.folio = Some(folio.into());
        self
    }

    pub fn expedition_place(mut self, zip: impl Into<String>) -> Self {
        self.expedition_place = zip.into();
        self
    }

    pub fn issuer(mut self, issuer: Party) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn recipient(mut self, recipient: Party) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn add_payment(mut self, payment: PaymentRecord) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn build(self) -> Result<FiscalDocument, DocumentError> {
        if self.payments.is_empty() {
            return Err(DocumentError::Builder(
                "payment document requires at least one payment record".to_string(),
            ));
        }
        for (i, payment) in self.payments.iter().enumerate() {
            if payment.payment_form == super::catalogs::PAYMENT_FORM_TO_BE_DEFINED {
                return Err(DocumentError::Builder(format!(
                    "payments[{i}]: a received payment cannot use form '99'"
                )));
            }
            if payment.related.is_empty() {
                return Err(DocumentError::Builder(format!(
                    "payments[{i}]: payment must reference at least one prior document"
                )));
            }
        }
        let issuer = self
            .issuer
            .ok_or_else(|| DocumentError::Builder("payment document requires an issuer".to_string()))?;
        let mut recipient = self
            .recipient
            .ok_or_else(|| DocumentError::Builder("payment document requires a recipient".to_string()))?;
        recipient.cfdi_usage = Some("CP01".to_string());

        let line = LineItemBuilder::new("84111506", "Pago", Decimal::ONE, "ACT", Decimal::ZERO).build();

        let mut builder = DocumentBuilder::new(DocumentType::Payment, self.issued_at)
            .currency("XXX")
            .expedition_place(self.expedition_place)
            .issuer(issuer)
            .recipient(recipient)
            .add_line(line)
            .complement(Complement::Payment(PaymentComplement {
                payments: self.payments,
            }));
        if let Some(series) = self.series {
            builder = builder.series(series);
        }
        if let Some(folio) = self.folio {
            builder = builder.folio(folio);
        }
        builder.build()
    }
}
