use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A CFDI fiscal document — the top-level aggregate.
///
/// Owned exclusively by the certification pipeline until certified; after
/// that it is immutable except for cancellation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalDocument {
    /// TipoDeComprobante.
    pub doc_type: DocumentType,
    /// Serie (optional, issuer-assigned).
    pub series: Option<String>,
    /// Folio (optional, issuer-assigned).
    pub folio: Option<String>,
    /// Fecha — local issue timestamp, second precision.
    pub issued_at: NaiveDateTime,
    /// LugarExpedicion — zip code of the issuing branch.
    pub expedition_place: String,
    /// Moneda (ISO 4217, e.g. "MXN").
    pub currency: String,
    /// MetodoPago — PUE (single) or PPD (deferred/partial). Absent for
    /// payroll and payment documents.
    pub payment_method: Option<PaymentMethod>,
    /// FormaPago (c_FormaPago code, e.g. "03" transfer, "99" to-be-defined).
    pub payment_form: Option<String>,
    /// SubTotal — sum of line amounts, 2 decimals.
    pub sub_total: Decimal,
    /// Descuento — document-level discount (payroll deductions land here).
    pub discount: Option<Decimal>,
    /// Total = SubTotal − Descuento + ΣTraslados − ΣRetenciones.
    pub total: Decimal,
    /// Certification lifecycle state.
    pub status: DocumentStatus,
    /// Emisor.
    pub issuer: Party,
    /// Receptor.
    pub recipient: Party,
    /// Conceptos.
    pub lines: Vec<LineItem>,
    /// Document-level tax summary, present only when at least one line
    /// carries taxes. Serialized as a direct child of the document root.
    pub taxes: Option<TaxSummary>,
    /// Payroll or payment complement payload.
    pub complement: Option<Complement>,
    /// Issuer signature block, set by the signer.
    pub signature: Option<SignatureBlock>,
    /// Authority certification proof, set by the injector.
    pub stamp: Option<StampProof>,
    /// Cancellation metadata, set after certification only.
    pub cancellation: Option<CancellationRecord>,
}

impl FiscalDocument {
    /// Identifier used by the store and the job queue: `serie-folio`, or the
    /// folio alone when no serie is set.
    pub fn document_id(&self) -> String {
        match (&self.series, &self.folio) {
            (Some(s), Some(f)) => format!("{s}-{f}"),
            (None, Some(f)) => f.clone(),
            (Some(s), None) => s.clone(),
            (None, None) => String::new(),
        }
    }
}

/// c_TipoDeComprobante — document type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// I — Ingreso (sale invoice).
    Income,
    /// E — Egreso (credit note).
    Expense,
    /// N — Nómina (payroll).
    Payroll,
    /// P — Pago (payment complement).
    Payment,
}

impl DocumentType {
    /// SAT code letter.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Income => "I",
            Self::Expense => "E",
            Self::Payroll => "N",
            Self::Payment => "P",
        }
    }

    /// Parse from the SAT code letter.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "I" => Some(Self::Income),
            "E" => Some(Self::Expense),
            "N" => Some(Self::Payroll),
            "P" => Some(Self::Payment),
            _ => None,
        }
    }
}

/// c_MetodoPago — payment method codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// PUE — Pago en una sola exhibición (single payment).
    Single,
    /// PPD — Pago en parcialidades o diferido (deferred or partial).
    DeferredOrPartial,
}

impl PaymentMethod {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Single => "PUE",
            Self::DeferredOrPartial => "PPD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PUE" => Some(Self::Single),
            "PPD" => Some(Self::DeferredOrPartial),
            _ => None,
        }
    }
}

/// Emisor / Receptor party. Value object embedded in [`FiscalDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    /// RFC — federal taxpayer id (12 or 13 characters).
    pub rfc: String,
    /// Legal name, uppercase, without corporate suffix per CFDI 4.0.
    pub name: String,
    /// c_RegimenFiscal code (e.g. "601"). Required for issuers; required on
    /// recipients of income/expense documents.
    pub fiscal_regime: Option<String>,
    /// DomicilioFiscalReceptor zip — recipients only.
    pub zip: Option<String>,
    /// c_UsoCFDI code — recipients only; defaulted by the normalizer.
    pub cfdi_usage: Option<String>,
}

/// Concepto — a document line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// ClaveProdServ (c_ClaveProdServ code).
    pub product_code: String,
    /// Cantidad.
    pub quantity: Decimal,
    /// ClaveUnidad (c_ClaveUnidad code, e.g. "E48" service unit).
    pub unit: String,
    /// Descripcion.
    pub description: String,
    /// ValorUnitario. Up to 6 decimals; not rounded to 2 — the line amount
    /// is the rounded value.
    pub unit_price: Decimal,
    /// Importe. Invariant: `amount == round2(quantity * unit_price)`.
    pub amount: Decimal,
    /// Withheld and transferred taxes for this line. The normalizer orders
    /// withheld entries before transferred ones.
    pub taxes: Vec<TaxEntry>,
}

/// c_TipoFactor — tax factor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorType {
    /// Tasa — percentage rate, 6 decimals.
    Rate,
    /// Cuota — fixed quota per unit.
    Quota,
    /// Exento — exempt; rate and amount are absent.
    Exempt,
}

impl FactorType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rate => "Tasa",
            Self::Quota => "Cuota",
            Self::Exempt => "Exento",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Tasa" => Some(Self::Rate),
            "Cuota" => Some(Self::Quota),
            "Exento" => Some(Self::Exempt),
            _ => None,
        }
    }
}

/// Whether a tax entry is withheld (retención) or transferred (traslado).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxKind {
    Withheld,
    Transferred,
}

/// A single line-level tax entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxEntry {
    /// c_Impuesto code ("001" ISR, "002" IVA, "003" IEPS).
    pub code: String,
    pub kind: TaxKind,
    pub factor: FactorType,
    /// TasaOCuota, 6 decimals. Absent for `Exempt`.
    pub rate: Option<Decimal>,
    /// Base, 2 decimals.
    pub base: Decimal,
    /// Importe, 2 decimals. Absent for `Exempt`.
    pub amount: Option<Decimal>,
}

/// Document-level tax summary (cfdi:Impuestos as a direct child of the
/// document root). Retentions always precede transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxSummary {
    pub retentions: Vec<RetainedTax>,
    pub transfers: Vec<TransferredTax>,
    /// TotalImpuestosRetenidos.
    pub total_withheld: Decimal,
    /// TotalImpuestosTrasladados.
    pub total_transferred: Decimal,
}

/// Document-level retention: code and amount only (no Base).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetainedTax {
    pub code: String,
    pub amount: Decimal,
}

/// Document-level transfer: code, factor, rate and amount (no Base).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferredTax {
    pub code: String,
    pub factor: FactorType,
    pub rate: Option<Decimal>,
    pub amount: Option<Decimal>,
}

/// Certification lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    Draft,
    Signing,
    Signed,
    Submitting,
    Certified,
    Rejected,
    Cancelling,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Signing => "signing",
            Self::Signed => "signed",
            Self::Submitting => "submitting",
            Self::Certified => "certified",
            Self::Rejected => "rejected",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether `self → to` is a legal transition.
    pub fn can_transition(&self, to: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (*self, to),
            (Draft, Signing)
                | (Signing, Signed)
                // Recovery edge: a failed signing attempt releases the claim.
                | (Signing, Draft)
                | (Signed, Submitting)
                | (Submitting, Certified)
                | (Submitting, Rejected)
                | (Certified, Cancelling)
                | (Cancelling, Cancelled)
        )
    }

    /// Terminal states accept no further certification work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issuer signature block produced by the signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Sello — Base64 RSA/SHA-256 signature over the cadena original, no
    /// embedded line breaks.
    pub sello: String,
    /// NoCertificado — the 20-digit authority encoding of the CSD serial.
    pub certificate_serial: String,
    /// Certificado — DER certificate bytes, Base64.
    pub certificate_b64: String,
}

/// TimbreFiscalDigital — the authority's certification proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampProof {
    /// Timbre protocol version ("1.1").
    pub version: String,
    /// UUID assigned by the authority.
    pub uuid: String,
    /// FechaTimbrado.
    pub certified_at: NaiveDateTime,
    /// NoCertificadoSAT.
    pub authority_cert_serial: String,
    /// SelloSAT.
    pub authority_signature: String,
}

/// Cancellation metadata. Only valid on certified documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRecord {
    /// c_MotivoCancelacion reason code ("01".."04").
    pub reason_code: String,
    /// Replacement UUID, required for reason "01" (substitution).
    pub substitution_uuid: Option<String>,
    pub requested_at: DateTime<Utc>,
    /// Set once the authority acknowledges the cancellation.
    pub completed: bool,
}

/// Complement payload — one per document subtype that carries one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Complement {
    Payroll(PayrollComplement),
    Payment(PaymentComplement),
}

/// Nómina complement: perception/deduction schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollComplement {
    pub payment_date: chrono::NaiveDate,
    pub perceptions: Vec<PayrollConcept>,
    pub deductions: Vec<PayrollConcept>,
    pub total_perceptions: Decimal,
    pub total_deductions: Decimal,
}

/// A single payroll perception or deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollConcept {
    /// SAT perception/deduction type code.
    pub code: String,
    pub description: String,
    pub amount: Decimal,
}

/// Pagos complement: one or more payment records against prior documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentComplement {
    pub payments: Vec<PaymentRecord>,
}

/// A single received payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub paid_at: NaiveDateTime,
    /// c_FormaPago of the actual payment (not "99").
    pub payment_form: String,
    pub currency: String,
    pub amount: Decimal,
    pub related: Vec<RelatedDocument>,
}

/// A prior certified document a payment applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedDocument {
    pub uuid: String,
    pub series: Option<String>,
    pub folio: Option<String>,
    /// NumParcialidad — 1-based installment number.
    pub installment: u32,
    pub previous_balance: Decimal,
    pub amount_paid: Decimal,
    pub remaining_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_type_codes_round_trip() {
        for ty in [
            DocumentType::Income,
            DocumentType::Expense,
            DocumentType::Payroll,
            DocumentType::Payment,
        ] {
            assert_eq!(DocumentType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(DocumentType::from_code("T"), None);
    }

    #[test]
    fn status_transitions_follow_lifecycle() {
        use DocumentStatus::*;
        assert!(Draft.can_transition(Signing));
        assert!(Signing.can_transition(Signed));
        assert!(Signing.can_transition(Draft));
        assert!(Signed.can_transition(Submitting));
        assert!(Submitting.can_transition(Certified));
        assert!(Submitting.can_transition(Rejected));
        assert!(Certified.can_transition(Cancelling));
        assert!(Cancelling.can_transition(Cancelled));

        assert!(!Draft.can_transition(Certified));
        assert!(!Rejected.can_transition(Cancelling));
        assert!(!Cancelled.can_transition(Cancelling));
        assert!(!Certified.can_transition(Submitting));
    }

    #[test]
    fn terminal_states() {
        assert!(DocumentStatus::Rejected.is_terminal());
        assert!(DocumentStatus::Cancelled.is_terminal());
        assert!(!DocumentStatus::Certified.is_terminal());
    }

    #[test]
    fn factor_codes_round_trip() {
        for factor in [FactorType::Rate, FactorType::Quota, FactorType::Exempt] {
            assert_eq!(FactorType::from_code(factor.code()), Some(factor));
        }
        assert_eq!(FactorType::from_code("tasa"), None);
    }
}
