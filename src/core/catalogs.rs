//! SAT catalog subsets used by validation and normalization.
//!
//! Only the codes this crate actually checks are carried; the full catalogs
//! run to thousands of entries and live with the SAT.

/// c_FormaPago sentinel: payment form not yet defined. Forced by the
/// normalizer whenever the payment method is PPD.
pub const PAYMENT_FORM_TO_BE_DEFINED: &str = "99";

/// c_UsoCFDI safe default when the caller supplies none.
pub const DEFAULT_CFDI_USAGE: &str = "S01";

/// Check whether `code` is a known c_FormaPago payment form code.
pub fn is_known_payment_form(code: &str) -> bool {
    PAYMENT_FORM_CODES.binary_search(&code).is_ok()
}

/// Check whether `code` is a known c_UsoCFDI usage code.
pub fn is_known_cfdi_usage(code: &str) -> bool {
    CFDI_USAGE_CODES.binary_search(&code).is_ok()
}

/// Check whether `code` is a known c_Impuesto tax code.
pub fn is_known_tax_code(code: &str) -> bool {
    TAX_CODES.binary_search(&code).is_ok()
}

/// Check whether `code` is a known c_RegimenFiscal code.
pub fn is_known_fiscal_regime(code: &str) -> bool {
    FISCAL_REGIME_CODES.binary_search(&code).is_ok()
}

/// c_FormaPago — payment form codes (sorted for binary search).
static PAYMENT_FORM_CODES: &[&str] = &[
    "01", // Efectivo
    "02", // Cheque nominativo
    "03", // Transferencia electrónica de fondos
    "04", // Tarjeta de crédito
    "05", // Monedero electrónico
    "06", // Dinero electrónico
    "08", // Vales de despensa
    "12", // Dación en pago
    "15", // Condonación
    "17", // Compensación
    "23", // Novación
    "28", // Tarjeta de débito
    "30", // Aplicación de anticipos
    "31", // Intermediario pagos
    "99", // Por definir
];

/// c_UsoCFDI — usage codes (sorted for binary search).
static CFDI_USAGE_CODES: &[&str] = &[
    "CN01", // Nómina
    "CP01", // Pagos
    "D01",  // Honorarios médicos
    "D04",  // Donativos
    "G01",  // Adquisición de mercancías
    "G02",  // Devoluciones, descuentos o bonificaciones
    "G03",  // Gastos en general
    "I01",  // Construcciones
    "I04",  // Equipo de cómputo
    "I08",  // Otra maquinaria y equipo
    "P01",  // Por definir (3.3 legacy)
    "S01",  // Sin efectos fiscales
];

/// c_Impuesto — tax codes (sorted for binary search).
static TAX_CODES: &[&str] = &[
    "001", // ISR
    "002", // IVA
    "003", // IEPS
];

/// c_RegimenFiscal — fiscal regime codes (sorted for binary search).
static FISCAL_REGIME_CODES: &[&str] = &[
    "601", // General de Ley Personas Morales
    "603", // Personas Morales con Fines no Lucrativos
    "605", // Sueldos y salarios
    "606", // Arrendamiento
    "612", // Personas Físicas con Actividades Empresariales
    "616", // Sin obligaciones fiscales
    "621", // Incorporación Fiscal
    "626", // Régimen Simplificado de Confianza
];
