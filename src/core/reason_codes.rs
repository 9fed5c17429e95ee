//! c_MotivoCancelacion — cancellation reason codes.

/// Check whether `code` is a known cancellation reason code.
pub fn is_known_cancellation_reason(code: &str) -> bool {
    CANCELLATION_REASON_CODES.binary_search(&code).is_ok()
}

/// Reason "01" (substitution) requires the UUID of the replacement document.
pub fn requires_substitution_uuid(code: &str) -> bool {
    code == "01"
}

/// c_MotivoCancelacion (sorted for binary search).
static CANCELLATION_REASON_CODES: &[&str] = &[
    "01", // Comprobante emitido con errores con relación
    "02", // Comprobante emitido con errores sin relación
    "03", // No se llevó a cabo la operación
    "04", // Operación nominativa relacionada en factura global
];
