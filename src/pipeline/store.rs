//! Document persistence seam for the orchestrator.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::core::{DocumentError, DocumentStatus, FiscalDocument};

/// Signed material preserved for audit and replay. Written after the first
/// signing attempt and kept even when the document ends up rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditTrail {
    pub cadena: String,
    pub signed_xml: String,
}

/// Storage seam the orchestrator runs against.
///
/// `try_transition` is the concurrency primitive: it must compare the
/// current status and swap atomically, so two workers racing into the same
/// state see exactly one winner.
pub trait DocumentStore {
    fn load(&self, document_id: &str) -> Option<FiscalDocument>;

    fn save(&self, doc: &FiscalDocument);

    /// Atomically move `document_id` from `from` to `to`. Fails with
    /// [`DocumentError::InvalidStateTransition`] carrying the actual current
    /// status when the document is not in `from`, or when the lifecycle
    /// forbids the edge.
    fn try_transition(
        &self,
        document_id: &str,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<(), DocumentError>;

    fn save_audit(&self, document_id: &str, audit: AuditTrail);

    fn load_audit(&self, document_id: &str) -> Option<AuditTrail>;
}

impl<S: DocumentStore> DocumentStore for std::sync::Arc<S> {
    fn load(&self, document_id: &str) -> Option<FiscalDocument> {
        (**self).load(document_id)
    }

    fn save(&self, doc: &FiscalDocument) {
        (**self).save(doc)
    }

    fn try_transition(
        &self,
        document_id: &str,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<(), DocumentError> {
        (**self).try_transition(document_id, from, to)
    }

    fn save_audit(&self, document_id: &str, audit: AuditTrail) {
        (**self).save_audit(document_id, audit)
    }

    fn load_audit(&self, document_id: &str) -> Option<AuditTrail> {
        (**self).load_audit(document_id)
    }
}

/// Mutex-backed store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: Mutex<HashMap<String, FiscalDocument>>,
    audits: Mutex<HashMap<String, AuditTrail>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document keyed by its own id.
    pub fn insert(&self, doc: FiscalDocument) {
        lock(&self.documents).insert(doc.document_id(), doc);
    }

    pub fn status_of(&self, document_id: &str) -> Option<DocumentStatus> {
        lock(&self.documents).get(document_id).map(|d| d.status)
    }
}

impl DocumentStore for InMemoryStore {
    fn load(&self, document_id: &str) -> Option<FiscalDocument> {
        lock(&self.documents).get(document_id).cloned()
    }

    fn save(&self, doc: &FiscalDocument) {
        lock(&self.documents).insert(doc.document_id(), doc.clone());
    }

    fn try_transition(
        &self,
        document_id: &str,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<(), DocumentError> {
        let mut documents = lock(&self.documents);
        let doc = documents
            .get_mut(document_id)
            .ok_or_else(|| DocumentError::InvalidStateTransition { from, to })?;
        if doc.status != from || !from.can_transition(to) {
            return Err(DocumentError::InvalidStateTransition {
                from: doc.status,
                to,
            });
        }
        doc.status = to;
        Ok(())
    }

    fn save_audit(&self, document_id: &str, audit: AuditTrail) {
        lock(&self.audits).insert(document_id.to_string(), audit);
    }

    fn load_audit(&self, document_id: &str) -> Option<AuditTrail> {
        lock(&self.audits).get(document_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn draft_doc() -> FiscalDocument {
        let issued = NaiveDate::from_ymd_opt(2026, 3, 12)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        DocumentBuilder::new(DocumentType::Income, issued)
            .series("A")
            .folio("1")
            .expedition_place("64000")
            .payment_method(PaymentMethod::Single)
            .payment_form("03")
            .issuer(
                PartyBuilder::new("EKU9003173C9", "EMISOR")
                    .fiscal_regime("601")
                    .build(),
            )
            .recipient(
                PartyBuilder::new("XAXX010101000", "RECEPTOR")
                    .fiscal_regime("616")
                    .zip("64000")
                    .cfdi_usage("G03")
                    .build(),
            )
            .add_line(
                LineItemBuilder::new("84111506", "Servicio", dec!(1), "E48", dec!(100)).build(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn transition_requires_expected_current_state() {
        let store = InMemoryStore::new();
        store.insert(draft_doc());

        store
            .try_transition("A-1", DocumentStatus::Draft, DocumentStatus::Signing)
            .unwrap();
        assert_eq!(store.status_of("A-1"), Some(DocumentStatus::Signing));

        // A second worker trying the same edge loses.
        let err = store
            .try_transition("A-1", DocumentStatus::Draft, DocumentStatus::Signing)
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::InvalidStateTransition {
                from: DocumentStatus::Signing,
                to: DocumentStatus::Signing,
            }
        ));
    }

    #[test]
    fn illegal_edges_rejected_even_from_matching_state() {
        let store = InMemoryStore::new();
        store.insert(draft_doc());
        assert!(store
            .try_transition("A-1", DocumentStatus::Draft, DocumentStatus::Certified)
            .is_err());
        assert_eq!(store.status_of("A-1"), Some(DocumentStatus::Draft));
    }

    #[test]
    fn audit_survives_document_updates() {
        let store = InMemoryStore::new();
        let doc = draft_doc();
        store.insert(doc.clone());
        store.save_audit(
            "A-1",
            AuditTrail {
                cadena: "||4.0||".into(),
                signed_xml: "<cfdi:Comprobante/>".into(),
            },
        );
        store.save(&doc);
        let audit = store.load_audit("A-1").unwrap();
        assert_eq!(audit.cadena, "||4.0||");
    }
}
