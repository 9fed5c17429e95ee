//! The certification orchestrator.

use chrono::{NaiveDateTime, Utc};
use std::time::Duration;

use crate::cadena::cadena_original;
use crate::core::{reason_codes, CancellationRecord, DocumentError, DocumentStatus};
use crate::pac::PacClient;
use crate::sello::{sign_document, CertificateBundle, CertificateError, CertificateProvider};
use crate::timbre::inject;
use crate::xml::to_xml;

use super::store::{AuditTrail, DocumentStore};
use super::PipelineError;

/// One unit of certification work. Created per submission attempt; the
/// passphrase is forwarded to the signer and dropped with the job.
#[derive(Debug, Clone)]
pub struct CertificationJob {
    pub document_id: String,
    /// Identity used to fetch the signing certificate from the vault.
    pub caller_id: String,
    /// CSD key passphrase. `None` for unencrypted keys.
    pub key_passphrase: Option<String>,
}

/// Terminal result of a certification job.
#[derive(Debug, Clone, PartialEq)]
pub enum CertificationOutcome {
    Certified {
        uuid: String,
        certified_at: NaiveDateTime,
        certified_xml: String,
    },
    /// Terminal rejection. The fault payload is preserved verbatim.
    Rejected { reason: String },
}

/// Cancellation request for a certified document.
#[derive(Debug, Clone)]
pub struct CancellationRequest {
    pub document_id: String,
    /// c_MotivoCancelacion code.
    pub reason_code: String,
    /// Replacement UUID, mandatory for reason "01".
    pub substitution_uuid: Option<String>,
}

/// Bounded exponential backoff for PAC submission.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (1-based): doubles each
    /// attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Drives documents through the certification lifecycle.
pub struct Orchestrator<S, P> {
    store: S,
    provider: P,
    pac: PacClient,
    retry: RetryPolicy,
}

impl<S, P> Orchestrator<S, P>
where
    S: DocumentStore,
    P: CertificateProvider,
{
    pub fn new(store: S, provider: P, pac: PacClient, retry: RetryPolicy) -> Self {
        Self {
            store,
            provider,
            pac,
            retry,
        }
    }

    /// Run one certification job to completion: sign, submit with backoff,
    /// and inject the stamp. Terminal PAC failures and exhausted retries
    /// finalize the document as `Rejected` and are returned as an outcome,
    /// not an error.
    pub async fn certify(
        &self,
        job: CertificationJob,
    ) -> Result<CertificationOutcome, PipelineError> {
        let id = job.document_id.as_str();
        let mut doc = self
            .store
            .load(id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;

        self.store
            .try_transition(id, DocumentStatus::Draft, DocumentStatus::Signing)
            .map_err(|_| PipelineError::AlreadyInProgress(id.to_string()))?;
        doc.status = DocumentStatus::Signing;
        tracing::debug!(document = id, "signing");

        // Fetched fresh per job; the bundle does not outlive this call.
        // A failure here hands the document back to Draft so the job can be
        // re-submitted later.
        let bundle = match self.fetch_with_backoff(&job.caller_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                self.release_signing_claim(id);
                return Err(e.into());
            }
        };
        let cadena = cadena_original(&doc);
        if let Err(e) = sign_document(&mut doc, &cadena, &bundle, job.key_passphrase.as_deref()) {
            self.release_signing_claim(id);
            return Err(e.into());
        }
        drop(bundle);

        self.store
            .try_transition(id, DocumentStatus::Signing, DocumentStatus::Signed)?;
        doc.status = DocumentStatus::Signed;
        self.store.save(&doc);

        let signed_xml = to_xml(&doc)?;
        self.store.save_audit(
            id,
            AuditTrail {
                cadena,
                signed_xml: signed_xml.clone(),
            },
        );

        self.store
            .try_transition(id, DocumentStatus::Signed, DocumentStatus::Submitting)
            .map_err(|_| PipelineError::AlreadyInProgress(id.to_string()))?;
        doc.status = DocumentStatus::Submitting;
        self.store.save(&doc);

        let mut attempt = 1u32;
        loop {
            match self.pac.stamp(&signed_xml).await {
                Ok(result) => {
                    // A completed cancellation beats an in-flight stamp: the
                    // PAC result is discarded, never persisted.
                    let current = self
                        .store
                        .load(id)
                        .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;
                    if current
                        .cancellation
                        .as_ref()
                        .is_some_and(|c| c.completed)
                    {
                        // The store already shows Cancelled; leave it alone
                        // and drop the stamp.
                        tracing::warn!(document = id, "stamp discarded, cancellation completed");
                        return Ok(CertificationOutcome::Rejected {
                            reason: "cancellation completed before certification".to_string(),
                        });
                    }

                    let certified_xml = inject(&mut doc, result.proof.clone())?;
                    self.store.try_transition(
                        id,
                        DocumentStatus::Submitting,
                        DocumentStatus::Certified,
                    )?;
                    doc.status = DocumentStatus::Certified;
                    self.store.save(&doc);
                    tracing::info!(document = id, uuid = %result.proof.uuid, "certified");
                    return Ok(CertificationOutcome::Certified {
                        uuid: result.proof.uuid,
                        certified_at: result.proof.certified_at,
                        certified_xml,
                    });
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        document = id,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "retryable PAC failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(document = id, attempt, error = %e, "terminal PAC failure");
                    return self.finalize_rejected(&mut doc, e.to_string());
                }
            }
        }
    }

    /// Fetch the signing bundle, backing off on vault outages. Terminal
    /// certificate errors (not found, expired) surface on the first attempt.
    async fn fetch_with_backoff(
        &self,
        caller_id: &str,
    ) -> Result<CertificateBundle, CertificateError> {
        let mut attempt = 1u32;
        loop {
            match self.provider.fetch(caller_id).await {
                Ok(bundle) => return Ok(bundle),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        caller = caller_id,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "certificate vault unavailable, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Hand a claimed document back to `Draft` so a later job can retry it.
    fn release_signing_claim(&self, id: &str) {
        if let Err(e) = self
            .store
            .try_transition(id, DocumentStatus::Signing, DocumentStatus::Draft)
        {
            tracing::warn!(document = id, error = %e, "failed to release signing claim");
        }
    }

    fn finalize_rejected(
        &self,
        doc: &mut crate::core::FiscalDocument,
        reason: String,
    ) -> Result<CertificationOutcome, PipelineError> {
        let id = doc.document_id();
        self.store
            .try_transition(&id, DocumentStatus::Submitting, DocumentStatus::Rejected)?;
        doc.status = DocumentStatus::Rejected;
        self.store.save(doc);
        Ok(CertificationOutcome::Rejected { reason })
    }

    /// Request cancellation of a certified document. Returns the new status
    /// synchronously; completion is recorded separately once the authority
    /// acknowledges.
    pub fn cancel(&self, request: CancellationRequest) -> Result<DocumentStatus, PipelineError> {
        if !reason_codes::is_known_cancellation_reason(&request.reason_code) {
            return Err(DocumentError::Validation(format!(
                "'{}' is not a known cancellation reason code",
                request.reason_code
            ))
            .into());
        }
        if reason_codes::requires_substitution_uuid(&request.reason_code)
            && request.substitution_uuid.is_none()
        {
            return Err(DocumentError::Validation(
                "substitution cancellations require a replacement UUID".to_string(),
            )
            .into());
        }

        let id = request.document_id.as_str();
        let mut doc = self
            .store
            .load(id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;
        self.store
            .try_transition(id, DocumentStatus::Certified, DocumentStatus::Cancelling)?;
        doc.status = DocumentStatus::Cancelling;
        doc.cancellation = Some(CancellationRecord {
            reason_code: request.reason_code,
            substitution_uuid: request.substitution_uuid,
            requested_at: Utc::now(),
            completed: false,
        });
        self.store.save(&doc);
        tracing::info!(document = id, "cancellation requested");
        Ok(DocumentStatus::Cancelling)
    }

    /// Record the authority's acknowledgement of a pending cancellation.
    pub fn complete_cancellation(&self, document_id: &str) -> Result<(), PipelineError> {
        let mut doc = self
            .store
            .load(document_id)
            .ok_or_else(|| PipelineError::NotFound(document_id.to_string()))?;
        self.store.try_transition(
            document_id,
            DocumentStatus::Cancelling,
            DocumentStatus::Cancelled,
        )?;
        doc.status = DocumentStatus::Cancelled;
        if let Some(cancellation) = &mut doc.cancellation {
            cancellation.completed = true;
        }
        self.store.save(&doc);
        tracing::info!(document = document_id, "cancellation completed");
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
