//! Certification orchestration: state machine, retry policy, job handling.
//!
//! One worker processes one job at a time per document. Exclusivity is
//! enforced by atomic conditional state transitions in the store, not by
//! locks held across await points.

mod orchestrator;
mod store;

use thiserror::Error;

use crate::core::DocumentError;
use crate::pac::PacError;
use crate::sello::{CertificateError, SignError};

pub use orchestrator::{
    CancellationRequest, CertificationJob, CertificationOutcome, Orchestrator, RetryPolicy,
};
pub use store::{AuditTrail, DocumentStore, InMemoryStore};

/// Errors surfaced by the orchestrator. Terminal PAC faults are not errors
/// here; they finalize the job as a [`CertificationOutcome::Rejected`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("document '{0}' not found")]
    NotFound(String),

    /// Another worker holds this document. Exit without side effects.
    #[error("document '{0}' is already being processed")]
    AlreadyInProgress(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Pac(#[from] PacError),
}
