//! Async PAC certification client.
//!
//! Submits a signed document inside the PAC's JSON envelope and maps the
//! response onto a retryable/terminal error taxonomy. The orchestrator owns
//! retry policy; this module only classifies.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::StampProof;
use crate::timbre::parse_stamp;

/// PAC connection settings, configured per deployment.
///
/// TLS verification is controlled here, scoped to the one client built from
/// this config. There is no process-wide toggle.
#[derive(Debug, Clone)]
pub struct PacConfig {
    pub endpoint: String,
    pub user: String,
    pub password: String,
    /// Issuing equipment identifier the PAC requires in every envelope.
    pub equipment_id: String,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Accept self-signed PAC certificates. Staging environments only.
    pub danger_accept_invalid_certs: bool,
}

impl PacConfig {
    pub fn new(
        endpoint: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        equipment_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            user: user.into(),
            password: password.into(),
            equipment_id: equipment_id.into(),
            timeout: Duration::from_secs(30),
            danger_accept_invalid_certs: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }
}

/// Errors from PAC submission.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PacError {
    /// Network failure or non-success HTTP status. Always retryable.
    #[error("PAC transport error: {0}")]
    Transport(String),

    /// Protocol-level fault from the PAC. Retryability depends on the code.
    #[error("PAC fault {code}: {message}")]
    Fault { code: String, message: String },

    /// Response shape the client does not understand. Non-retryable;
    /// needs human triage rather than a retry loop.
    #[error("malformed PAC response: {0}")]
    MalformedResponse(String),
}

impl PacError {
    /// Capacity and timeout faults heal on retry; malformed-document and
    /// duplicate-UUID faults never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Fault { code, .. } => matches!(code.as_str(), "500" | "503" | "504"),
            Self::MalformedResponse(_) => false,
        }
    }
}

/// Fault code the PAC returns for an already-certified UUID. Terminal.
pub const FAULT_DUPLICATE_UUID: &str = "307";
/// Fault code for a structurally invalid document. Terminal.
pub const FAULT_MALFORMED_DOCUMENT: &str = "301";

/// Outcome of a successful certification call.
#[derive(Debug, Clone, PartialEq)]
pub struct StampResult {
    pub proof: StampProof,
    /// The certified document as the PAC returned it.
    pub certified_xml: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StampRequest<'a> {
    credentials: Credentials<'a>,
    base64_document: String,
    equipment_id: &'a str,
}

#[derive(Serialize)]
struct Credentials<'a> {
    user: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct StampResponse {
    fault: Option<FaultBody>,
    result: Option<ResultBody>,
}

#[derive(Debug, Deserialize)]
struct FaultBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultBody {
    certified_document_base64: Option<String>,
    certified_document: Option<String>,
    uuid: Option<String>,
    certified_at: Option<String>,
    authority_cert_serial: Option<String>,
    authority_signature: Option<String>,
}

/// PAC HTTP client.
#[derive(Debug, Clone)]
pub struct PacClient {
    config: PacConfig,
    client: reqwest::Client,
}

impl PacClient {
    pub fn new(config: PacConfig) -> Result<Self, PacError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
            .build()
            .map_err(|e| PacError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Submit a signed document for certification. One network attempt; the
    /// caller decides whether a retryable failure is retried.
    pub async fn stamp(&self, signed_xml: &str) -> Result<StampResult, PacError> {
        let request = StampRequest {
            credentials: Credentials {
                user: &self.config.user,
                password: &self.config.password,
            },
            base64_document: BASE64.encode(signed_xml.as_bytes()),
            equipment_id: &self.config.equipment_id,
        };

        tracing::debug!(endpoint = %self.config.endpoint, "submitting document to PAC");
        let resp = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| PacError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PacError::Transport(e.to_string()))?;
        if !status.is_success() {
            tracing::warn!(%status, "PAC returned non-success status");
            return Err(PacError::Transport(format!("HTTP {status}: {body}")));
        }

        let response: StampResponse = serde_json::from_str(&body)
            .map_err(|e| PacError::MalformedResponse(e.to_string()))?;

        if let Some(fault) = response.fault {
            tracing::warn!(code = %fault.code, message = %fault.message, "PAC fault");
            return Err(PacError::Fault {
                code: fault.code,
                message: fault.message,
            });
        }

        let result = response
            .result
            .ok_or_else(|| PacError::MalformedResponse("neither fault nor result".into()))?;
        let outcome = extract_stamp(result)?;
        tracing::info!(uuid = %outcome.proof.uuid, "document certified");
        Ok(outcome)
    }
}

/// Pull the stamp fields out of a result body. Fields present directly in
/// the envelope win; otherwise they are parsed from the certification
/// complement embedded in the returned document.
fn extract_stamp(result: ResultBody) -> Result<StampResult, PacError> {
    let certified_xml = match (result.certified_document_base64, result.certified_document) {
        (Some(b64), _) => {
            let bytes = BASE64
                .decode(b64.trim())
                .map_err(|e| PacError::MalformedResponse(format!("document Base64: {e}")))?;
            String::from_utf8(bytes)
                .map_err(|e| PacError::MalformedResponse(format!("document UTF-8: {e}")))?
        }
        (None, Some(plain)) => plain,
        (None, None) => {
            return Err(PacError::MalformedResponse(
                "result carries no certified document".into(),
            ));
        }
    };

    let proof = match (
        result.uuid,
        result.certified_at,
        result.authority_cert_serial,
        result.authority_signature,
    ) {
        (Some(uuid), Some(certified_at), Some(serial), Some(signature)) => {
            let certified_at =
                chrono::NaiveDateTime::parse_from_str(&certified_at, "%Y-%m-%dT%H:%M:%S")
                    .map_err(|e| {
                        PacError::MalformedResponse(format!("certifiedAt timestamp: {e}"))
                    })?;
            StampProof {
                version: "1.1".to_string(),
                uuid,
                certified_at,
                authority_cert_serial: serial,
                authority_signature: signature,
            }
        }
        _ => parse_stamp(&certified_xml)
            .map_err(|e| PacError::MalformedResponse(format!("stamp fields: {e}")))?,
    };

    Ok(StampResult {
        proof,
        certified_xml,
    })
}
