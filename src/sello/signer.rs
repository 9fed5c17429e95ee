//! In-process RSA signing of the cadena original.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_cert::Certificate;
use x509_cert::der::{DecodePem, Encode};

use crate::core::{FiscalDocument, SignatureBlock};

use super::certificate::CertificateBundle;

/// Errors from signing and signature verification.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SignError {
    /// Bad passphrase or malformed key material. Non-retryable.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
}

/// Sign a cadena original: SHA-256 digest, RSA PKCS#1 v1.5, Base64 output
/// without line breaks.
///
/// When `passphrase` is given the key must be an encrypted PKCS#8 PEM;
/// otherwise a plain PKCS#8 PEM is expected. The passphrase is only
/// forwarded to the decoder, never stored.
pub fn sign_cadena(
    cadena: &str,
    private_key_pem: &str,
    passphrase: Option<&str>,
) -> Result<String, SignError> {
    let key = match passphrase {
        Some(passphrase) => RsaPrivateKey::from_pkcs8_encrypted_pem(private_key_pem, passphrase)
            .map_err(|e| SignError::SigningFailed(format!("key decryption: {e}")))?,
        None => RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| SignError::SigningFailed(format!("key parse: {e}")))?,
    };
    let digest = Sha256::digest(cadena.as_bytes());
    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| SignError::SigningFailed(e.to_string()))?;
    Ok(BASE64.encode(signature))
}

/// Verify a Base64 sello against the certificate's public key. Returns
/// `Ok(false)` on a well-formed but non-matching signature.
pub fn verify_sello(
    cadena: &str,
    sello_b64: &str,
    certificate_pem: &str,
) -> Result<bool, SignError> {
    let cert = Certificate::from_pem(certificate_pem.as_bytes())
        .map_err(|e| SignError::InvalidCertificate(e.to_string()))?;
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| SignError::InvalidCertificate(e.to_string()))?;
    let public_key = RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| SignError::InvalidCertificate(e.to_string()))?;

    let signature = BASE64
        .decode(sello_b64)
        .map_err(|e| SignError::SigningFailed(format!("sello is not valid Base64: {e}")))?;
    let digest = Sha256::digest(cadena.as_bytes());
    Ok(public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .is_ok())
}

/// Derive the authority's 20-digit serial encoding from an X.509 serial hex
/// string.
///
/// Each hex byte pair is decoded as an ASCII code point; only code points
/// for the digits 0-9 are kept. The result is truncated to its first 20
/// digits, or left-padded with '0' to reach 20. This is the authority's
/// convention, not a hex-to-decimal conversion.
pub fn authority_serial(serial_hex: &str) -> String {
    let hex: Vec<char> = serial_hex.chars().collect();
    let mut digits = String::new();
    for pair in hex.chunks_exact(2) {
        let code = u8::from_str_radix(&format!("{}{}", pair[0], pair[1]), 16);
        if let Ok(code) = code {
            let c = code as char;
            if c.is_ascii_digit() {
                digits.push(c);
            }
        }
    }
    if digits.len() > 20 {
        digits.truncate(20);
        digits
    } else {
        format!("{digits:0>20}")
    }
}

/// Extract the authority-encoded serial from a PEM certificate.
pub fn certificate_serial(certificate_pem: &str) -> Result<String, SignError> {
    let cert = Certificate::from_pem(certificate_pem.as_bytes())
        .map_err(|e| SignError::InvalidCertificate(e.to_string()))?;
    let mut hex = String::new();
    for byte in cert.tbs_certificate.serial_number.as_bytes() {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(authority_serial(&hex))
}

/// Base64 of the certificate's DER bytes, no line breaks, as the
/// Certificado attribute carries it.
pub fn certificate_base64(certificate_pem: &str) -> Result<String, SignError> {
    let cert = Certificate::from_pem(certificate_pem.as_bytes())
        .map_err(|e| SignError::InvalidCertificate(e.to_string()))?;
    let der = cert
        .to_der()
        .map_err(|e| SignError::InvalidCertificate(e.to_string()))?;
    Ok(BASE64.encode(der))
}

/// Sign a document's cadena and attach the resulting signature block.
pub fn sign_document(
    doc: &mut FiscalDocument,
    cadena: &str,
    bundle: &CertificateBundle,
    passphrase: Option<&str>,
) -> Result<(), SignError> {
    let sello = sign_cadena(cadena, &bundle.private_key_pem, passphrase)?;
    doc.signature = Some(SignatureBlock {
        sello,
        certificate_serial: authority_serial(&bundle.certificate_serial),
        certificate_b64: certificate_base64(&bundle.certificate_pem)?,
    });
    Ok(())
}
