//! CSD certificate handling and cadena signing.
//!
//! Certificates live in an external vault; this module borrows a bundle for
//! one signing operation and never stores private key material. The signer
//! works on in-memory buffers only.

mod certificate;
mod signer;

pub use certificate::{
    CertificateBundle, CertificateError, CertificateProvider, StaticCertificateProvider,
    VaultClient,
};
pub use signer::{
    authority_serial, certificate_base64, certificate_serial, sign_cadena, sign_document,
    verify_sello, SignError,
};
