//! Shared fixtures: documents, RSA keys and self-signed test certificates.
#![allow(dead_code)]

use std::str::FromStr;

use chrono::NaiveDate;
use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rust_decimal_macros::dec;
use sha2::Sha256;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::EncodePem;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;

use timbrado::core::*;

/// X.509 serial whose bytes are the ASCII digits of a 20-digit CSD serial.
pub const TEST_SERIAL_DIGITS: &[u8] = b"30001000000400002434";

pub fn issued_at() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 12)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
}

pub fn issuer() -> Party {
    PartyBuilder::new("EKU9003173C9", "ESCUELA KEMPER URGATE")
        .fiscal_regime("601")
        .build()
}

pub fn recipient() -> Party {
    PartyBuilder::new("XAXX010101000", "PUBLICO EN GENERAL")
        .fiscal_regime("616")
        .zip("64000")
        .cfdi_usage("G03")
        .build()
}

/// A valid single-line income document: 2 x 100.005 + 16% IVA.
pub fn income_doc() -> FiscalDocument {
    DocumentBuilder::new(DocumentType::Income, issued_at())
        .series("A")
        .folio("1042")
        .expedition_place("64000")
        .payment_method(PaymentMethod::Single)
        .payment_form("03")
        .issuer(issuer())
        .recipient(recipient())
        .add_line(
            LineItemBuilder::new("84111506", "Servicios de facturación", dec!(2), "E48", dec!(100.005))
                .transferred("002", dec!(0.16))
                .build(),
        )
        .build()
        .unwrap()
}

pub fn generate_key() -> RsaPrivateKey {
    let mut rng = rand::thread_rng();
    RsaPrivateKey::new(&mut rng, 2048).unwrap()
}

pub fn key_to_pem(key: &RsaPrivateKey) -> String {
    key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
}

pub fn key_to_encrypted_pem(key: &RsaPrivateKey, passphrase: &str) -> String {
    let mut rng = rand::thread_rng();
    key.to_pkcs8_encrypted_pem(&mut rng, passphrase, LineEnding::LF)
        .unwrap()
        .to_string()
}

/// Self-signed certificate over `key` with [`TEST_SERIAL_DIGITS`] as the
/// raw serial bytes. Returns the PEM.
pub fn self_signed_cert_pem(key: &RsaPrivateKey) -> String {
    let signer: SigningKey<Sha256> = SigningKey::new(key.clone());
    let serial = SerialNumber::new(TEST_SERIAL_DIGITS).unwrap();
    let validity = Validity::from_now(std::time::Duration::from_secs(3600 * 24 * 365)).unwrap();
    let subject = Name::from_str("CN=EKU9003173C9,O=ESCUELA KEMPER URGATE").unwrap();
    let spki_der = key.to_public_key().to_public_key_der().unwrap();
    let spki = SubjectPublicKeyInfoOwned::try_from(spki_der.as_bytes()).unwrap();
    let builder =
        CertificateBuilder::new(Profile::Root, serial, validity, subject, spki, &signer).unwrap();
    let cert = builder.build::<rsa::pkcs1v15::Signature>().unwrap();
    cert.to_pem(LineEnding::LF).unwrap()
}
