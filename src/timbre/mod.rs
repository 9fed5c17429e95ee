//! TimbreFiscalDigital injection and extraction.
//!
//! Injection attaches the authority's stamp to a signed document and
//! re-serializes it. Everything the issuer signed stays untouched; the
//! timbre is the final child of the complement container.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::core::{DocumentError, FiscalDocument, StampProof};
use crate::xml::{DATETIME_FORMAT, to_xml};

/// Attach a stamp to a signed document and return the certified XML.
///
/// Idempotent: injecting the same stamp into the same document again yields
/// byte-identical output. A different stamp on an already-stamped document
/// is a conflict, not an overwrite.
pub fn inject(doc: &mut FiscalDocument, proof: StampProof) -> Result<String, DocumentError> {
    if doc.signature.is_none() {
        return Err(DocumentError::Xml(
            "cannot stamp an unsigned document".to_string(),
        ));
    }
    match &doc.stamp {
        Some(existing) if *existing != proof => {
            return Err(DocumentError::Xml(format!(
                "document already stamped with UUID {}, refusing UUID {}",
                existing.uuid, proof.uuid
            )));
        }
        _ => {}
    }
    doc.stamp = Some(proof);
    to_xml(doc)
}

/// Parse the stamp fields out of a certified document's timbre node.
pub fn parse_stamp(xml: &str) -> Result<StampProof, DocumentError> {
    let mut reader = Reader::from_str(xml);
    loop {
        let event = reader
            .read_event()
            .map_err(|e| DocumentError::Xml(format!("parse error: {e}")))?;
        let element = match &event {
            Event::Empty(e) | Event::Start(e) => e,
            Event::Eof => {
                return Err(DocumentError::Xml(
                    "no TimbreFiscalDigital node in document".to_string(),
                ));
            }
            _ => continue,
        };
        if !element.name().as_ref().ends_with(b"TimbreFiscalDigital") {
            continue;
        }

        let mut version = None;
        let mut uuid = None;
        let mut certified_at = None;
        let mut authority_cert_serial = None;
        let mut authority_signature = None;
        for attr in element.attributes() {
            let attr = attr.map_err(|e| DocumentError::Xml(format!("attribute error: {e}")))?;
            let value = attr
                .unescape_value()
                .map_err(|e| DocumentError::Xml(format!("attribute error: {e}")))?
                .into_owned();
            match attr.key.as_ref() {
                b"Version" => version = Some(value),
                b"UUID" => uuid = Some(value),
                b"FechaTimbrado" => certified_at = Some(value),
                b"NoCertificadoSAT" => authority_cert_serial = Some(value),
                b"SelloSAT" => authority_signature = Some(value),
                _ => {}
            }
        }

        let missing = |field: &str| DocumentError::Xml(format!("timbre is missing {field}"));
        let certified_at = certified_at.ok_or_else(|| missing("FechaTimbrado"))?;
        let certified_at = chrono::NaiveDateTime::parse_from_str(&certified_at, DATETIME_FORMAT)
            .map_err(|e| DocumentError::Xml(format!("FechaTimbrado: {e}")))?;
        return Ok(StampProof {
            version: version.ok_or_else(|| missing("Version"))?,
            uuid: uuid.ok_or_else(|| missing("UUID"))?,
            certified_at,
            authority_cert_serial: authority_cert_serial
                .ok_or_else(|| missing("NoCertificadoSAT"))?,
            authority_signature: authority_signature.ok_or_else(|| missing("SelloSAT"))?,
        });
    }
}
