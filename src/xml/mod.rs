//! CFDI 4.0 XML serialization.
//!
//! CFDI is attribute-oriented: almost every value is an attribute and most
//! leaf elements are empty. Attribute order follows the SAT schema so the
//! output is byte-stable for a given document.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use std::io::Cursor;

use crate::core::{
    format_amount, format_quantity, format_rate, Complement, DocumentError, FiscalDocument,
    LineItem, Party, PaymentComplement, PayrollComplement, StampProof, TaxSummary,
};

const CFDI_NS: &str = "http://www.sat.gob.mx/cfd/4";
const TFD_NS: &str = "http://www.sat.gob.mx/TimbreFiscalDigital";
const NOMINA_NS: &str = "http://www.sat.gob.mx/nomina12";
const PAGOS_NS: &str = "http://www.sat.gob.mx/Pagos20";

/// Fecha / FechaTimbrado format: local time, second precision, no offset.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn xml_io(e: std::io::Error) -> DocumentError {
    DocumentError::Xml(format!("write error: {e}"))
}

/// Thin wrapper over [`quick_xml::Writer`] for attribute-heavy documents.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, DocumentError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, DocumentError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| DocumentError::Xml(format!("UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<&mut Self, DocumentError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer.write_event(Event::Start(elem)).map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, DocumentError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Write a self-closing element carrying only attributes.
    pub fn empty_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<&mut Self, DocumentError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer.write_event(Event::Empty(elem)).map_err(xml_io)?;
        Ok(self)
    }
}

/// Serialize a document as cfdi:Comprobante. Deterministic: the same
/// document always yields the same bytes.
pub fn to_xml(doc: &FiscalDocument) -> Result<String, DocumentError> {
    let mut w = XmlWriter::new()?;

    let fecha = doc.issued_at.format(DATETIME_FORMAT).to_string();
    let sub_total = format_amount(doc.sub_total);
    let total = format_amount(doc.total);
    let descuento = doc.discount.map(format_amount);

    let mut attrs: Vec<(&str, &str)> = vec![
        ("xmlns:cfdi", CFDI_NS),
        ("Version", "4.0"),
    ];
    if let Some(series) = &doc.series {
        attrs.push(("Serie", series));
    }
    if let Some(folio) = &doc.folio {
        attrs.push(("Folio", folio));
    }
    attrs.push(("Fecha", &fecha));
    if let Some(sig) = &doc.signature {
        attrs.push(("Sello", &sig.sello));
        attrs.push(("NoCertificado", &sig.certificate_serial));
        attrs.push(("Certificado", &sig.certificate_b64));
    }
    if let Some(form) = &doc.payment_form {
        attrs.push(("FormaPago", form));
    }
    attrs.push(("SubTotal", &sub_total));
    if let Some(descuento) = &descuento {
        attrs.push(("Descuento", descuento));
    }
    attrs.push(("Moneda", &doc.currency));
    attrs.push(("Total", &total));
    attrs.push(("TipoDeComprobante", doc.doc_type.code()));
    if let Some(method) = doc.payment_method {
        attrs.push(("MetodoPago", method.code()));
    }
    attrs.push(("LugarExpedicion", &doc.expedition_place));
    w.start_element("cfdi:Comprobante", &attrs)?;

    write_issuer(&mut w, &doc.issuer)?;
    write_recipient(&mut w, &doc.recipient)?;

    w.start_element("cfdi:Conceptos", &[])?;
    for line in &doc.lines {
        write_line(&mut w, line)?;
    }
    w.end_element("cfdi:Conceptos")?;

    if let Some(taxes) = &doc.taxes {
        write_tax_summary(&mut w, taxes)?;
    }

    if doc.complement.is_some() || doc.stamp.is_some() {
        w.start_element("cfdi:Complemento", &[])?;
        match &doc.complement {
            Some(Complement::Payroll(payroll)) => write_payroll(&mut w, payroll)?,
            Some(Complement::Payment(payment)) => write_payments(&mut w, payment)?,
            None => {}
        }
        if let Some(stamp) = &doc.stamp {
            let sello_cfd = doc.signature.as_ref().map(|s| s.sello.as_str()).unwrap_or("");
            write_stamp(&mut w, stamp, sello_cfd)?;
        }
        w.end_element("cfdi:Complemento")?;
    }

    w.end_element("cfdi:Comprobante")?;
    w.into_string()
}

fn write_issuer(w: &mut XmlWriter, issuer: &Party) -> Result<(), DocumentError> {
    let mut attrs: Vec<(&str, &str)> = vec![("Rfc", &issuer.rfc), ("Nombre", &issuer.name)];
    if let Some(regime) = &issuer.fiscal_regime {
        attrs.push(("RegimenFiscal", regime));
    }
    w.empty_element("cfdi:Emisor", &attrs)?;
    Ok(())
}

fn write_recipient(w: &mut XmlWriter, recipient: &Party) -> Result<(), DocumentError> {
    let mut attrs: Vec<(&str, &str)> = vec![("Rfc", &recipient.rfc), ("Nombre", &recipient.name)];
    if let Some(zip) = &recipient.zip {
        attrs.push(("DomicilioFiscalReceptor", zip));
    }
    if let Some(regime) = &recipient.fiscal_regime {
        attrs.push(("RegimenFiscalReceptor", regime));
    }
    if let Some(usage) = &recipient.cfdi_usage {
        attrs.push(("UsoCFDI", usage));
    }
    w.empty_element("cfdi:Receptor", &attrs)?;
    Ok(())
}

fn write_line(w: &mut XmlWriter, line: &LineItem) -> Result<(), DocumentError> {
    let cantidad = format_quantity(line.quantity);
    let valor_unitario = line.unit_price.to_string();
    let importe = format_amount(line.amount);
    let attrs: Vec<(&str, &str)> = vec![
        ("ClaveProdServ", &line.product_code),
        ("Cantidad", &cantidad),
        ("ClaveUnidad", &line.unit),
        ("Descripcion", &line.description),
        ("ValorUnitario", &valor_unitario),
        ("Importe", &importe),
    ];
    if line.taxes.is_empty() {
        w.empty_element("cfdi:Concepto", &attrs)?;
        return Ok(());
    }

    w.start_element("cfdi:Concepto", &attrs)?;
    w.start_element("cfdi:Impuestos", &[])?;
    // The normalizer keeps withheld entries first; partition preserves the
    // XML grouping of Retenciones before Traslados.
    let retained: Vec<_> = line
        .taxes
        .iter()
        .filter(|t| t.kind == crate::core::TaxKind::Withheld)
        .collect();
    let transferred: Vec<_> = line
        .taxes
        .iter()
        .filter(|t| t.kind == crate::core::TaxKind::Transferred)
        .collect();
    if !retained.is_empty() {
        w.start_element("cfdi:Retenciones", &[])?;
        for tax in retained {
            let base = format_amount(tax.base);
            let mut attrs: Vec<(&str, &str)> = vec![
                ("Base", &base),
                ("Impuesto", &tax.code),
                ("TipoFactor", tax.factor.code()),
            ];
            let rate = tax.rate.map(format_rate);
            let amount = tax.amount.map(format_amount);
            if let Some(rate) = &rate {
                attrs.push(("TasaOCuota", rate));
            }
            if let Some(amount) = &amount {
                attrs.push(("Importe", amount));
            }
            w.empty_element("cfdi:Retencion", &attrs)?;
        }
        w.end_element("cfdi:Retenciones")?;
    }
    if !transferred.is_empty() {
        w.start_element("cfdi:Traslados", &[])?;
        for tax in transferred {
            let base = format_amount(tax.base);
            let mut attrs: Vec<(&str, &str)> = vec![
                ("Base", &base),
                ("Impuesto", &tax.code),
                ("TipoFactor", tax.factor.code()),
            ];
            let rate = tax.rate.map(format_rate);
            let amount = tax.amount.map(format_amount);
            if let Some(rate) = &rate {
                attrs.push(("TasaOCuota", rate));
            }
            if let Some(amount) = &amount {
                attrs.push(("Importe", amount));
            }
            w.empty_element("cfdi:Traslado", &attrs)?;
        }
        w.end_element("cfdi:Traslados")?;
    }
    w.end_element("cfdi:Impuestos")?;
    w.end_element("cfdi:Concepto")?;
    Ok(())
}

fn write_tax_summary(w: &mut XmlWriter, taxes: &TaxSummary) -> Result<(), DocumentError> {
    let total_withheld = format_amount(taxes.total_withheld);
    let total_transferred = format_amount(taxes.total_transferred);
    // Both totals are emitted whenever the section exists, mirroring the
    // canonical string: the two serializations must agree on which fields
    // the document carries.
    let attrs: [(&str, &str); 2] = [
        ("TotalImpuestosRetenidos", &total_withheld),
        ("TotalImpuestosTrasladados", &total_transferred),
    ];
    w.start_element("cfdi:Impuestos", &attrs)?;
    if !taxes.retentions.is_empty() {
        w.start_element("cfdi:Retenciones", &[])?;
        for retention in &taxes.retentions {
            let amount = format_amount(retention.amount);
            w.empty_element(
                "cfdi:Retencion",
                &[("Impuesto", &retention.code), ("Importe", &amount)],
            )?;
        }
        w.end_element("cfdi:Retenciones")?;
    }
    if !taxes.transfers.is_empty() {
        w.start_element("cfdi:Traslados", &[])?;
        for transfer in &taxes.transfers {
            let mut attrs: Vec<(&str, &str)> = vec![
                ("Impuesto", &transfer.code),
                ("TipoFactor", transfer.factor.code()),
            ];
            let rate = transfer.rate.map(format_rate);
            let amount = transfer.amount.map(format_amount);
            if let Some(rate) = &rate {
                attrs.push(("TasaOCuota", rate));
            }
            if let Some(amount) = &amount {
                attrs.push(("Importe", amount));
            }
            w.empty_element("cfdi:Traslado", &attrs)?;
        }
        w.end_element("cfdi:Traslados")?;
    }
    w.end_element("cfdi:Impuestos")?;
    Ok(())
}

fn write_payroll(w: &mut XmlWriter, payroll: &PayrollComplement) -> Result<(), DocumentError> {
    let fecha_pago = payroll.payment_date.format("%Y-%m-%d").to_string();
    let total_percepciones = format_amount(payroll.total_perceptions);
    let total_deducciones = format_amount(payroll.total_deductions);
    let mut attrs: Vec<(&str, &str)> = vec![
        ("xmlns:nomina12", NOMINA_NS),
        ("Version", "1.2"),
        ("FechaPago", &fecha_pago),
        ("TotalPercepciones", &total_percepciones),
    ];
    if !payroll.deductions.is_empty() {
        attrs.push(("TotalDeducciones", &total_deducciones));
    }
    w.start_element("nomina12:Nomina", &attrs)?;
    w.start_element("nomina12:Percepciones", &[])?;
    for concept in &payroll.perceptions {
        let amount = format_amount(concept.amount);
        w.empty_element(
            "nomina12:Percepcion",
            &[
                ("Clave", &concept.code),
                ("Concepto", &concept.description),
                ("Importe", &amount),
            ],
        )?;
    }
    w.end_element("nomina12:Percepciones")?;
    if !payroll.deductions.is_empty() {
        w.start_element("nomina12:Deducciones", &[])?;
        for concept in &payroll.deductions {
            let amount = format_amount(concept.amount);
            w.empty_element(
                "nomina12:Deduccion",
                &[
                    ("Clave", &concept.code),
                    ("Concepto", &concept.description),
                    ("Importe", &amount),
                ],
            )?;
        }
        w.end_element("nomina12:Deducciones")?;
    }
    w.end_element("nomina12:Nomina")?;
    Ok(())
}

fn write_payments(w: &mut XmlWriter, complement: &PaymentComplement) -> Result<(), DocumentError> {
    w.start_element(
        "pago20:Pagos",
        &[("xmlns:pago20", PAGOS_NS), ("Version", "2.0")],
    )?;
    for payment in &complement.payments {
        let fecha_pago = payment.paid_at.format(DATETIME_FORMAT).to_string();
        let monto = format_amount(payment.amount);
        w.start_element(
            "pago20:Pago",
            &[
                ("FechaPago", &fecha_pago),
                ("FormaDePagoP", &payment.payment_form),
                ("MonedaP", &payment.currency),
                ("Monto", &monto),
            ],
        )?;
        for related in &payment.related {
            let parcialidad = related.installment.to_string();
            let saldo_anterior = format_amount(related.previous_balance);
            let pagado = format_amount(related.amount_paid);
            let insoluto = format_amount(related.remaining_balance);
            let mut attrs: Vec<(&str, &str)> = vec![("IdDocumento", &related.uuid)];
            if let Some(series) = &related.series {
                attrs.push(("Serie", series));
            }
            if let Some(folio) = &related.folio {
                attrs.push(("Folio", folio));
            }
            attrs.push(("NumParcialidad", &parcialidad));
            attrs.push(("ImpSaldoAnt", &saldo_anterior));
            attrs.push(("ImpPagado", &pagado));
            attrs.push(("ImpSaldoInsoluto", &insoluto));
            w.empty_element("pago20:DoctoRelacionado", &attrs)?;
        }
        w.end_element("pago20:Pago")?;
    }
    w.end_element("pago20:Pagos")?;
    Ok(())
}

fn write_stamp(w: &mut XmlWriter, stamp: &StampProof, sello_cfd: &str) -> Result<(), DocumentError> {
    let fecha = stamp.certified_at.format(DATETIME_FORMAT).to_string();
    w.empty_element(
        "tfd:TimbreFiscalDigital",
        &[
            ("xmlns:tfd", TFD_NS),
            ("Version", &stamp.version),
            ("UUID", &stamp.uuid),
            ("FechaTimbrado", &fecha),
            ("SelloCFD", sello_cfd),
            ("NoCertificadoSAT", &stamp.authority_cert_serial),
            ("SelloSAT", &stamp.authority_signature),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn sample_doc() -> FiscalDocument {
        let issued = NaiveDate::from_ymd_opt(2026, 3, 12)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        DocumentBuilder::new(DocumentType::Income, issued)
            .series("A")
            .folio("1042")
            .expedition_place("64000")
            .payment_method(PaymentMethod::Single)
            .payment_form("03")
            .issuer(
                PartyBuilder::new("EKU9003173C9", "ESCUELA KEMPER URGATE")
                    .fiscal_regime("601")
                    .build(),
            )
            .recipient(
                PartyBuilder::new("XAXX010101000", "PUBLICO EN GENERAL")
                    .fiscal_regime("616")
                    .zip("64000")
                    .cfdi_usage("G03")
                    .build(),
            )
            .add_line(
                LineItemBuilder::new("84111506", "Servicio", dec!(2), "E48", dec!(100.005))
                    .transferred("002", dec!(0.16))
                    .build(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn serializes_root_attributes_in_schema_order() {
        let xml = to_xml(&sample_doc()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<cfdi:Comprobante"));
        assert!(xml.contains("Version=\"4.0\""));
        assert!(xml.contains("Fecha=\"2026-03-12T10:30:00\""));
        assert!(xml.contains("SubTotal=\"200.01\""));
        assert!(xml.contains("Total=\"232.01\""));
        assert!(xml.contains("TipoDeComprobante=\"I\""));
        assert!(xml.contains("MetodoPago=\"PUE\""));
        // Serie precedes Fecha, SubTotal precedes Total
        let serie = xml.find("Serie=").unwrap();
        let fecha = xml.find("Fecha=").unwrap();
        assert!(serie < fecha);
    }

    #[test]
    fn unsigned_document_has_no_sello_attributes() {
        let xml = to_xml(&sample_doc()).unwrap();
        assert!(!xml.contains("Sello="));
        assert!(!xml.contains("NoCertificado="));
        assert!(!xml.contains("cfdi:Complemento"));
    }

    #[test]
    fn signed_document_carries_signature_attributes() {
        let mut doc = sample_doc();
        doc.signature = Some(SignatureBlock {
            sello: "U0VMTE8=".into(),
            certificate_serial: "30001000000400002434".into(),
            certificate_b64: "Q0VSVA==".into(),
        });
        let xml = to_xml(&doc).unwrap();
        assert!(xml.contains("Sello=\"U0VMTE8=\""));
        assert!(xml.contains("NoCertificado=\"30001000000400002434\""));
        assert!(xml.contains("Certificado=\"Q0VSVA==\""));
    }

    #[test]
    fn stamped_document_ends_with_timbre() {
        let mut doc = sample_doc();
        doc.signature = Some(SignatureBlock {
            sello: "U0VMTE8=".into(),
            certificate_serial: "30001000000400002434".into(),
            certificate_b64: "Q0VSVA==".into(),
        });
        doc.stamp = Some(StampProof {
            version: "1.1".into(),
            uuid: "AAAAAAAA-BBBB-CCCC-DDDD-EEEEEEEEEEEE".into(),
            certified_at: NaiveDate::from_ymd_opt(2026, 3, 12)
                .unwrap()
                .and_hms_opt(10, 31, 5)
                .unwrap(),
            authority_cert_serial: "30001000000400002495".into(),
            authority_signature: "U0FUU0lH".into(),
        });
        let xml = to_xml(&doc).unwrap();
        assert!(xml.contains("<cfdi:Complemento>"));
        assert!(xml.contains("tfd:TimbreFiscalDigital"));
        assert!(xml.contains("UUID=\"AAAAAAAA-BBBB-CCCC-DDDD-EEEEEEEEEEEE\""));
        assert!(xml.contains("SelloCFD=\"U0VMTE8=\""));
        assert!(xml.contains("FechaTimbrado=\"2026-03-12T10:31:05\""));
        // The timbre is the last child before the closing root tag.
        let timbre = xml.find("tfd:TimbreFiscalDigital").unwrap();
        let closing = xml.find("</cfdi:Comprobante>").unwrap();
        assert!(timbre < closing);
    }

    #[test]
    fn line_taxes_grouped_retentions_first() {
        let issued = NaiveDate::from_ymd_opt(2026, 3, 12)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let doc = DocumentBuilder::new(DocumentType::Income, issued)
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
                LineItemBuilder::new("80101500", "Honorarios", dec!(1), "E48", dec!(1000))
                    .transferred("002", dec!(0.16))
                    .withheld("001", dec!(0.10))
                    .build(),
            )
            .build()
            .unwrap();
        let xml = to_xml(&doc).unwrap();
        let retenciones = xml.find("<cfdi:Retenciones>").unwrap();
        let traslados = xml.find("<cfdi:Traslados>").unwrap();
        assert!(retenciones < traslados);
        assert!(xml.contains("TotalImpuestosRetenidos=\"100.00\""));
        assert!(xml.contains("TotalImpuestosTrasladados=\"160.00\""));
        assert!(xml.contains("TasaOCuota=\"0.160000\""));
    }

    #[test]
    fn tax_totals_present_even_without_retentions() {
        // The canonical string always carries both totals when the
        // document-level section exists; the XML must agree.
        let xml = to_xml(&sample_doc()).unwrap();
        assert!(xml.contains("TotalImpuestosRetenidos=\"0.00\""));
        assert!(xml.contains("TotalImpuestosTrasladados=\"32.00\""));
        assert!(!xml.contains("<cfdi:Retenciones>"));
    }

    #[test]
    fn serialization_is_deterministic() {
        let doc = sample_doc();
        assert_eq!(to_xml(&doc).unwrap(), to_xml(&doc).unwrap());
    }
}
