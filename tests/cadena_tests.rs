//! Integration tests for cadena original generation and XML serialization.

mod common;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use timbrado::cadena::cadena_original;
use timbrado::core::*;
use timbrado::xml::to_xml;

use common::{income_doc, issued_at, issuer, recipient};

#[test]
fn rounding_scenario_two_items() {
    let doc = DocumentBuilder::new(DocumentType::Income, issued_at())
        .series("A")
        .folio("1")
        .expedition_place("64000")
        .payment_method(PaymentMethod::Single)
        .payment_form("03")
        .issuer(issuer())
        .recipient(recipient())
        .add_line(
            LineItemBuilder::new("84111506", "Servicio", dec!(2), "E48", dec!(100.005))
                .transferred("002", dec!(0.16))
                .build(),
        )
        .add_line(
            LineItemBuilder::new("84111506", "Soporte", dec!(1), "E48", dec!(50))
                .transferred("002", dec!(0.16))
                .build(),
        )
        .build()
        .unwrap();

    assert_eq!(doc.lines[0].amount, dec!(200.01));
    assert_eq!(doc.sub_total, dec!(250.01));

    let cadena = cadena_original(&doc);
    assert!(cadena.contains("|200.01|"));
    assert!(cadena.contains("|0.160000|"));

    let xml = to_xml(&doc).unwrap();
    assert!(xml.contains("TasaOCuota=\"0.160000\""));
    assert!(xml.contains("Importe=\"200.01\""));
}

#[test]
fn cadena_and_xml_agree_on_amounts() {
    let doc = income_doc();
    let cadena = cadena_original(&doc);
    let xml = to_xml(&doc).unwrap();
    for value in ["200.01", "232.01", "32.00", "0.160000"] {
        assert!(cadena.contains(value), "cadena missing {value}");
        assert!(xml.contains(value), "xml missing {value}");
    }
}

#[test]
fn signing_does_not_change_cadena() {
    let mut doc = income_doc();
    let before = cadena_original(&doc);
    doc.signature = Some(SignatureBlock {
        sello: "U0VMTE8=".into(),
        certificate_serial: "30001000000400002434".into(),
        certificate_b64: "Q0VSVA==".into(),
    });
    assert_eq!(cadena_original(&doc), before);
}

#[test]
fn payroll_document_cadena() {
    let doc = PayrollBuilder::new(issued_at(), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap())
        .series("N")
        .folio("7")
        .expedition_place("64000")
        .issuer(issuer())
        .employee(
            PartyBuilder::new("XAXX010101000", "EMPLEADO UNO")
                .fiscal_regime("605")
                .zip("64000")
                .build(),
        )
        .perception("001", "Sueldo", dec!(12000))
        .deduction("002", "ISR", dec!(1500))
        .build()
        .unwrap();

    let cadena = cadena_original(&doc);
    // No payment method: the field stays, empty.
    assert!(cadena.contains("|N|"));
    assert!(cadena.contains("|12000.00|1500.00|MXN|10500.00|N||64000|"));

    let xml = to_xml(&doc).unwrap();
    assert!(xml.contains("TipoDeComprobante=\"N\""));
    assert!(xml.contains("Descuento=\"1500.00\""));
    assert!(xml.contains("nomina12:Nomina"));
    assert!(xml.contains("TotalPercepciones=\"12000.00\""));
    assert!(!xml.contains("MetodoPago="));
}

#[test]
fn payment_document_has_zero_totals_and_pagos_complement() {
    let doc = PaymentBuilder::new(issued_at())
        .series("P")
        .folio("3")
        .expedition_place("64000")
        .issuer(issuer())
        .recipient(recipient())
        .add_payment(PaymentRecord {
            paid_at: issued_at(),
            payment_form: "03".into(),
            currency: "MXN".into(),
            amount: dec!(580.00),
            related: vec![RelatedDocument {
                uuid: "AAAAAAAA-BBBB-CCCC-DDDD-EEEEEEEEEEEE".into(),
                series: Some("A".into()),
                folio: Some("1042".into()),
                installment: 1,
                previous_balance: dec!(1160.00),
                amount_paid: dec!(580.00),
                remaining_balance: dec!(580.00),
            }],
        })
        .build()
        .unwrap();

    let cadena = cadena_original(&doc);
    assert!(cadena.contains("|0.00||XXX|0.00|P||64000|"));

    let xml = to_xml(&doc).unwrap();
    assert!(xml.contains("Moneda=\"XXX\""));
    assert!(xml.contains("pago20:Pagos"));
    assert!(xml.contains("Monto=\"580.00\""));
    assert!(xml.contains("NumParcialidad=\"1\""));
    assert!(xml.contains("ImpSaldoInsoluto=\"580.00\""));
}

#[test]
fn exempt_tax_has_empty_rate_and_amount_fields() {
    let doc = DocumentBuilder::new(DocumentType::Income, issued_at())
        .series("A")
        .folio("9")
        .expedition_place("64000")
        .payment_method(PaymentMethod::Single)
        .payment_form("03")
        .issuer(issuer())
        .recipient(recipient())
        .add_line(
            LineItemBuilder::new("85121600", "Consulta médica", dec!(1), "E48", dec!(800))
                .exempt("002")
                .build(),
        )
        .build()
        .unwrap();

    let cadena = cadena_original(&doc);
    // Base, code, factor, then empty rate and amount.
    assert!(cadena.contains("|800.00|002|Exento|||"));

    let xml = to_xml(&doc).unwrap();
    assert!(xml.contains("TipoFactor=\"Exento\""));
    assert!(!xml.contains("TasaOCuota=\"\""));
}

#[test]
fn cadena_stable_across_serialization() {
    let doc = income_doc();
    let before = cadena_original(&doc);
    let _ = to_xml(&doc).unwrap();
    assert_eq!(cadena_original(&doc), before);
}
