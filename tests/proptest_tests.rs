//! Property-based tests for normalization and cadena generation.
//!
//! Run with: `cargo test --features all --test proptest_tests`

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use timbrado::cadena::cadena_original;
use timbrado::core::*;

fn issuer() -> Party {
    PartyBuilder::new("EKU9003173C9", "ESCUELA KEMPER URGATE")
        .fiscal_regime("601")
        .build()
}

fn recipient() -> Party {
    PartyBuilder::new("XAXX010101000", "PUBLICO EN GENERAL")
        .fiscal_regime("616")
        .zip("64000")
        .cfdi_usage("G03")
        .build()
}

/// Build a valid income document with the given lines.
fn build_income(lines: Vec<LineItem>) -> FiscalDocument {
    let issued = NaiveDate::from_ymd_opt(2026, 3, 12)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let mut builder = DocumentBuilder::new(DocumentType::Income, issued)
        .series("A")
        .folio("1")
        .expedition_place("64000")
        .payment_method(PaymentMethod::Single)
        .payment_form("03")
        .issuer(issuer())
        .recipient(recipient());
    for line in lines {
        builder = builder.add_line(line);
    }
    builder.build().unwrap()
}

// ── Proptest Strategies ─────────────────────────────────────────────────────

/// Unit price with up to 4 decimals (0.0001 to 9999.9999).
fn arb_price() -> impl Strategy<Value = Decimal> {
    (1u64..100_000_000u64).prop_map(|n| Decimal::new(n as i64, 4))
}

/// Quantity 1 to 1000.
fn arb_quantity() -> impl Strategy<Value = Decimal> {
    (1u32..=1000u32).prop_map(Decimal::from)
}

/// Optional transferred IVA and optional withheld ISR.
fn arb_taxes() -> impl Strategy<Value = (bool, bool)> {
    (any::<bool>(), any::<bool>())
}

fn arb_line() -> impl Strategy<Value = LineItem> {
    (arb_quantity(), arb_price(), arb_taxes()).prop_map(|(qty, price, (iva, isr))| {
        let mut builder = LineItemBuilder::new("84111506", "Servicio", qty, "E48", price);
        if iva {
            builder = builder.transferred("002", dec!(0.16));
        }
        if isr {
            builder = builder.withheld("001", dec!(0.10));
        }
        builder.build()
    })
}

fn arb_lines() -> impl Strategy<Value = Vec<LineItem>> {
    prop::collection::vec(arb_line(), 1..6)
}

proptest! {
    #[test]
    fn cadena_is_deterministic(lines in arb_lines()) {
        let doc = build_income(lines);
        prop_assert_eq!(cadena_original(&doc), cadena_original(&doc));
    }

    #[test]
    fn line_amounts_are_two_decimal_roundings(lines in arb_lines()) {
        let doc = build_income(lines);
        for line in &doc.lines {
            prop_assert_eq!(line.amount, round2(line.quantity * line.unit_price));
        }
        let expected: Decimal = doc.lines.iter().map(|l| l.amount).sum();
        prop_assert_eq!(doc.sub_total, round2(expected));
    }

    #[test]
    fn rates_serialize_with_six_decimals(lines in arb_lines()) {
        let doc = build_income(lines);
        let cadena = cadena_original(&doc);
        if doc.lines.iter().any(|l| !l.taxes.is_empty()) {
            prop_assert!(cadena.contains("|0.160000|") || cadena.contains("|0.100000|"));
        }
    }

    #[test]
    fn retention_block_precedes_transfer_block(lines in arb_lines()) {
        let doc = build_income(lines);
        let Some(taxes) = &doc.taxes else { return Ok(()) };
        if taxes.retentions.is_empty() || taxes.transfers.is_empty() {
            return Ok(());
        }
        let cadena = cadena_original(&doc);

        // The document-level section is the tail of the cadena; inside it the
        // retentions total and the SubTotal re-emission sit between the
        // retention entries and the transfer entries.
        let tail = format!(
            "|{:.2}|{:.2}|",
            taxes.total_withheld, doc.sub_total
        );
        let marker = cadena.rfind(&tail);
        prop_assert!(marker.is_some(), "cadena missing {} in {}", tail, cadena);

        let after = &cadena[marker.unwrap() + tail.len()..];
        // Everything after the marker is transfer entries plus the final
        // transfers total.
        prop_assert!(after.contains("002"));
        let total_transferred = format!("{:.2}||", taxes.total_transferred);
        prop_assert!(after.ends_with(&total_transferred));
    }

    #[test]
    fn total_formula_holds(lines in arb_lines()) {
        let doc = build_income(lines);
        let withheld = doc.taxes.as_ref().map(|t| t.total_withheld).unwrap_or(Decimal::ZERO);
        let transferred = doc.taxes.as_ref().map(|t| t.total_transferred).unwrap_or(Decimal::ZERO);
        prop_assert_eq!(doc.total, round2(doc.sub_total + transferred - withheld));
    }

    #[test]
    fn pipe_count_depends_only_on_shape(lines in arb_lines()) {
        let doc = build_income(lines.clone());
        let mut other = build_income(lines);
        other.series = None;
        other.folio = None;
        prop_assert_eq!(
            cadena_original(&doc).matches('|').count(),
            cadena_original(&other).matches('|').count()
        );
    }
}
