//! # timbrado
//!
//! Mexican CFDI 4.0 digital-invoicing core covering the certification
//! pipeline: document construction, SAT value normalization, cadena original
//! generation, CSD signing, PAC submission, and timbre injection.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//! Field ordering in the serialized document and in the cadena original is
//! enforced by typed builders and a single serializer, not by call order.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use timbrado::core::*;
//! use rust_decimal_macros::dec;
//!
//! let issued = NaiveDate::from_ymd_opt(2026, 3, 12).unwrap().and_hms_opt(10, 30, 0).unwrap();
//! let invoice = DocumentBuilder::new(DocumentType::Income, issued)
//!     .series("A").folio("1042")
//!     .expedition_place("64000")
//!     .payment_method(PaymentMethod::Single)
//!     .payment_form("03")
//!     .issuer(PartyBuilder::new("EKU9003173C9", "ESCUELA KEMPER URGATE")
//!         .fiscal_regime("601").build())
//!     .recipient(PartyBuilder::new("XAXX010101000", "PUBLICO EN GENERAL")
//!         .zip("64000").cfdi_usage("G03").build())
//!     .add_line(LineItemBuilder::new("84111506", "Servicios de facturación", dec!(2), "E48", dec!(100.005))
//!         .transferred("002", dec!(0.16)).build())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(invoice.sub_total, dec!(200.01));
//! assert_eq!(invoice.total, dec!(232.01));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Document model, builders, SAT normalization & validation, folio sequence |
//! | `xml` | CFDI 4.0 XML serialization |
//! | `cadena` | Cadena original (canonical string) generation |
//! | `sello` | CSD certificate handling and RSA/SHA-256 signing |
//! | `pac` | Async PAC certification client |
//! | `pipeline` | Certification orchestrator and state machine |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "xml")]
pub mod xml;

#[cfg(feature = "cadena")]
pub mod cadena;

#[cfg(feature = "sello")]
pub mod sello;

#[cfg(feature = "pac")]
pub mod pac;

#[cfg(feature = "pipeline")]
pub mod pipeline;

#[cfg(feature = "xml")]
pub mod timbre;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
