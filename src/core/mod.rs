//! Core document model: types, builders, SAT normalization and validation.

mod builder;
mod error;
mod folio;
mod normalize;
mod types;
mod validation;

pub mod catalogs;
pub mod reason_codes;

pub use builder::{DocumentBuilder, LineItemBuilder, PartyBuilder, PaymentBuilder, PayrollBuilder};
pub use error::{DocumentError, ValidationError};
pub use folio::FolioSequence;
pub use normalize::{format_amount, format_quantity, format_rate, normalize, round2, round6};
pub use types::*;
pub use validation::{validate, validate_arithmetic};
