//! Core data model, errors and defensive numerics.
//!
//! This module provides the canonical item model every format is normalized
//! into, the audited-document wrapper downstream stages consume, and the
//! tolerant number parsing that keeps bad values from failing a batch.

mod builder;
mod error;
mod fields;
pub mod numbers;
mod types;

pub use builder::*;
pub use error::*;
pub use fields::*;
pub use numbers::{
    format_brl, format_sped_decimal, format_sped_quantity, parse_emission_date, parse_safe_decimal, saturating_sum,
};
pub use types::*;
