//! # sped-audit
//!
//! Brazilian fiscal document pipeline: ingests NFe XML, CSV, XLSX, PDF and
//! ZIP batches, normalizes them into one canonical item model, audits and
//! reconciles them across documents, derives double-entry postings and
//! emits a SPED EFD ICMS/IPI text file with self-checking record counts.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use sped_audit::core::*;
//! use sped_audit::ledger::synthesize;
//! use sped_audit::sped::{SpedConfigBuilder, encode, verify_control_counts};
//! use rust_decimal_macros::dec;
//!
//! let item = CanonicalItemBuilder::new("Parafuso 10mm", dec!(100), dec!(1))
//!     .nfe("NFe35240112345678000195550010000000011000000010", dec!(118))
//!     .cfop("1102")
//!     .icms("00", dec!(100), dec!(18), dec!(18))
//!     .build();
//! let doc = AuditedDocument::new(ImportedDocument::parsed(
//!     DocumentKind::NfeXml, "compra.xml", 1024, vec![item],
//! ))
//! .classified_as(OperationType::Compra);
//!
//! let entries = synthesize(&doc);
//! assert_eq!(entries.len(), 3);
//!
//! let config = SpedConfigBuilder::new("ACME LTDA", "12345678000195", "SP").build();
//! let sped = encode(&[doc], &config);
//! assert!(verify_control_counts(&sped.content).is_ok());
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Data model, audit rules, reconciliation, ledger, SPED encoder, report |
//! | `import` (default) | Format detection, NFe/CSV/XLSX/PDF normalization, ZIP expansion, batch import |
//! | `json` (default) | JSON export of the audit report |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod audit;

#[cfg(feature = "core")]
pub mod reconcile;

#[cfg(feature = "core")]
pub mod ledger;

#[cfg(feature = "core")]
pub mod sped;

#[cfg(feature = "core")]
pub mod report;

#[cfg(feature = "import")]
pub mod import;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
