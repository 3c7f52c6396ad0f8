//! Double-entry postings derived from classified documents.
//!
//! Each operation type maps to a fixed posting rule over three amounts: the
//! document total, the sum of line totals and the ICMS sum. Whatever the
//! document total does not explain (freight, insurance, discounts) is
//! posted to a residual account, so every document balances.
//!
//! # Example
//!
//! ```
//! use sped_audit::core::*;
//! use sped_audit::ledger::*;
//! use rust_decimal_macros::dec;
//!
//! let item = CanonicalItemBuilder::new("Notebook", dec!(1), dec!(100))
//!     .nfe("NFe1", dec!(118))
//!     .cfop("1102")
//!     .icms("00", dec!(100), dec!(18), dec!(18))
//!     .build();
//! let doc = AuditedDocument::new(ImportedDocument::parsed(DocumentKind::NfeXml, "nf.xml", 1, vec![item]))
//!     .classified_as(OperationType::Compra);
//!
//! let entries = synthesize(&doc);
//! assert_eq!(entries[0].account_code, Account::Estoques.code());
//! assert_eq!(entries[2].value, dec!(118));
//! ```

mod accounts;
mod postings;

pub use accounts::{Account, account_by_code};
pub use postings::{synthesize, synthesize_all};
