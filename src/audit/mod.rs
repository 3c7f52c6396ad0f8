//! Rule-based audit and deterministic operation classification.
//!
//! [`audit_documents`] turns imported documents into
//! [`AuditedDocument`](crate::core::AuditedDocument)s
//! with a status, a score and the list of findings. [`classify_documents`]
//! then attaches an operation type voted from the items' CFOP codes, with
//! caller-supplied corrections taking precedence.
//!
//! # Example
//!
//! ```
//! use sped_audit::audit::*;
//! use sped_audit::core::*;
//! use rust_decimal_macros::dec;
//!
//! let item = CanonicalItemBuilder::new("Cadeira", dec!(2), dec!(150))
//!     .cfop("5102")
//!     .ncm("94013000")
//!     .issuer("Moveis SA", "SP")
//!     .recipient("Loja Centro", "SP")
//!     .build();
//! let doc = ImportedDocument::parsed(DocumentKind::NfeXml, "venda.xml", 900, vec![item]);
//!
//! let audited = audit_documents(vec![doc], &RulesConfig::default());
//! assert_eq!(audited[0].status, AuditStatus::Ok);
//!
//! let classified = classify_documents(audited, &InMemoryCorrections::default());
//! assert_eq!(classified[0].operation_type(), Some(OperationType::Venda));
//! ```

mod classify;
mod rules;

pub use classify::{CorrectionStore, InMemoryCorrections, business_sector, classify_documents};
pub use rules::{IMPORT_FAIL_SCORE, Rule, RulesConfig, audit_documents, validate_item};
