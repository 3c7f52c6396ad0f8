//! SPED EFD ICMS/IPI fixed-format generation.
//!
//! Emits blocks 0, C and 9 as pipe-delimited records (`|REG|F1|F2|...|`),
//! CRLF-terminated, with comma decimals and no thousands separator.
//!
//! Record order:
//!
//! | Record | Content |
//! |--------|---------|
//! | `0000` | Header: period, company identity |
//! | `0001` | Block 0 opener |
//! | `C001` | Block C opener |
//! | `C100` | One per document |
//! | `C190` | Per document, one per (CST, CFOP, ICMS rate) |
//! | `C170` | Per document, one per item |
//! | `C990` | Block C record count, itself included |
//! | `9001` | Block 9 opener |
//! | `0990` | Block 0 closer |
//! | `9900` | One per register type: its occurrence count |
//! | `9990` | Block 9 record count |
//! | `9999` | Total line count of the file |
//!
//! # Example
//!
//! ```
//! use sped_audit::sped::*;
//! use chrono::NaiveDate;
//!
//! let config = SpedConfigBuilder::new("ACME LTDA", "12345678000195", "SP")
//!     .generated_on(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap())
//!     .build();
//! let sped = encode(&[], &config);
//!
//! assert_eq!(sped.filename, "SPED-EFD-2024-04-02.txt");
//! assert!(verify_control_counts(&sped.content).is_ok());
//! ```

mod efd;
mod records;

pub use efd::{SpedConfig, SpedConfigBuilder, encode, sanitize_text};
pub use records::{ControlMismatch, parse_records, verify_control_counts};
