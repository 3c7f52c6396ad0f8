#![no_main]

use libfuzzer_sys::fuzz_target;
use sped_audit::core::*;
use sped_audit::sped::{SpedConfigBuilder, encode, parse_records, verify_control_counts};

fuzz_target!(|data: &[u8]| {
    // CSV bytes → items → EFD; the written file must verify and keep
    // fixed record widths whatever text the items carry.
    let Ok(items) = sped_audit::import::parse_csv(data) else {
        return;
    };
    let doc = AuditedDocument::new(ImportedDocument::parsed(DocumentKind::Csv, "fuzz.csv", data.len() as u64, items))
        .classified_as(OperationType::Venda);
    let config = SpedConfigBuilder::new("FUZZ LTDA", "12345678000195", "SP").build();
    let sped = encode(&[doc], &config);

    assert!(verify_control_counts(&sped.content).is_ok());
    for record in parse_records(&sped.content) {
        if record[0] == "C170" {
            assert_eq!(record.len(), 15);
        }
    }
});
