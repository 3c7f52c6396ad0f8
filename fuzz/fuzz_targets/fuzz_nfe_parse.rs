#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Errors are fine, panics are bugs.
    if let Ok(items) = sped_audit::import::parse_nfe_xml(data) {
        assert!(!items.is_empty());
    }
});
