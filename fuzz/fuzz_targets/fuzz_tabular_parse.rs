#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = sped_audit::import::parse_csv(data);
    let _ = sped_audit::import::parse_spreadsheet(data);
});
