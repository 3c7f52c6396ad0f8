#![no_main]

use libfuzzer_sys::fuzz_target;
use sped_audit::import::{Importer, RawFile};

fuzz_target!(|data: &[u8]| {
    // Any archive, readable or not, yields at least one document.
    let docs = Importer::default().import_file(&RawFile::new("lote.zip", data.to_vec()));
    assert!(!docs.is_empty());
});
