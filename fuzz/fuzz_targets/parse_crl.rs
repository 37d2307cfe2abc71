#![no_main]

use libfuzzer_sys::fuzz_target;
use crlgate_lib::RevocationList;

fuzz_target!(|data: &[u8]| {
    // The CRL parser must never panic, regardless of input.
    if let Ok(list) = RevocationList::from_bytes(data) {
        let _ = list.len();
        let _ = list.issuers();
        for entry in list.entries() {
            let _ = list.find_serial(&entry.serial);
        }
    }
});
