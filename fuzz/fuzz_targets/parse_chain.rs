#![no_main]

use libfuzzer_sys::fuzz_target;
use crlgate_lib::{parse_pem_chain, Certificate};

fuzz_target!(|data: &[u8]| {
    // Handshake input is untrusted: parsing must never panic.
    if let Ok(cert) = Certificate::from_der(data) {
        let _ = cert.serial_hex();
        let _ = cert.issuer().to_string();
        let _ = cert.subject().to_string();
    }
    let _ = parse_pem_chain(data);
});
