#![no_main]

use cassandra_producer::connection::{resolve_bundle, TlsMaterial};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    // Split the input into certificate / key / CA sections.
    let mut parts = text.splitn(3, '\u{0}');
    let certificate = parts.next().unwrap_or_default();
    let private_key = parts.next().unwrap_or_default();
    let issuing_ca = parts.next().unwrap_or_default();

    if let Ok(material) = TlsMaterial::from_parts(certificate, private_key, issuing_ca) {
        let _ = resolve_bundle(&material);
    }
});
