#![no_main]

use cassandra_producer::CassandraConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(serde_json::Value::Object(map)) = serde_json::from_slice(data) else {
        return;
    };

    // Decoding must either succeed or leave the record untouched.
    let mut config = CassandraConfig::default();
    let before = config.clone();
    if config.merge(&map).is_err() {
        assert_eq!(config, before);
        return;
    }

    let _ = config.host_list();
    let _ = config.effective_protocol_version();
});
