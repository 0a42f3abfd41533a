#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(meta) = bloatmap::BuildMetadata::from_json_str(s) {
            let _ = meta.pcln_total();
            let _ = meta.version_flag().prefix_policy();
        }
    }
});
