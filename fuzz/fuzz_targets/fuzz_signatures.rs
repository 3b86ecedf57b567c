#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        for op in proptrace_spec::extract_operations(s) {
            assert!(!op.name.is_empty());
        }
    }
});
