#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let properties = proptrace_spec::parse_properties(s);
        // Rule resolution must accept anything the parser keeps.
        let rules = proptrace_model::RuleRegistry::standard().resolve(&properties);
        let _ = rules.names();
    }
});
