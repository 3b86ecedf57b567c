#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(blocks) = proptrace_replay::read_trace_file("fuzz.txt", s) {
            for block in &blocks {
                let _ = block.operation_counts();
                let _ = block.timesteps_are_sequential();
            }
        }
    }
});
