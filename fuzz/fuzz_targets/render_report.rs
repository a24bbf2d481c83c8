#![no_main]

use libfuzzer_sys::fuzz_target;
use renderscope::stats::aggregate;
use renderscope::timing_event::RenderReport;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing and folding host reports must never panic
        if let Ok(reports) = RenderReport::parse_lines(input) {
            let events: Vec<_> = reports
                .into_iter()
                .map(|r| r.into_event("Fuzz"))
                .collect();
            let snapshot = aggregate(&events, 0);
            for stats in snapshot.stats.values() {
                assert_eq!(stats.phase_total(), stats.sample_count);
            }
        }
    }
});
