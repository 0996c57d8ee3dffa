#![no_main]

use libfuzzer_sys::fuzz_target;
use platform_windows::decode_record;
use platform_windows::eventlog::parse_records;

fuzz_target!(|data: &[u8]| {
    for record in parse_records(data).flatten() {
        let first = decode_record(&record);
        let second = decode_record(&record);
        assert_eq!(first, second);
    }
});
