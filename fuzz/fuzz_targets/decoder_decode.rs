#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(ins) = tracefacts::decode_one(data) {
        assert!(ins.length > 0 && ins.length <= data.len());
    }
    let _ = tracefacts::find_return_offsets(data);
});
