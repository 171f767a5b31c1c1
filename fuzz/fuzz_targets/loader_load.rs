#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = tracefacts::load(bytes::Bytes::copy_from_slice(data)) {
        let _ = tracefacts::DebugTree::parse(&image);
        for sym in image.symbols() {
            let _ = tracefacts::symbol_return_offsets(&image, &sym.name);
        }
    }
});
