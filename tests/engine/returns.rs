use crate::common::code;
use crate::common::objects::ElfBuilder;
use bytes::Bytes;
use tracefacts::disasm::{decode_at, IcedDecoder};
use tracefacts::{load, symbol_return_offsets, ErrorKind};

#[test]
fn return_offsets_per_symbol() {
    let elf = ElfBuilder::new()
        .function("main.single", code::MOV_RET)
        .function("main.double", code::TWO_EXITS)
        .build();
    let image = load(Bytes::from(elf)).unwrap();

    assert_eq!(symbol_return_offsets(&image, "main.single").unwrap().as_slice(), &[5]);
    let set = symbol_return_offsets(&image, "main.double").unwrap();
    assert_eq!(set.as_slice(), &[9, 12]);

    // Re-decoding at each offset yields a return.
    let sym = image.find_symbol("main.double").unwrap();
    let bytes = image.function_bytes(sym).unwrap();
    for off in set.iter() {
        assert!(decode_at(&IcedDecoder, &bytes, *off).unwrap().is_return());
    }
}

#[test]
fn repeat_queries_agree() {
    let image = load(Bytes::from(ElfBuilder::new().function("f", code::TWO_EXITS).build())).unwrap();
    let first = symbol_return_offsets(&image, "f").unwrap();
    let second = symbol_return_offsets(&image, "f").unwrap();
    assert_eq!(first, second);
}

#[test]
fn failure_kinds() {
    let elf = ElfBuilder::new()
        .function("main.stub", code::TAIL_JUMP)
        .function("main.ok", code::XOR_RET)
        .bss_object("main.buf", 32)
        .build();
    let image = load(Bytes::from(elf)).unwrap();

    let kind = |name: &str| symbol_return_offsets(&image, name).unwrap_err().kind();
    assert_eq!(kind("main.stub"), ErrorKind::NoReturnFound);
    assert_eq!(kind("main.missing"), ErrorKind::SymbolNotFound);
    assert_eq!(kind("main.buf"), ErrorKind::SectionDataError);
}

#[test]
fn serializes_as_plain_list() {
    let image = load(Bytes::from(ElfBuilder::new().function("f", code::TWO_EXITS).build())).unwrap();
    let set = symbol_return_offsets(&image, "f").unwrap();
    assert_eq!(serde_json::to_string(&set).unwrap(), "[9,12]");
}
