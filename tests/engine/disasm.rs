use tracefacts::core::{InstructionClass, Operand};
use tracefacts::disasm::{IcedDecoder, InstructionDecoder, Instructions};
use tracefacts::{decode_one, ErrorKind};

#[test]
fn decode_x86_64_minimal() {
    // xor rax, rax; ret
    let bytes: [u8; 4] = [0x48, 0x31, 0xC0, 0xC3];
    let ins1 = decode_one(&bytes).expect("insn");
    assert_eq!(ins1.mnemonic, "xor");
    assert_eq!(ins1.length, 3);
    assert_eq!(ins1.class, InstructionClass::Other);
    let ins2 = decode_one(&bytes[3..]).expect("insn2");
    assert!(ins2.is_return());
}

#[test]
fn move_forms() {
    // mov rcx, 0x2a
    let ins = decode_one(&[0x48, 0xC7, 0xC1, 0x2A, 0x00, 0x00, 0x00]).unwrap();
    assert_eq!(ins.class, InstructionClass::MoveImmediateToRegister);
    assert_eq!(ins.operands[0].register_name(), Some("rcx"));

    // mov dword ptr [rbp-4], 7
    let ins = decode_one(&[0xC7, 0x45, 0xFC, 0x07, 0x00, 0x00, 0x00]).unwrap();
    assert_eq!(ins.class, InstructionClass::MoveImmediateToMemory);
    let mem = ins.operands[0].as_memory().expect("memory destination");
    assert_eq!(mem.displacement, -4);
    assert_eq!(mem.base.as_deref(), Some("rbp"));
    assert!(ins.operands[0].is_stack_relative());
    assert!(matches!(ins.operands[1], Operand::Immediate(7)));

    // mov rax, rbx is not an immediate move
    let ins = decode_one(&[0x48, 0x89, 0xD8]).unwrap();
    assert_eq!(ins.class, InstructionClass::Other);
}

#[test]
fn never_reads_past_the_slice() {
    // Every prefix of a 7-byte instruction shorter than it must fail.
    let full = [0x48, 0xC7, 0xC1, 0x2A, 0x00, 0x00, 0x00];
    for n in 0..full.len() {
        let err = decode_one(&full[..n]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInstruction);
    }
    assert_eq!(decode_one(&full).unwrap().length, full.len());
}

#[test]
fn straight_line_pass() {
    let bytes = [0x55, 0x48, 0x89, 0xE5, 0x5D, 0xC3];
    let offsets: Vec<u64> = Instructions::new(&IcedDecoder, &bytes)
        .map(|i| i.unwrap().offset)
        .collect();
    assert_eq!(offsets, vec![0, 1, 4, 5]);
    assert_eq!(IcedDecoder.max_instruction_length(), 15);
}
