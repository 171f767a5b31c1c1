use iced_x86::{Decoder, DecoderError, DecoderOptions, Mnemonic, OpKind, Register as IReg};

use super::InstructionDecoder;
use crate::core::instruction::{Instruction, InstructionClass, MemoryOperand, Operand};
use crate::error::{ProbeError, Result};

/// x86-64 decoder backed by iced-x86.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcedDecoder;

impl IcedDecoder {
    const BITS: u32 = 64;

    fn register_name(r: IReg) -> Option<String> {
        if r == IReg::None {
            None
        } else {
            Some(format!("{:?}", r).to_ascii_lowercase())
        }
    }

    fn operands(instr: &iced_x86::Instruction) -> Vec<Operand> {
        (0..instr.op_count())
            .filter_map(|i| match instr.op_kind(i) {
                OpKind::Register => Self::register_name(instr.op_register(i)).map(Operand::Register),
                OpKind::Memory => Some(Operand::Memory(MemoryOperand {
                    base: Self::register_name(instr.memory_base()),
                    index: Self::register_name(instr.memory_index()),
                    scale: instr.memory_index_scale() as u8,
                    displacement: instr.memory_displacement64() as i64,
                })),
                OpKind::Immediate8 => Some(Operand::Immediate(instr.immediate8() as i8 as i64)),
                OpKind::Immediate16 => Some(Operand::Immediate(instr.immediate16() as i16 as i64)),
                OpKind::Immediate32 => Some(Operand::Immediate(instr.immediate32() as i32 as i64)),
                OpKind::Immediate64 => Some(Operand::Immediate(instr.immediate64() as i64)),
                OpKind::Immediate8to16 | OpKind::Immediate8to32 | OpKind::Immediate8to64 => {
                    Some(Operand::Immediate(instr.immediate8to64()))
                }
                OpKind::Immediate32to64 => Some(Operand::Immediate(instr.immediate32to64())),
                OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64 => {
                    Some(Operand::Immediate(instr.near_branch_target() as i64))
                }
                // Far branches and string operands are not needed downstream.
                _ => None,
            })
            .collect()
    }

    fn classify(instr: &iced_x86::Instruction) -> InstructionClass {
        match instr.mnemonic() {
            Mnemonic::Ret => InstructionClass::Return,
            Mnemonic::Mov if instr.op_count() == 2 && Self::is_immediate(instr.op1_kind()) => {
                match instr.op0_kind() {
                    OpKind::Register => InstructionClass::MoveImmediateToRegister,
                    OpKind::Memory => InstructionClass::MoveImmediateToMemory,
                    _ => InstructionClass::Other,
                }
            }
            _ => InstructionClass::Other,
        }
    }

    fn is_immediate(kind: OpKind) -> bool {
        matches!(
            kind,
            OpKind::Immediate8
                | OpKind::Immediate16
                | OpKind::Immediate32
                | OpKind::Immediate64
                | OpKind::Immediate8to16
                | OpKind::Immediate8to32
                | OpKind::Immediate8to64
                | OpKind::Immediate32to64
        )
    }
}

impl InstructionDecoder for IcedDecoder {
    fn decode_one(&self, bytes: &[u8]) -> Result<Instruction> {
        if bytes.is_empty() {
            return Err(ProbeError::InvalidInstruction {
                offset: 0,
                reason: "no bytes remain".to_string(),
            });
        }
        let mut decoder = Decoder::with_ip(Self::BITS, bytes, 0, DecoderOptions::NONE);
        let instr = decoder.decode();
        if instr.is_invalid() {
            let reason = match decoder.last_error() {
                DecoderError::NoMoreBytes => "instruction truncated by end of input",
                _ => "invalid x86-64 encoding",
            };
            return Err(ProbeError::InvalidInstruction {
                offset: 0,
                reason: reason.to_string(),
            });
        }

        Ok(Instruction {
            offset: 0,
            length: instr.len(),
            class: Self::classify(&instr),
            mnemonic: format!("{:?}", instr.mnemonic()).to_ascii_lowercase(),
            operands: Self::operands(&instr),
        })
    }

    fn max_instruction_length(&self) -> usize {
        15
    }

    fn name(&self) -> &str {
        "iced-x86"
    }
}
