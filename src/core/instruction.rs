//! Instruction and Operand types for decoded x86-64 instructions.
//!
//! An `Instruction` is anchored at a byte offset relative to whatever base the
//! caller decoded from (usually the start of a function).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse opcode classification used by the analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionClass {
    /// Near return (`ret`, `ret imm16`)
    Return,
    /// `mov reg, imm`
    MoveImmediateToRegister,
    /// `mov [mem], imm`
    MoveImmediateToMemory,
    /// Anything else
    Other,
}

impl fmt::Display for InstructionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionClass::Return => write!(f, "Return"),
            InstructionClass::MoveImmediateToRegister => write!(f, "MoveImmediateToRegister"),
            InstructionClass::MoveImmediateToMemory => write!(f, "MoveImmediateToMemory"),
            InstructionClass::Other => write!(f, "Other"),
        }
    }
}

/// `[base + index * scale + displacement]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryOperand {
    pub base: Option<String>,
    pub index: Option<String>,
    /// 1 when there is no index register
    pub scale: u8,
    pub displacement: i64,
}

impl MemoryOperand {
    /// Addressed off the stack or frame pointer.
    pub fn is_stack_relative(&self) -> bool {
        matches!(self.base.as_deref(), Some("rsp" | "esp" | "rbp" | "ebp"))
    }
}

impl fmt::Display for MemoryOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(2);
        if let Some(base) = &self.base {
            parts.push(base.clone());
        }
        if let Some(index) = &self.index {
            parts.push(match self.scale {
                0 | 1 => index.clone(),
                n => format!("{} * {}", index, n),
            });
        }
        let disp = self.displacement;
        let mut text = parts.join(" + ");
        if text.is_empty() {
            text = format!("{:#x}", disp);
        } else if disp > 0 {
            text.push_str(&format!(" + {:#x}", disp));
        } else if disp < 0 {
            text.push_str(&format!(" - {:#x}", disp.unsigned_abs()));
        }
        write!(f, "[{}]", text)
    }
}

/// One decoded operand, destination first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Lower-case register name, e.g. `eax`
    Register(String),
    /// Sign-extended immediate; branch targets are stored here too
    Immediate(i64),
    Memory(MemoryOperand),
}

impl Operand {
    pub fn register_name(&self) -> Option<&str> {
        match self {
            Operand::Register(name) => Some(name),
            _ => None,
        }
    }

    pub fn immediate_value(&self) -> Option<i64> {
        match self {
            Operand::Immediate(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<&MemoryOperand> {
        match self {
            Operand::Memory(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_stack_relative(&self) -> bool {
        self.as_memory().is_some_and(MemoryOperand::is_stack_relative)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(name) => f.write_str(name),
            Operand::Immediate(v) => write!(f, "{:#x}", v),
            Operand::Memory(m) => write!(f, "{}", m),
        }
    }
}

/// Decoded instruction at a byte offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Offset of the first byte, relative to the decode base
    pub offset: u64,
    /// Number of bytes consumed
    pub length: usize,
    /// Coarse classification
    pub class: InstructionClass,
    /// Lower-case mnemonic (e.g., "mov", "ret")
    pub mnemonic: String,
    /// Structured operands in Intel order (destination first)
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn is_return(&self) -> bool {
        self.class == InstructionClass::Return
    }

    /// Offset of the byte following this instruction
    pub fn end_offset(&self) -> u64 {
        self.offset + self.length as u64
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}: {}", self.offset, self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { " " } else { ", " }, op)?;
        }
        Ok(())
    }
}
