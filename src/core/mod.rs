//! Core data types for tracefacts.
//!
//! Plain values produced by the loader and decoder and consumed by the
//! analyses: sections and images, symbols, and decoded instructions.

pub mod binary;
pub mod instruction;
pub mod symbol;

pub use binary::{BinaryImage, Section};
pub use instruction::{Instruction, InstructionClass, MemoryOperand, Operand};
pub use symbol::Symbol;
