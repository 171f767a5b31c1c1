//! Instruction decoding.
//!
//! The decoder is a single shared primitive: it turns the bytes at one
//! position into an [`Instruction`] and knows nothing about symbols, sections
//! or debug info. [`Instructions`] strings it into a straight-line pass.

pub mod iced;

use crate::core::instruction::Instruction;
use crate::error::{ProbeError, Result};

pub use self::iced::IcedDecoder;

/// Decoder backend interface.
pub trait InstructionDecoder {
    /// Decode one instruction at the start of `bytes`.
    ///
    /// The returned instruction has offset 0 and never claims more bytes
    /// than `bytes` holds.
    fn decode_one(&self, bytes: &[u8]) -> Result<Instruction>;

    /// Longest encoding this instruction set allows
    fn max_instruction_length(&self) -> usize;

    fn name(&self) -> &str;
}

/// Decode one x86-64 instruction at the start of `bytes`.
pub fn decode_one(bytes: &[u8]) -> Result<Instruction> {
    IcedDecoder.decode_one(bytes)
}

/// Decode the instruction starting `offset` bytes into `bytes`, anchored there.
pub fn decode_at<D: InstructionDecoder + ?Sized>(
    decoder: &D,
    bytes: &[u8],
    offset: u64,
) -> Result<Instruction> {
    let rest = usize::try_from(offset)
        .ok()
        .and_then(|o| bytes.get(o..))
        .ok_or_else(|| ProbeError::InvalidInstruction {
            offset,
            reason: "offset beyond end of input".to_string(),
        })?;
    let mut ins = decoder.decode_one(rest).map_err(|e| e.rebased(offset))?;
    if ins.length == 0 || ins.length > rest.len() {
        return Err(ProbeError::InvalidInstruction {
            offset,
            reason: format!(
                "{} reported length {} with {} bytes remaining",
                decoder.name(),
                ins.length,
                rest.len()
            ),
        });
    }
    ins.offset = offset;
    Ok(ins)
}

/// Sequential decoder over a byte range.
///
/// Each step starts where the previous instruction ended. Iteration ends at
/// the end of the slice or after the first error, which is yielded once.
pub struct Instructions<'a, D: InstructionDecoder + ?Sized> {
    decoder: &'a D,
    bytes: &'a [u8],
    offset: u64,
    failed: bool,
}

impl<'a, D: InstructionDecoder + ?Sized> Instructions<'a, D> {
    pub fn new(decoder: &'a D, bytes: &'a [u8]) -> Self {
        Self {
            decoder,
            bytes,
            offset: 0,
            failed: false,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<D: InstructionDecoder + ?Sized> Iterator for Instructions<'_, D> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() as u64 {
            return None;
        }
        match decode_at(self.decoder, self.bytes, self.offset) {
            Ok(ins) => {
                self.offset = ins.end_offset();
                Some(Ok(ins))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
