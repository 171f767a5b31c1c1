//! Return-offset discovery.
//!
//! A traced function may leave through several `ret` instructions once the
//! compiler has inlined and laid out its exit paths. Uprobes have to be
//! attached at each of them, so this module walks the function body
//! linearly and records where every return begins.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use tracing::{debug, trace};

use crate::core::BinaryImage;
use crate::disasm::{IcedDecoder, InstructionDecoder, Instructions};
use crate::error::{ProbeError, Result};

/// Strictly increasing byte offsets, relative to the function start, at
/// which a return instruction begins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnOffsetSet(Vec<u64>);

impl ReturnOffsetSet {
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u64> {
        self.0
    }
}

impl Deref for ReturnOffsetSet {
    type Target = [u64];

    fn deref(&self) -> &[u64] {
        &self.0
    }
}

/// Bookkeeping from one decode pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    pub instructions: usize,
    pub bytes_consumed: u64,
}

/// Collect return offsets in `bytes` using `decoder`.
///
/// `label` names the code in errors and logs (usually the symbol name).
pub fn find_return_offsets_with<D: InstructionDecoder + ?Sized>(
    decoder: &D,
    bytes: &[u8],
    label: &str,
) -> Result<(ReturnOffsetSet, DecodeSummary)> {
    let mut offsets = Vec::new();
    let mut summary = DecodeSummary::default();

    for ins in Instructions::new(decoder, bytes) {
        let ins = ins?;
        debug_assert_eq!(ins.offset, summary.bytes_consumed);
        if ins.is_return() {
            trace!(function = label, offset = ins.offset, "Found return");
            offsets.push(ins.offset);
        }
        summary.instructions += 1;
        summary.bytes_consumed += ins.length as u64;
    }
    debug_assert_eq!(summary.bytes_consumed, bytes.len() as u64);

    if offsets.is_empty() {
        return Err(ProbeError::NoReturnFound(label.to_string()));
    }
    Ok((ReturnOffsetSet(offsets), summary))
}

/// Collect return offsets in a function body with the x86-64 decoder.
pub fn find_return_offsets(bytes: &[u8]) -> Result<ReturnOffsetSet> {
    find_return_offsets_with(&IcedDecoder, bytes, "<bytes>").map(|(set, _)| set)
}

/// Look up `symbol` in `image` and collect the return offsets of its body.
pub fn symbol_return_offsets(image: &BinaryImage, symbol: &str) -> Result<ReturnOffsetSet> {
    let sym = image.find_symbol(symbol)?;
    let bytes = image.function_bytes(sym)?;
    let (set, summary) = find_return_offsets_with(&IcedDecoder, &bytes, symbol)?;
    debug!(
        symbol,
        address = sym.address,
        size = sym.size,
        instructions = summary.instructions,
        returns = set.len(),
        "Collected return offsets"
    );
    Ok(set)
}
