//! Calling-convention detection.
//!
//! Two independent strategies: read the compiler's producer string from the
//! compile unit, or, for binaries without debug info, look at the first
//! instruction of a tiny runtime helper. Choosing between them (and what to
//! do when both fail) is left to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::core::{BinaryImage, InstructionClass};
use crate::disasm::decode_one;
use crate::dwarf::{find_compile_unit, DebugTree, DebugValue};
use crate::error::{ProbeError, Result};

/// Producer suffix the Go toolchain appends when the register ABI is on.
pub const REGISTER_ABI_SUFFIX: &str = "; regabi";

/// `func memequal0(p, q unsafe.Pointer) bool { return true }`.
///
/// Its body starts by materialising the constant result: `mov eax, 1` under
/// the register ABI, `mov byte [rsp+N], 1` under the stack ABI.
pub const ABI_HELPER_SYMBOL: &str = "runtime.memequal0";

/// How a function receives its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallingConvention {
    #[serde(rename = "register")]
    RegisterBased,
    #[serde(rename = "stack")]
    StackBased,
}

impl CallingConvention {
    pub fn is_register_based(self) -> bool {
        self == CallingConvention::RegisterBased
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallingConvention::RegisterBased => write!(f, "register"),
            CallingConvention::StackBased => write!(f, "stack"),
        }
    }
}

/// Decide from the compile unit's `DW_AT_producer` string.
pub fn detect_from_producer(tree: &DebugTree, suffix: &str) -> Result<CallingConvention> {
    let cu = find_compile_unit(tree)?;
    let producer = match cu.attr(gimli::DW_AT_producer) {
        None => return Err(ProbeError::ProducerAttributeMissing),
        Some(DebugValue::String(s)) => s,
        Some(_) => return Err(ProbeError::ProducerAttributeWrongType),
    };
    let convention = if producer.ends_with(suffix) {
        CallingConvention::RegisterBased
    } else {
        CallingConvention::StackBased
    };
    debug!(producer = %producer, %convention, "Calling convention from producer");
    Ok(convention)
}

/// Decide from the first instruction of `helper`.
pub fn detect_from_helper(image: &BinaryImage, helper: &str) -> Result<CallingConvention> {
    let symbol = image
        .find_symbol(helper)
        .map_err(|_| ProbeError::HelperSymbolNotFound(helper.to_string()))?;
    let bytes = image.function_bytes(symbol)?;
    let ins = decode_one(&bytes)?;

    let convention = match (ins.class, ins.operands.first()) {
        (InstructionClass::MoveImmediateToRegister, Some(_)) => CallingConvention::RegisterBased,
        (InstructionClass::MoveImmediateToMemory, Some(dst)) if dst.is_stack_relative() => {
            CallingConvention::StackBased
        }
        _ => {
            return Err(ProbeError::UnexpectedInstructionShape {
                symbol: helper.to_string(),
                instruction: ins.to_string(),
            })
        }
    };
    debug!(helper, instruction = %ins, %convention, "Calling convention from helper");
    Ok(convention)
}
