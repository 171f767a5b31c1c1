//! Structural facts about compiled Go executables for uprobe tooling.
//!
//! Given an x86-64 object file, `tracefacts` answers three questions a
//! tracing-program generator needs: where a function returns, where the
//! scheduler keeps the goroutine id, and which calling convention the
//! compiler used.

/// Analyses built on the loader, decoder and debug-info walker
pub mod analysis;
/// Configuration types
pub mod config;
/// Core data types module
pub mod core;
pub mod disasm;
pub mod dwarf;
pub mod error;
pub mod formats;
pub mod io;
pub mod logging;
/// Caller facade with fallback and caching policies
pub mod target;

pub use analysis::{
    detect_from_helper, detect_from_producer, find_return_offsets, locate_thread_id_field,
    symbol_return_offsets, CallingConvention, ReturnOffsetSet,
};
pub use config::AnalysisConfig;
pub use crate::core::{BinaryImage, Instruction, Section, Symbol};
pub use disasm::decode_one;
pub use dwarf::{DebugEntry, DebugTree, FieldOffset};
pub use error::{ErrorKind, ProbeError, Result};
pub use formats::{find_symbol, load, read_function_bytes};
pub use target::{ConventionDecision, ConventionSource, ReturnOffsetCache, Target, TargetFacts};
