//! Error types for the tracefacts introspection engine.
//!
//! The taxonomy is closed: every failure the engine can report is one of the
//! variants below, and callers can match on [`ErrorKind`] exhaustively.

use thiserror::Error;

/// Main error type for tracefacts operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Header, section table or symbol table could not be parsed, or a
    /// symbol's address range escapes its owning section.
    #[error("Malformed object file: {0}")]
    MalformedObject(String),

    /// No symbol table entry matched the requested name
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The section owning a symbol has no backing bytes
    #[error("Section {section} has no data for symbol {symbol}")]
    SectionDataError { section: String, symbol: String },

    /// Bytes at `offset` do not form a valid x86-64 instruction
    #[error("Invalid instruction at offset {offset:#x}: {reason}")]
    InvalidInstruction { offset: u64, reason: String },

    /// The function body decoded cleanly but contains no return
    #[error("No return instruction found in {0}")]
    NoReturnFound(String),

    /// Debug information is absent or could not be parsed
    #[error("Debug info unavailable: {0}")]
    DebugInfoUnavailable(String),

    #[error("Compile unit not found in debug info")]
    CompileUnitNotFound,

    #[error("Structure not found in debug info: {0}")]
    StructureNotFound(String),

    #[error("Member {member} not found in structure {structure}")]
    MemberNotFound { structure: String, member: String },

    #[error("Compile unit has no producer attribute")]
    ProducerAttributeMissing,

    #[error("Compile unit producer attribute is not a string")]
    ProducerAttributeWrongType,

    #[error("Helper symbol not found: {0}")]
    HelperSymbolNotFound(String),

    /// The helper's first instruction matches neither expected shape
    #[error("Unexpected instruction shape in {symbol}: {instruction}")]
    UnexpectedInstructionShape { symbol: String, instruction: String },

    /// Opening or mapping the input file failed
    #[error("I/O error: {0}")]
    Io(#[from] crate::io::error::IoError),
}

/// Fieldless mirror of [`ProbeError`] for exhaustive matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedObject,
    SymbolNotFound,
    SectionDataError,
    InvalidInstruction,
    NoReturnFound,
    DebugInfoUnavailable,
    CompileUnitNotFound,
    StructureNotFound,
    MemberNotFound,
    ProducerAttributeMissing,
    ProducerAttributeWrongType,
    HelperSymbolNotFound,
    UnexpectedInstructionShape,
    Io,
}

impl ProbeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::MalformedObject(_) => ErrorKind::MalformedObject,
            ProbeError::SymbolNotFound(_) => ErrorKind::SymbolNotFound,
            ProbeError::SectionDataError { .. } => ErrorKind::SectionDataError,
            ProbeError::InvalidInstruction { .. } => ErrorKind::InvalidInstruction,
            ProbeError::NoReturnFound(_) => ErrorKind::NoReturnFound,
            ProbeError::DebugInfoUnavailable(_) => ErrorKind::DebugInfoUnavailable,
            ProbeError::CompileUnitNotFound => ErrorKind::CompileUnitNotFound,
            ProbeError::StructureNotFound(_) => ErrorKind::StructureNotFound,
            ProbeError::MemberNotFound { .. } => ErrorKind::MemberNotFound,
            ProbeError::ProducerAttributeMissing => ErrorKind::ProducerAttributeMissing,
            ProbeError::ProducerAttributeWrongType => ErrorKind::ProducerAttributeWrongType,
            ProbeError::HelperSymbolNotFound(_) => ErrorKind::HelperSymbolNotFound,
            ProbeError::UnexpectedInstructionShape { .. } => ErrorKind::UnexpectedInstructionShape,
            ProbeError::Io(_) => ErrorKind::Io,
        }
    }

    /// Shift the offset of an `InvalidInstruction` error by `base`.
    ///
    /// Decoders report offsets relative to the slice they were handed; callers
    /// walking a larger range rebase them so the error points into the function.
    pub(crate) fn rebased(self, base: u64) -> Self {
        match self {
            ProbeError::InvalidInstruction { offset, reason } => ProbeError::InvalidInstruction {
                offset: offset + base,
                reason,
            },
            other => other,
        }
    }
}

/// Result type alias for tracefacts operations
pub type Result<T> = std::result::Result<T, ProbeError>;
