//! Configuration for target analysis.
//!
//! Provides centralized configuration for the caller-facing [`crate::target::Target`]
//! with defaults matching the Go runtime layout. Every section can be
//! overridden from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::abi::{ABI_HELPER_SYMBOL, REGISTER_ABI_SUFFIX};
use crate::analysis::goid::{SCHEDULER_STRUCT, THREAD_ID_FIELD};
use crate::io::error::IoError;

/// Master configuration for analysing one target executable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// I/O configuration for reading the target file.
    pub io: IoConfig,
    /// Names of the runtime scheduler structure and its thread-id field.
    pub runtime: RuntimeConfig,
    /// Calling-convention detection parameters.
    pub abi: AbiConfig,
}

impl AnalysisConfig {
    /// Parse a configuration from JSON; absent keys keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Load a configuration file from disk.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text).map_err(|e| IoError::Config(e.to_string()))
    }
}

/// I/O configuration for file reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Maximum file size to open (default: 1073741824 = 1GB).
    pub max_file_size: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024 * 1024,
        }
    }
}

/// Where the scheduler's thread identifier lives in the debug info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Structure type describing a scheduler-managed execution unit (default: "runtime.g").
    pub scheduler_struct: String,
    /// Member holding the thread identifier (default: "goid").
    pub thread_id_field: String,
    /// Offset used when the debug info cannot supply one. `None` makes the
    /// failure fatal.
    pub fallback_thread_id_offset: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scheduler_struct: SCHEDULER_STRUCT.to_string(),
            thread_id_field: THREAD_ID_FIELD.to_string(),
            fallback_thread_id_offset: None,
        }
    }
}

/// Calling-convention detection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbiConfig {
    /// Producer-string suffix announcing register-based argument passing.
    pub register_abi_suffix: String,
    /// Runtime helper whose first instruction reveals the convention.
    pub helper_symbol: String,
}

impl Default for AbiConfig {
    fn default() -> Self {
        Self {
            register_abi_suffix: REGISTER_ABI_SUFFIX.to_string(),
            helper_symbol: ABI_HELPER_SYMBOL.to_string(),
        }
    }
}
