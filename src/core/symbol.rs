//! Symbol table entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named address range owned by one section.
///
/// Names are not guaranteed unique by the object format; lookups take the
/// first match in table order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// Symbol name as stored in the table (not demangled)
    pub name: String,
    /// Virtual address of the first byte
    pub address: u64,
    /// Size in bytes; zero when the format does not record one
    pub size: u64,
    /// Format-level index of the owning section
    pub section_index: usize,
}

impl Symbol {
    pub fn new(name: impl Into<String>, address: u64, size: u64, section_index: usize) -> Self {
        Self {
            name: name.into(),
            address,
            size,
            section_index,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}+{:#x}", self.name, self.address, self.size)
    }
}
