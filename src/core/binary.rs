//! Immutable view of a loaded object file.
//!
//! A `BinaryImage` is built once by [`crate::formats::loader::load`] and is
//! read-only afterwards; every query below is a pure lookup, so an image can be
//! shared across threads freely.

use bytes::Bytes;
use std::fmt;

use crate::core::symbol::Symbol;
use crate::error::{ProbeError, Result};

/// A named region of the object file, optionally backed by bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Format-level section index (symbols refer to sections by this number)
    pub index: usize,
    /// Section name (e.g., ".text", ".debug_info")
    pub name: String,
    /// Virtual address of the first byte
    pub address: u64,
    /// Size of the address range the section occupies
    pub size: u64,
    /// Uncompressed contents; `None` for zero-fill sections such as `.bss`
    pub data: Option<Bytes>,
}

impl Section {
    pub fn new(index: usize, name: String, address: u64, size: u64, data: Option<Bytes>) -> Self {
        Self {
            index,
            name,
            address,
            size,
            data,
        }
    }

    /// One past the last address of the section, saturating on overflow.
    pub fn end_address(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    /// True if `[address, address + size)` lies fully inside this section.
    pub fn contains_range(&self, address: u64, size: u64) -> bool {
        if size == 0 {
            // An empty range has no bytes that could fall outside.
            return true;
        }
        match address.checked_add(size) {
            Some(end) => address >= self.address && end <= self.end_address(),
            None => false,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {:#x}..{:#x}{}",
            self.name,
            self.index,
            self.address,
            self.end_address(),
            if self.has_data() { "" } else { " (no data)" }
        )
    }
}

/// Read-only view of an object file: its sections and function/data symbols.
#[derive(Debug, Clone)]
pub struct BinaryImage {
    architecture: object::Architecture,
    little_endian: bool,
    sections: Vec<Section>,
    symbols: Vec<Symbol>,
}

impl BinaryImage {
    /// Assemble an image, validating that every symbol lies inside its section.
    pub fn new(
        architecture: object::Architecture,
        little_endian: bool,
        sections: Vec<Section>,
        symbols: Vec<Symbol>,
    ) -> Result<Self> {
        let image = Self {
            architecture,
            little_endian,
            sections,
            symbols,
        };
        for sym in &image.symbols {
            let section = image.section(sym.section_index).ok_or_else(|| {
                ProbeError::MalformedObject(format!(
                    "symbol {} refers to missing section {}",
                    sym.name, sym.section_index
                ))
            })?;
            if !section.contains_range(sym.address, sym.size) {
                return Err(ProbeError::MalformedObject(format!(
                    "symbol {} ({:#x}+{:#x}) lies outside section {}",
                    sym.name, sym.address, sym.size, section
                )));
            }
        }
        Ok(image)
    }

    pub fn architecture(&self) -> object::Architecture {
        self.architecture
    }

    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Look up a section by its format-level index.
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.iter().find(|s| s.index == index)
    }

    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Find a DWARF section by its canonical `.debug_*` name.
    ///
    /// Also accepts the GNU `.zdebug_*` spelling and the Mach-O `__debug_*`
    /// spelling of the same section.
    pub fn debug_section(&self, name: &str) -> Option<&Section> {
        if let Some(s) = self.section_by_name(name) {
            return Some(s);
        }
        let suffix = name.strip_prefix(".debug_")?;
        self.section_by_name(&format!(".zdebug_{suffix}"))
            .or_else(|| self.section_by_name(&format!("__debug_{suffix}")))
    }

    /// First symbol whose name equals `name` exactly.
    pub fn find_symbol(&self, name: &str) -> Result<&Symbol> {
        self.symbols
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ProbeError::SymbolNotFound(name.to_string()))
    }

    /// The bytes covered by `symbol`, taken from its owning section.
    pub fn function_bytes(&self, symbol: &Symbol) -> Result<Bytes> {
        let section = self.section(symbol.section_index).ok_or_else(|| {
            ProbeError::MalformedObject(format!(
                "symbol {} refers to missing section {}",
                symbol.name, symbol.section_index
            ))
        })?;
        let data = section
            .data
            .as_ref()
            .ok_or_else(|| ProbeError::SectionDataError {
                section: section.name.clone(),
                symbol: symbol.name.clone(),
            })?;
        // The address range may fit the section while the file holds fewer bytes.
        let range = symbol
            .address
            .checked_sub(section.address)
            .and_then(|start| Some((start, start.checked_add(symbol.size)?)))
            .and_then(|(start, end)| Some((usize::try_from(start).ok()?, usize::try_from(end).ok()?)))
            .filter(|(_, end)| *end <= data.len())
            .ok_or_else(|| ProbeError::SectionDataError {
                section: section.name.clone(),
                symbol: symbol.name.clone(),
            })?;
        Ok(data.slice(range.0..range.1))
    }
}
