//! Owned debug-information tree and the lookups over it.
//!
//! Every node owns its children outright, so searches are plain traversals
//! with no cursor state shared between calls.

use gimli::{DwAt, DwTag};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{ProbeError, Result};

/// Owned attribute value with strings already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugValue {
    String(String),
    Unsigned(u64),
    Signed(i64),
    Flag(bool),
    /// Offset of another entry, relative to its unit
    Reference(u64),
    /// Raw DWARF expression bytes (`exprloc` form)
    Expression(Vec<u8>),
    /// Any other form, kept only as a description
    Other(String),
}

impl DebugValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DebugValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for DebugValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugValue::String(s) => write!(f, "{:?}", s),
            DebugValue::Unsigned(v) => write!(f, "{}", v),
            DebugValue::Signed(v) => write!(f, "{}", v),
            DebugValue::Flag(v) => write!(f, "{}", v),
            DebugValue::Reference(o) => write!(f, "<{:#x}>", o),
            DebugValue::Expression(b) => write!(f, "expr{:02x?}", b),
            DebugValue::Other(d) => write!(f, "{}", d),
        }
    }
}

/// One node of the debug-info tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEntry {
    pub tag: DwTag,
    pub attributes: Vec<(DwAt, DebugValue)>,
    pub children: Vec<DebugEntry>,
}

impl DebugEntry {
    pub fn new(tag: DwTag) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, at: DwAt, value: DebugValue) -> Self {
        self.attributes.push((at, value));
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: DebugEntry) -> Self {
        self.children.push(child);
        self
    }

    /// First value recorded for `at`.
    pub fn attr(&self, at: DwAt) -> Option<&DebugValue> {
        self.attributes
            .iter()
            .find(|(name, _)| *name == at)
            .map(|(_, v)| v)
    }

    /// The `DW_AT_name` string, if present.
    pub fn name(&self) -> Option<&str> {
        self.attr(gimli::DW_AT_name).and_then(DebugValue::as_str)
    }

    pub fn children(&self) -> &[DebugEntry] {
        &self.children
    }

    fn is_declaration(&self) -> bool {
        matches!(
            self.attr(gimli::DW_AT_declaration),
            Some(DebugValue::Flag(true))
        )
    }

    /// Depth-first, pre-order walk over this entry and its descendants.
    pub fn iter(&self) -> Entries<'_> {
        Entries { stack: vec![self] }
    }
}

impl Drop for DebugEntry {
    // Flatten descendants onto a work list so deep trees drop without recursion.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut entry) = pending.pop() {
            pending.append(&mut entry.children);
        }
    }
}

/// Pre-order iterator over a subtree.
pub struct Entries<'a> {
    stack: Vec<&'a DebugEntry>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = &'a DebugEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.stack.pop()?;
        self.stack.extend(entry.children.iter().rev());
        Some(entry)
    }
}

/// The whole debug-info tree of one image: one root per unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugTree {
    pub units: Vec<DebugEntry>,
}

impl DebugTree {
    pub fn new(units: Vec<DebugEntry>) -> Self {
        Self { units }
    }

    /// Depth-first walk across all units, in unit order.
    pub fn iter(&self) -> impl Iterator<Item = &DebugEntry> {
        self.units.iter().flat_map(DebugEntry::iter)
    }

    pub fn entry_count(&self) -> usize {
        self.iter().count()
    }
}

/// Byte offset of a named field within a named structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldOffset {
    pub structure: String,
    pub field: String,
    pub offset: u64,
}

/// First entry carrying the compile-unit tag.
pub fn find_compile_unit(tree: &DebugTree) -> Result<&DebugEntry> {
    tree.iter()
        .find(|e| e.tag == gimli::DW_TAG_compile_unit)
        .ok_or(ProbeError::CompileUnitNotFound)
}

/// Depth-first search for a structure type called `name`.
///
/// Declaration-only entries are skipped: they carry no members.
pub fn find_structure<'a>(tree: &'a DebugTree, name: &str) -> Result<&'a DebugEntry> {
    tree.iter()
        .find(|e| e.tag == gimli::DW_TAG_structure_type && e.name() == Some(name) && !e.is_declaration())
        .ok_or_else(|| ProbeError::StructureNotFound(name.to_string()))
}

/// Offset of the direct member `name` of `structure`.
pub fn find_member(structure: &DebugEntry, name: &str) -> Result<FieldOffset> {
    let struct_name = structure.name().unwrap_or("<anonymous>");
    let not_found = || ProbeError::MemberNotFound {
        structure: struct_name.to_string(),
        member: name.to_string(),
    };

    let member = structure
        .children()
        .iter()
        .find(|c| c.tag == gimli::DW_TAG_member && c.name() == Some(name))
        .ok_or_else(not_found)?;

    let offset = match member.attr(gimli::DW_AT_data_member_location) {
        // No location means the member starts the structure.
        None => 0,
        Some(DebugValue::Unsigned(v)) => *v,
        Some(DebugValue::Signed(v)) if *v >= 0 => *v as u64,
        Some(DebugValue::Expression(expr)) => plus_uconst(expr).ok_or_else(|| {
            warn!(structure = struct_name, member = name, "Unsupported member location expression");
            not_found()
        })?,
        Some(other) => {
            warn!(structure = struct_name, member = name, location = %other, "Unusable member location");
            return Err(not_found());
        }
    };

    debug!(structure = struct_name, member = name, offset, "Resolved member offset");
    Ok(FieldOffset {
        structure: struct_name.to_string(),
        field: name.to_string(),
        offset,
    })
}

/// Decode an expression consisting of exactly one `DW_OP_plus_uconst`.
fn plus_uconst(expr: &[u8]) -> Option<u64> {
    let (&op, rest) = expr.split_first()?;
    if op != gimli::DW_OP_plus_uconst.0 {
        return None;
    }
    let mut value = 0u64;
    for (i, byte) in rest.iter().enumerate() {
        let shift = 7 * i as u32;
        if shift >= 64 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return (i + 1 == rest.len()).then_some(value);
        }
    }
    None
}
