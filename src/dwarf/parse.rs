//! Build a [`DebugTree`] from an image's DWARF sections with gimli.

use gimli::{AttributeValue, Dwarf, EndianSlice, RunTimeEndian, SectionId, Unit};
use tracing::debug;

use super::tree::{DebugEntry, DebugTree, DebugValue};
use crate::core::BinaryImage;
use crate::error::{ProbeError, Result};

type Reader<'a> = EndianSlice<'a, RunTimeEndian>;

/// Deepest entry nesting accepted in one unit; the unit root is level 0.
pub const MAX_DEPTH: usize = 1024;

fn unavailable(err: gimli::Error) -> ProbeError {
    ProbeError::DebugInfoUnavailable(err.to_string())
}

impl DebugTree {
    /// Parse every unit in `image`'s `.debug_info` into an owned tree.
    ///
    /// A missing or empty `.debug_info` and any parse error are reported as
    /// [`ProbeError::DebugInfoUnavailable`].
    pub fn parse(image: &BinaryImage) -> Result<DebugTree> {
        let has_info = image
            .debug_section(".debug_info")
            .and_then(|s| s.data.as_ref())
            .is_some_and(|d| !d.is_empty());
        if !has_info {
            return Err(ProbeError::DebugInfoUnavailable(
                "no .debug_info section".to_string(),
            ));
        }

        let endian = if image.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        let load_section = |id: SectionId| {
            let data = image
                .debug_section(id.name())
                .and_then(|s| s.data.as_deref())
                .unwrap_or(&[]);
            Ok::<_, gimli::Error>(EndianSlice::new(data, endian))
        };
        let dwarf = Dwarf::load(load_section).map_err(unavailable)?;

        let mut units = Vec::new();
        let mut headers = dwarf.units();
        while let Some(header) = headers.next().map_err(unavailable)? {
            let unit = dwarf.unit(header).map_err(unavailable)?;
            units.push(build_unit(&dwarf, &unit)?);
        }

        let tree = DebugTree::new(units);
        debug!(
            units = tree.units.len(),
            entries = tree.entry_count(),
            "Parsed debug info"
        );
        Ok(tree)
    }
}

/// Build one unit's tree in a single depth-first pass.
///
/// `open` holds the entries on the path from the unit root to the entry read
/// last; an entry moves into its parent once the walk climbs past it.
fn build_unit<'a>(dwarf: &Dwarf<Reader<'a>>, unit: &Unit<Reader<'a>>) -> Result<DebugEntry> {
    let mut cursor = unit.entries();
    let mut open: Vec<DebugEntry> = Vec::new();
    let mut root = None;
    let mut depth: isize = 0;

    while let Some((delta, die)) = cursor.next_dfs().map_err(unavailable)? {
        depth += delta;
        // Climbing above the root ends the unit.
        let Ok(level) = usize::try_from(depth) else {
            break;
        };
        if level > open.len() {
            return Err(ProbeError::DebugInfoUnavailable(format!(
                "entry at depth {} has no parent",
                level
            )));
        }
        if level >= MAX_DEPTH {
            return Err(ProbeError::DebugInfoUnavailable(format!(
                "nesting too deep (limit {})",
                MAX_DEPTH
            )));
        }
        close_to(&mut open, level, &mut root);
        if root.is_some() {
            break;
        }

        let mut entry = DebugEntry::new(die.tag());
        let mut attrs = die.attrs();
        while let Some(attr) = attrs.next().map_err(unavailable)? {
            entry
                .attributes
                .push((attr.name(), owned_value(dwarf, unit, attr.value())));
        }
        open.push(entry);
    }

    close_to(&mut open, 0, &mut root);
    root.ok_or_else(|| ProbeError::DebugInfoUnavailable("unit has no entries".to_string()))
}

/// Finish open entries until only `level` remain.
fn close_to(open: &mut Vec<DebugEntry>, level: usize, root: &mut Option<DebugEntry>) {
    while open.len() > level {
        let Some(done) = open.pop() else { break };
        match open.last_mut() {
            Some(parent) => parent.children.push(done),
            None => *root = Some(done),
        }
    }
}

fn owned_value<'a>(
    dwarf: &Dwarf<Reader<'a>>,
    unit: &Unit<Reader<'a>>,
    value: AttributeValue<Reader<'a>>,
) -> DebugValue {
    match value {
        AttributeValue::String(_)
        | AttributeValue::DebugStrRef(_)
        | AttributeValue::DebugStrRefSup(_)
        | AttributeValue::DebugLineStrRef(_)
        | AttributeValue::DebugStrOffsetsIndex(_) => match dwarf.attr_string(unit, value) {
            Ok(s) => DebugValue::String(s.to_string_lossy().into_owned()),
            Err(e) => DebugValue::Other(format!("unresolved string: {}", e)),
        },
        AttributeValue::Flag(f) => DebugValue::Flag(f),
        AttributeValue::Sdata(v) => DebugValue::Signed(v),
        AttributeValue::Addr(a) => DebugValue::Unsigned(a),
        AttributeValue::UnitRef(offset) => DebugValue::Reference(offset.0 as u64),
        AttributeValue::Exprloc(expr) => DebugValue::Expression(expr.0.slice().to_vec()),
        other => match other.udata_value() {
            Some(v) => DebugValue::Unsigned(v),
            None => DebugValue::Other(format!("{:?}", other)),
        },
    }
}
