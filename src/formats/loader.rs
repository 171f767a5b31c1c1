//! Object loader: section and symbol tables via the `object` crate.
//!
//! Any container `object` understands (ELF, Mach-O, PE/COFF) is accepted.
//! Mach-O and COFF symbol tables carry no sizes, so for those formats a
//! sizeless symbol extends to the next symbol address in its section, or to
//! the section end. Section contents are stored uncompressed, so `.zdebug_*`
//! and `SHF_COMPRESSED` debug sections read like ordinary ones downstream.

use bytes::Bytes;
use object::{BinaryFormat, Object, ObjectSection, ObjectSymbol, SymbolKind, SymbolSection};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::core::{BinaryImage, Section, Symbol};
use crate::error::{ProbeError, Result};

fn malformed(err: object::Error) -> ProbeError {
    ProbeError::MalformedObject(err.to_string())
}

/// Parse `data` into an immutable [`BinaryImage`].
pub fn load(data: Bytes) -> Result<BinaryImage> {
    let file = object::File::parse(&*data).map_err(malformed)?;

    let mut sections = Vec::new();
    for sec in file.sections() {
        let name = String::from_utf8_lossy(sec.name_bytes().map_err(malformed)?).into_owned();
        let contents = section_bytes(&data, &sec)?;
        trace!(
            section = %name,
            address = sec.address(),
            size = sec.size(),
            has_data = contents.is_some(),
            "Loaded section"
        );
        sections.push(Section::new(
            sec.index().0,
            name,
            sec.address(),
            sec.size(),
            contents,
        ));
    }

    // Static symbols first so they win over dynamic duplicates.
    let mut symbols = Vec::new();
    for sym in file.symbols().chain(file.dynamic_symbols()) {
        if !matches!(
            sym.kind(),
            SymbolKind::Text | SymbolKind::Data | SymbolKind::Label | SymbolKind::Unknown
        ) {
            continue;
        }
        let SymbolSection::Section(index) = sym.section() else {
            continue;
        };
        let name = sym.name_bytes().map_err(malformed)?;
        if name.is_empty() {
            continue;
        }
        symbols.push(Symbol::new(
            String::from_utf8_lossy(name),
            sym.address(),
            sym.size(),
            index.0,
        ));
    }

    if file.format() != BinaryFormat::Elf {
        infer_sizes(&mut symbols, &sections);
    }

    debug!(
        format = ?file.format(),
        arch = ?file.architecture(),
        sections = sections.len(),
        symbols = symbols.len(),
        "Loaded object file"
    );

    BinaryImage::new(
        file.architecture(),
        file.is_little_endian(),
        sections,
        symbols,
    )
}

/// Contents of a section as a slice of `data`, or an inflated copy when compressed.
fn section_bytes<'data, S: ObjectSection<'data>>(data: &Bytes, sec: &S) -> Result<Option<Bytes>> {
    let Some((offset, len)) = sec.file_range() else {
        return Ok(None);
    };
    match sec.uncompressed_data().map_err(malformed)? {
        Cow::Borrowed(_) => {
            let start = usize::try_from(offset)
                .map_err(|_| ProbeError::MalformedObject("section offset overflow".into()))?;
            let end = offset
                .checked_add(len)
                .and_then(|e| usize::try_from(e).ok())
                .filter(|e| *e <= data.len())
                .ok_or_else(|| {
                    ProbeError::MalformedObject(format!(
                        "section data {:#x}+{:#x} exceeds file size {:#x}",
                        offset,
                        len,
                        data.len()
                    ))
                })?;
            Ok(Some(data.slice(start..end)))
        }
        Cow::Owned(inflated) => Ok(Some(Bytes::from(inflated))),
    }
}

/// Give each zero-size symbol the span up to the next higher symbol address in
/// the same section, capped at the section end.
fn infer_sizes(symbols: &mut [Symbol], sections: &[Section]) {
    let mut starts: HashMap<usize, Vec<u64>> = HashMap::new();
    for sym in symbols.iter() {
        starts.entry(sym.section_index).or_default().push(sym.address);
    }
    for addrs in starts.values_mut() {
        addrs.sort_unstable();
        addrs.dedup();
    }

    for sym in symbols.iter_mut().filter(|s| s.size == 0) {
        let Some(section) = sections.iter().find(|s| s.index == sym.section_index) else {
            continue;
        };
        let next = starts.get(&sym.section_index).and_then(|addrs| {
            let after = addrs.partition_point(|a| *a <= sym.address);
            addrs.get(after).copied()
        });
        let end = next.map_or(section.end_address(), |n| n.min(section.end_address()));
        sym.size = end.saturating_sub(sym.address);
        trace!(symbol = %sym.name, size = sym.size, "Inferred symbol size");
    }
}

/// First symbol named `name` in `image`.
pub fn find_symbol<'a>(image: &'a BinaryImage, name: &str) -> Result<&'a Symbol> {
    image.find_symbol(name)
}

/// Bytes of `symbol` read from its owning section.
pub fn read_function_bytes(image: &BinaryImage, symbol: &Symbol) -> Result<Bytes> {
    image.function_bytes(symbol)
}
