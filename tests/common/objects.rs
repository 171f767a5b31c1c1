//! Builders for synthetic ELF objects and Go-runtime-shaped DWARF.

use gimli::write::{AttributeValue, DwarfUnit, EndianVec, Sections, UnitEntryId};
use gimli::{Encoding, Format, LittleEndian};
use object::write::{Mangling, Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope};

pub struct ElfBuilder {
    obj: Object<'static>,
}

impl Default for ElfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ElfBuilder {
    pub fn new() -> Self {
        Self {
            obj: Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little),
        }
    }

    /// Same builder for another container format, with names written unmangled.
    pub fn for_format(format: BinaryFormat) -> Self {
        let mut obj = Object::new(format, Architecture::X86_64, Endianness::Little);
        obj.set_mangling(Mangling::None);
        Self { obj }
    }

    /// Append `code` to `.text` under a function symbol `name`.
    pub fn function(mut self, name: &str, code: &[u8]) -> Self {
        let text = self.obj.section_id(StandardSection::Text);
        let offset = self.obj.append_section_data(text, code, 16);
        self.obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: offset,
            size: code.len() as u64,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
        self
    }

    /// Reserve `size` zero-fill bytes in `.bss` under a symbol `name`.
    pub fn bss_object(mut self, name: &str, size: u64) -> Self {
        let bss = self.obj.section_id(StandardSection::UninitializedData);
        let offset = self.obj.append_section_bss(bss, size, 8);
        self.obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: offset,
            size,
            kind: SymbolKind::Data,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(bss),
            flags: SymbolFlags::None,
        });
        self
    }

    /// Write every non-empty DWARF section of `dwarf` into the object.
    pub fn dwarf(mut self, dwarf: &mut DwarfUnit) -> Self {
        let mut sections = Sections::new(EndianVec::new(LittleEndian));
        dwarf.write(&mut sections).unwrap();
        sections
            .for_each(|id, data| {
                let bytes = data.slice();
                if !bytes.is_empty() {
                    let section = self.obj.add_section(
                        Vec::new(),
                        id.name().as_bytes().to_vec(),
                        SectionKind::Debug,
                    );
                    self.obj.append_section_data(section, bytes, 1);
                }
                Ok::<(), gimli::write::Error>(())
            })
            .unwrap();
        self
    }

    /// Add a section `name` holding exactly `data`.
    pub fn raw_section(mut self, name: &str, data: &[u8]) -> Self {
        let section = self
            .obj
            .add_section(Vec::new(), name.as_bytes().to_vec(), SectionKind::Debug);
        self.obj.append_section_data(section, data, 1);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.obj.write().unwrap()
    }
}

/// Shape of the synthetic runtime debug info.
pub struct RuntimeDwarf {
    pub producer: Option<AttributeValue>,
    pub goid_offset: Option<u64>,
    /// Emit a declaration-only `runtime.g` before the definition.
    pub with_declaration: bool,
}

impl Default for RuntimeDwarf {
    fn default() -> Self {
        Self {
            producer: Some(AttributeValue::String(
                b"Go cmd/compile go1.17.2; regabi".to_vec(),
            )),
            goid_offset: Some(152),
            with_declaration: false,
        }
    }
}

impl RuntimeDwarf {
    pub fn stack_abi() -> Self {
        Self {
            producer: Some(AttributeValue::String(b"Go cmd/compile go1.16.9".to_vec())),
            ..Self::default()
        }
    }

    pub fn build(self) -> DwarfUnit {
        let encoding = Encoding {
            format: Format::Dwarf32,
            version: 4,
            address_size: 8,
        };
        let mut dwarf = DwarfUnit::new(encoding);
        let root = dwarf.unit.root();
        let name = dwarf.strings.add("runtime");
        dwarf.unit.get_mut(root).set(gimli::DW_AT_name, AttributeValue::StringRef(name));
        if let Some(producer) = self.producer {
            dwarf.unit.get_mut(root).set(gimli::DW_AT_producer, producer);
        }

        let uintptr = dwarf.unit.add(root, gimli::DW_TAG_base_type);
        dwarf
            .unit
            .get_mut(uintptr)
            .set(gimli::DW_AT_name, AttributeValue::String(b"uintptr".to_vec()));
        dwarf
            .unit
            .get_mut(uintptr)
            .set(gimli::DW_AT_byte_size, AttributeValue::Udata(8));

        if self.with_declaration {
            let decl = named(&mut dwarf, root, gimli::DW_TAG_structure_type, "runtime.g");
            dwarf
                .unit
                .get_mut(decl)
                .set(gimli::DW_AT_declaration, AttributeValue::Flag(true));
        }

        let m = named(&mut dwarf, root, gimli::DW_TAG_structure_type, "runtime.m");
        member(&mut dwarf, m, "goid", 8);

        let g = named(&mut dwarf, root, gimli::DW_TAG_structure_type, "runtime.g");
        member(&mut dwarf, g, "stack", 0);
        member(&mut dwarf, g, "stackguard0", 16);
        member(&mut dwarf, g, "m", 48);
        if let Some(offset) = self.goid_offset {
            member(&mut dwarf, g, "goid", offset);
        }
        member(&mut dwarf, g, "waitsince", 160);
        dwarf
    }
}

fn named(dwarf: &mut DwarfUnit, parent: UnitEntryId, tag: gimli::DwTag, name: &str) -> UnitEntryId {
    let id = dwarf.unit.add(parent, tag);
    let s = dwarf.strings.add(name);
    dwarf.unit.get_mut(id).set(gimli::DW_AT_name, AttributeValue::StringRef(s));
    id
}

fn member(dwarf: &mut DwarfUnit, parent: UnitEntryId, name: &str, offset: u64) {
    let id = named(dwarf, parent, gimli::DW_TAG_member, name);
    dwarf
        .unit
        .get_mut(id)
        .set(gimli::DW_AT_data_member_location, AttributeValue::Udata(offset));
}

/// An ELF carrying `runtime.memequal0` and the given functions, plus DWARF.
pub fn go_like_elf(helper: &[u8], functions: &[(&str, &[u8])], dwarf: Option<RuntimeDwarf>) -> Vec<u8> {
    let mut builder = ElfBuilder::new().function("runtime.memequal0", helper);
    for (name, code) in functions {
        builder = builder.function(name, code);
    }
    if let Some(layout) = dwarf {
        builder = builder.dwarf(&mut layout.build());
    }
    builder.build()
}

/// Hand-encoded `.debug_abbrev` and `.debug_info` for one DWARF 4 unit whose
/// root holds `depth` structure types, each nested in the previous one.
pub fn nested_structures(depth: usize) -> (Vec<u8>, Vec<u8>) {
    // 1: DW_TAG_compile_unit, 2: DW_TAG_structure_type; both with children, no attributes.
    let abbrev = vec![1, 0x11, 1, 0, 0, 2, 0x13, 1, 0, 0, 0];

    let mut body = Vec::new();
    body.extend_from_slice(&4u16.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.push(8);
    body.push(1);
    body.extend(std::iter::repeat(2u8).take(depth));
    // One null entry closes each sibling list.
    body.extend(std::iter::repeat(0u8).take(depth + 1));

    let mut info = (body.len() as u32).to_le_bytes().to_vec();
    info.extend(body);
    (abbrev, info)
}
