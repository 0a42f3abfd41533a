//! ELF adapter.

use object::{
    Object, ObjectSection, ObjectSegment, ObjectSymbol, SectionFlags, SectionIndex, SymbolSection,
};
use tracing::debug;

use crate::core::address::AddrKind;
use crate::core::section::{Section, SectionContent};
use crate::error::{Result, SizeError};
use crate::formats::{find_named, Arch, Format, FormatAdapter, ImageBytes, RawSymbol, Region, RegionMap};

const SHF_ALLOC: u64 = object::elf::SHF_ALLOC as u64;
const SHF_EXECINSTR: u64 = object::elf::SHF_EXECINSTR as u64;

const METADATA_SECTIONS: &[&str] = &[".gopclntab", ".data.rel.ro.gopclntab"];

pub struct ElfAdapter {
    bytes: ImageBytes,
    arch: Arch,
    sections: Vec<Section>,
    symbols: Option<Vec<RawSymbol>>,
    regions: RegionMap,
}

/// Section content by name.
pub fn section_content(name: &str) -> SectionContent {
    if name == ".text" {
        SectionContent::Text
    } else if name.ends_with("bss") || name.ends_with("data") {
        SectionContent::Data
    } else {
        SectionContent::Other
    }
}

/// Symbol kind from the owning section's flags. Executable allocated
/// sections hold text; other allocated sections with file bytes hold data.
pub fn symbol_kind(sh_flags: u64, has_file_bytes: bool) -> AddrKind {
    let alloc = sh_flags & SHF_ALLOC != 0;
    let exec = sh_flags & SHF_EXECINSTR != 0;
    match (alloc, exec) {
        (true, true) => AddrKind::Text,
        (true, false) if has_file_bytes => AddrKind::Data,
        _ => AddrKind::Unknown,
    }
}

impl ElfAdapter {
    pub fn new(bytes: ImageBytes) -> Result<Self> {
        let (arch, sections, symbols, regions) = {
            let obj = object::File::parse(&*bytes)?;
            if obj.format() != object::BinaryFormat::Elf {
                return Err(SizeError::InvalidFormat("not an ELF image".into()));
            }

            let mut sections = Vec::new();
            // per section index: (sh_flags, has file bytes)
            let mut flags: Vec<Option<(u64, bool)>> = Vec::new();
            for sec in obj.sections() {
                let idx = sec.index().0;
                if flags.len() <= idx {
                    flags.resize(idx + 1, None);
                }
                let sh_flags = match sec.flags() {
                    SectionFlags::Elf { sh_flags } => sh_flags,
                    _ => 0,
                };
                let file_range = sec.file_range();
                flags[idx] = Some((sh_flags, file_range.is_some()));

                let size = sec.size();
                if size == 0 {
                    continue;
                }
                let name = match sec.name() {
                    Ok(name) if !name.is_empty() => name,
                    _ => continue,
                };
                let content = section_content(name);
                let section = match file_range {
                    Some((offset, file_size)) => {
                        Section::new(name, sec.address(), size, offset, file_size, content)
                    }
                    // SHT_NOBITS
                    None => Section::new(name, sec.address(), size, 0, 0, content).memory_only(),
                };
                sections.push(section);
            }

            let symbols = obj.symbol_table().map(|_| {
                obj.symbols()
                    .filter_map(|sym| {
                        let SymbolSection::Section(SectionIndex(idx)) = sym.section() else {
                            return None;
                        };
                        let name = sym.name().ok().filter(|n| !n.is_empty())?;
                        let kind = match flags.get(idx).copied().flatten() {
                            Some((sh_flags, file)) => symbol_kind(sh_flags, file),
                            None => AddrKind::Unknown,
                        };
                        Some(RawSymbol {
                            name: name.to_string(),
                            addr: sym.address(),
                            size: Some(sym.size()),
                            kind,
                        })
                    })
                    .collect::<Vec<_>>()
            });

            // object only yields PT_LOAD segments for ELF
            let regions = obj
                .segments()
                .map(|seg| {
                    let (offset, size) = seg.file_range();
                    Region {
                        addr: seg.address(),
                        size,
                        offset,
                    }
                })
                .collect();

            (
                Arch::from(obj.architecture()),
                sections,
                symbols,
                RegionMap::new(regions, Vec::new()),
            )
        };

        debug!(
            sections = sections.len(),
            symbols = ?symbols.as_ref().map(Vec::len),
            %arch,
            "parsed ELF image"
        );

        Ok(Self {
            bytes,
            arch,
            sections,
            symbols,
            regions,
        })
    }
}

impl FormatAdapter for ElfAdapter {
    fn format(&self) -> Format {
        Format::Elf
    }

    fn architecture(&self) -> Arch {
        self.arch
    }

    fn sections(&self) -> &[Section] {
        &self.sections
    }

    fn raw_symbols(&self) -> Result<&[RawSymbol]> {
        self.symbols.as_deref().ok_or(SizeError::NoSymbolTable)
    }

    fn text_segment(&self) -> Result<(u64, &[u8])> {
        let text = find_named(&self.sections, ".text")
            .filter(|s| s.has_file_bytes())
            .ok_or(SizeError::TextSectionNotFound)?;
        let bytes = self
            .bytes
            .slice(text.offset, text.file_size)
            .ok_or(SizeError::TextSectionNotFound)?;
        Ok((text.addr, bytes))
    }

    fn read_at(&self, addr: u64, size: u64) -> Result<&[u8]> {
        self.regions
            .translate(addr, size)
            .and_then(|off| self.bytes.slice(off, size))
            .ok_or(SizeError::AddrNotFound { addr, size })
    }

    fn file_size(&self) -> u64 {
        self.bytes.len()
    }

    fn metadata_table_sections(&self) -> &'static [&'static str] {
        METADATA_SECTIONS
    }
}
