//! Mach-O adapter.
//!
//! Section names are only unique per segment, so sections are named
//! `"<sect> <segment>"`. Zero-fill sections live inside file-backed
//! segments but own no file bytes; they are recorded as holes in the
//! region map.

use object::{
    Object, ObjectSection, ObjectSegment, ObjectSymbol, SectionFlags, SectionIndex, SymbolSection,
};
use tracing::debug;

use crate::core::address::AddrKind;
use crate::core::section::{Section, SectionContent};
use crate::error::{Result, SizeError};
use crate::formats::{find_named, Arch, Format, FormatAdapter, ImageBytes, RawSymbol, Region, RegionMap};

const METADATA_SECTIONS: &[&str] = &["__gopclntab __TEXT", "__gopclntab __DATA_CONST"];

const SECTION_TYPE: u32 = 0xff;
const S_ZEROFILL: u32 = 0x1;
const S_GB_ZEROFILL: u32 = 0xc;
const S_THREAD_LOCAL_ZEROFILL: u32 = 0x12;

pub struct MachOAdapter {
    bytes: ImageBytes,
    arch: Arch,
    sections: Vec<Section>,
    symbols: Option<Vec<RawSymbol>>,
    regions: RegionMap,
}

pub fn section_content(sect: &str) -> SectionContent {
    if sect == "__text" {
        SectionContent::Text
    } else if sect.ends_with("bss") || sect.ends_with("data") {
        SectionContent::Data
    } else {
        SectionContent::Other
    }
}

/// Symbol kind from the owning segment.
pub fn symbol_kind(segment: &str) -> AddrKind {
    match segment {
        "__TEXT" => AddrKind::Text,
        "__DATA" | "__DATA_CONST" => AddrKind::Data,
        _ => AddrKind::Unknown,
    }
}

/// Sections that are zero-filled at load time.
pub fn is_memory_only(segment: &str, sect: &str, flags: u32, offset: u64) -> bool {
    if segment == "__DATA" && (sect == "__bss" || sect == "__noptrbss") {
        return true;
    }
    if offset == 0 {
        return true;
    }
    matches!(
        flags & SECTION_TYPE,
        S_ZEROFILL | S_GB_ZEROFILL | S_THREAD_LOCAL_ZEROFILL
    )
}

impl MachOAdapter {
    pub fn new(bytes: ImageBytes) -> Result<Self> {
        let (arch, sections, symbols, regions) = {
            let obj = object::File::parse(&*bytes)?;
            if obj.format() != object::BinaryFormat::MachO {
                return Err(SizeError::InvalidFormat("not a Mach-O image".into()));
            }

            let mut sections = Vec::new();
            let mut holes = Vec::new();
            // per section index: symbol kind, or None for memory-only
            let mut kinds: Vec<Option<AddrKind>> = Vec::new();
            for sec in obj.sections() {
                let idx = sec.index().0;
                if kinds.len() <= idx {
                    kinds.resize(idx + 1, None);
                }
                let (Ok(sect), Ok(Some(segment))) = (sec.name(), sec.segment_name()) else {
                    continue;
                };
                let flags = match sec.flags() {
                    SectionFlags::MachO { flags } => flags,
                    _ => 0,
                };
                let (offset, file_size) = sec.file_range().unwrap_or((0, 0));
                let memory_only = is_memory_only(segment, sect, flags, offset);
                kinds[idx] = (!memory_only).then(|| symbol_kind(segment));

                let size = sec.size();
                if size == 0 {
                    continue;
                }
                let name = format!("{} {}", sect, segment);
                let content = section_content(sect);
                let section = if memory_only {
                    holes.push((sec.address(), sec.address().saturating_add(size)));
                    Section::new(name, sec.address(), size, 0, 0, content).memory_only()
                } else {
                    Section::new(name, sec.address(), size, offset, file_size, content)
                };
                sections.push(section);
            }

            let symbols = obj.symbol_table().map(|_| {
                obj.symbols()
                    .filter_map(|sym| {
                        let SymbolSection::Section(SectionIndex(idx)) = sym.section() else {
                            return None;
                        };
                        // zero-fill sections never produce symbols
                        let kind = kinds.get(idx).copied().flatten()?;
                        let name = sym.name().ok().filter(|n| !n.is_empty())?;
                        Some(RawSymbol {
                            name: name.to_string(),
                            addr: sym.address(),
                            size: None,
                            kind,
                        })
                    })
                    .collect::<Vec<_>>()
            });

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
                symbols.filter(|s| !s.is_empty()),
                RegionMap::new(regions, holes),
            )
        };

        debug!(sections = sections.len(), %arch, "parsed Mach-O image");

        Ok(Self {
            bytes,
            arch,
            sections,
            symbols,
            regions,
        })
    }
}

impl FormatAdapter for MachOAdapter {
    fn format(&self) -> Format {
        Format::MachO
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
        let text = find_named(&self.sections, "__text __TEXT")
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
