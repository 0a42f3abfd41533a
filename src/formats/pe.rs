//! PE adapter.
//!
//! PE sections carry separate virtual and raw sizes; both are kept so the
//! accountant can scale attributed bytes back to the file. Addresses are
//! absolute, i.e. relocated by the image base.

use object::pe::{IMAGE_SCN_CNT_CODE, IMAGE_SCN_CNT_INITIALIZED_DATA};
use object::read::pe::{ImageNtHeaders, PeFile};
use object::{LittleEndian as LE, Object, ObjectSection, ObjectSymbol, SectionIndex, SymbolSection};
use tracing::debug;

use crate::core::address::AddrKind;
use crate::core::section::{Section, SectionContent};
use crate::error::{Result, SizeError};
use crate::formats::{find_named, Arch, Format, FormatAdapter, ImageBytes, RawSymbol, Region, RegionMap};

const METADATA_SECTIONS: &[&str] = &[".rdata"];

pub struct PeAdapter {
    bytes: ImageBytes,
    arch: Arch,
    image_base: u64,
    sections: Vec<Section>,
    symbols: Option<Vec<RawSymbol>>,
    regions: RegionMap,
}

pub fn section_content(name: &str) -> SectionContent {
    match name {
        ".text" => SectionContent::Text,
        ".rdata" | ".data" => SectionContent::Data,
        _ => SectionContent::Other,
    }
}

/// Symbol kind from section characteristics.
pub fn symbol_kind(characteristics: u32) -> AddrKind {
    if characteristics & IMAGE_SCN_CNT_CODE != 0 {
        AddrKind::Text
    } else if characteristics & IMAGE_SCN_CNT_INITIALIZED_DATA != 0 {
        AddrKind::Data
    } else {
        AddrKind::Unknown
    }
}

struct Parsed {
    arch: Arch,
    image_base: u64,
    sections: Vec<Section>,
    symbols: Option<Vec<RawSymbol>>,
    regions: RegionMap,
}

fn parse<Pe: ImageNtHeaders>(data: &[u8]) -> Result<Parsed> {
    let file = PeFile::<Pe>::parse(data)?;
    let image_base = file.relative_address_base();

    let mut sections = Vec::new();
    let mut regions = Vec::new();
    let mut kinds: Vec<AddrKind> = Vec::new();
    for sec in file.sections() {
        let header = sec.pe_section();
        let idx = sec.index().0;
        if kinds.len() <= idx {
            kinds.resize(idx + 1, AddrKind::Unknown);
        }
        kinds[idx] = symbol_kind(header.characteristics.get(LE));

        let name = match sec.name() {
            Ok(name) => name,
            Err(_) => continue,
        };
        let addr = image_base.saturating_add(u64::from(header.virtual_address.get(LE)));
        let size = u64::from(header.virtual_size.get(LE));
        let offset = u64::from(header.pointer_to_raw_data.get(LE));
        let file_size = u64::from(header.size_of_raw_data.get(LE));

        let section = if file_size == 0 {
            Section::new(name, addr, size, 0, 0, section_content(name)).memory_only()
        } else {
            regions.push(Region {
                addr,
                size: file_size,
                offset,
            });
            Section::new(name, addr, size, offset, file_size, section_content(name))
        };
        sections.push(section);
    }

    let symbols = file.symbol_table().map(|_| {
        file.symbols()
            .filter_map(|sym| {
                let SymbolSection::Section(SectionIndex(idx)) = sym.section() else {
                    return None;
                };
                let name = sym.name().ok().filter(|n| !n.is_empty())?;
                Some(RawSymbol {
                    name: name.to_string(),
                    addr: sym.address(),
                    size: None,
                    kind: kinds.get(idx).copied().unwrap_or(AddrKind::Unknown),
                })
            })
            .collect::<Vec<_>>()
    });

    Ok(Parsed {
        arch: Arch::from(file.architecture()),
        image_base,
        sections,
        symbols: symbols.filter(|s| !s.is_empty()),
        regions: RegionMap::new(regions, Vec::new()),
    })
}

impl PeAdapter {
    pub fn new(bytes: ImageBytes) -> Result<Self> {
        let parsed = match object::FileKind::parse(&*bytes)? {
            object::FileKind::Pe32 => parse::<object::pe::ImageNtHeaders32>(&bytes)?,
            object::FileKind::Pe64 => parse::<object::pe::ImageNtHeaders64>(&bytes)?,
            other => {
                return Err(SizeError::InvalidFormat(format!(
                    "not a PE image: {:?}",
                    other
                )))
            }
        };

        debug!(
            sections = parsed.sections.len(),
            image_base = parsed.image_base,
            arch = %parsed.arch,
            "parsed PE image"
        );

        Ok(Self {
            bytes,
            arch: parsed.arch,
            image_base: parsed.image_base,
            sections: parsed.sections,
            symbols: parsed.symbols,
            regions: parsed.regions,
        })
    }

    pub fn image_base(&self) -> u64 {
        self.image_base
    }
}

impl FormatAdapter for PeAdapter {
    fn format(&self) -> Format {
        Format::Pe
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
        if addr < self.image_base {
            return Err(SizeError::AddrNotFound { addr, size });
        }
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
