//! Shared fixtures for integration tests.
//!
//! [`FakeImage`] is an in-memory [`FormatAdapter`]: a few sections, their
//! bytes and an optional symbol table. It lets the whole pipeline run
//! without sample binaries on disk.

#![allow(dead_code)]

pub mod elf;
pub mod macho;
pub mod pe;

use bloatmap::core::address::AddrKind;
use bloatmap::core::package::PackageKind;
use bloatmap::core::section::{Section, SectionContent};
use bloatmap::formats::{Arch, Format, FormatAdapter, RawSymbol};
use bloatmap::metadata::{BuildMetadata, FunctionInput, PackageInput};
use bloatmap::{Result, SizeError};

pub const TEXT: u64 = 0x1000;
pub const RODATA: u64 = 0x2000;
pub const PCLNTAB: u64 = 0x2800;

/// `lea rax, [rip + disp]` placed at `at`, resolving to `target`.
pub fn lea_rax(at: u64, target: u64) -> [u8; 7] {
    let disp = (target as i64 - (at as i64 + 7)) as i32;
    let d = disp.to_le_bytes();
    [0x48, 0x8d, 0x05, d[0], d[1], d[2], d[3]]
}

/// `mov ebx, imm32`
pub fn mov_ebx(imm: u32) -> [u8; 5] {
    let i = imm.to_le_bytes();
    [0xbb, i[0], i[1], i[2], i[3]]
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn pad_to(out: &mut Vec<u8>, len: u64) {
    out.resize(len as usize, 0);
}

/// Append `name` NUL-terminated and return its offset.
pub fn add_str(table: &mut Vec<u8>, name: &str) -> u32 {
    let off = table.len() as u32;
    table.extend_from_slice(name.as_bytes());
    table.push(0);
    off
}

/// Fixed-width, NUL-padded name field.
pub fn put_name<const N: usize>(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; N];
    field[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&field);
}

pub struct FakeImage {
    pub arch: Arch,
    pub sections: Vec<Section>,
    /// Backing bytes keyed by section start address
    pub bytes: Vec<(u64, Vec<u8>)>,
    pub symbols: Option<Vec<RawSymbol>>,
    pub file_size: u64,
}

impl FakeImage {
    pub fn new() -> Self {
        Self {
            arch: Arch::Amd64,
            sections: Vec::new(),
            bytes: Vec::new(),
            symbols: None,
            file_size: 0x3000,
        }
    }

    pub fn section(mut self, section: Section, bytes: Vec<u8>) -> Self {
        self.bytes.push((section.addr, bytes));
        self.sections.push(section);
        self
    }

    pub fn without_section(mut self, name: &str) -> Self {
        if let Some(i) = self.sections.iter().position(|s| s.name == name) {
            let s = self.sections.remove(i);
            self.bytes.retain(|(addr, _)| *addr != s.addr);
        }
        self
    }

    pub fn symbol(mut self, name: &str, addr: u64, size: u64, kind: AddrKind) -> Self {
        self.symbols.get_or_insert_with(Vec::new).push(RawSymbol {
            name: name.to_string(),
            addr,
            size: Some(size),
            kind,
        });
        self
    }

    pub fn stripped(mut self) -> Self {
        self.symbols = None;
        self
    }

    pub fn arch(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }
}

impl Default for FakeImage {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatAdapter for FakeImage {
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
        let text = self
            .sections
            .iter()
            .find(|s| s.name == ".text")
            .ok_or(SizeError::TextSectionNotFound)?;
        Ok((text.addr, self.read_at(text.addr, text.size)?))
    }

    fn read_at(&self, addr: u64, size: u64) -> Result<&[u8]> {
        self.bytes
            .iter()
            .find_map(|(start, data)| {
                let lo = usize::try_from(addr.checked_sub(*start)?).ok()?;
                let len = usize::try_from(size).ok()?;
                data.get(lo..lo.checked_add(len)?)
            })
            .ok_or(SizeError::AddrNotFound { addr, size })
    }

    fn file_size(&self) -> u64 {
        self.file_size
    }

    fn metadata_table_sections(&self) -> &'static [&'static str] {
        &[".gopclntab"]
    }
}

/// A small program.
///
/// `main.main` (0x1000..0x100c) loads the literal "hello" at `.rodata+0`.
/// `main.helper` (0x1010..0x101c) loads `helper_len` bytes at
/// `helper_target`. `.rodata` holds "hello", three NULs, four bytes of
/// invalid UTF-8 and four bytes owned by the symbol `main.table`.
pub fn program(helper_target: u64, helper_len: u32) -> FakeImage {
    let mut text = vec![0xcc; 0x20];
    text[0..7].copy_from_slice(&lea_rax(TEXT, RODATA));
    text[7..12].copy_from_slice(&mov_ebx(5));
    text[0x10..0x17].copy_from_slice(&lea_rax(TEXT + 0x10, helper_target));
    text[0x17..0x1c].copy_from_slice(&mov_ebx(helper_len));

    let mut rodata = b"hello\0\0\0".to_vec();
    rodata.extend_from_slice(&[0xff, 0xfe, 0xfd, 0xfc]);
    rodata.extend_from_slice(&[0x11; 4]);

    FakeImage::new()
        .section(
            Section::new(".text", TEXT, 0x20, 0x1000, 0x20, SectionContent::Text),
            text,
        )
        .section(
            Section::new(".rodata", RODATA, 0x10, 0x2000, 0x10, SectionContent::Data),
            rodata,
        )
        .section(
            Section::new(".gopclntab", PCLNTAB, 0x40, 0x2800, 0x40, SectionContent::Other),
            vec![0; 0x40],
        )
        .symbol("main.main", TEXT, 0xc, AddrKind::Text)
        .symbol("main.table", RODATA + 0xc, 4, AddrKind::Data)
        .symbol("_cgo_init", RODATA + 0x8, 4, AddrKind::Data)
}

/// `main.helper` loads the invalid bytes, which disassembly must reject.
pub fn hello_image() -> FakeImage {
    program(RODATA + 8, 4)
}

/// Metadata for [`program`]: `main.main` carries 8 metadata-table bytes.
pub fn hello_metadata() -> BuildMetadata {
    let mut main = FunctionInput {
        name: "main.main".into(),
        address: TEXT,
        code_size: 0xc,
        file: "main.go".into(),
        ..Default::default()
    };
    main.pcln.header = 8;
    let helper = FunctionInput {
        name: "main.helper".into(),
        address: TEXT + 0x10,
        code_size: 0xc,
        file: "main.go".into(),
        ..Default::default()
    };
    BuildMetadata {
        packages: vec![PackageInput {
            name: "main".into(),
            kind: PackageKind::Main,
            functions: vec![main, helper],
        }],
        compiler_version: Some("go1.21.4".into()),
        pclntab_address: Some(PCLNTAB),
        ..Default::default()
    }
}
