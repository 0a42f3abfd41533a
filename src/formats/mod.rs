//! Format adapters: one uniform view over ELF, PE and Mach-O images.
//!
//! Every adapter parses its image once at construction, keeping the section
//! list, the raw symbol table and a map of file-backed address ranges. Byte
//! reads afterwards are plain slices into the shared [`ImageBytes`].

pub mod elf;
pub mod macho;
pub mod pe;

use memmap2::Mmap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::core::address::{AddrKind, AddrPos};
use crate::core::section::Section;
use crate::error::{Result, SizeError};

pub use elf::ElfAdapter;
pub use macho::MachOAdapter;
pub use pe::PeAdapter;

/// Object file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Executable and Linkable Format (Linux, Unix)
    Elf,
    /// Portable Executable (Windows)
    Pe,
    /// Mach Object file format (macOS, iOS)
    MachO,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Elf => write!(f, "ELF"),
            Format::Pe => write!(f, "PE"),
            Format::MachO => write!(f, "Mach-O"),
        }
    }
}

/// Instruction set of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    I386,
    Amd64,
    Arm,
    Arm64,
    Ppc64,
    S390x,
    Unknown,
}

impl Arch {
    /// Toolchain-style identifier; empty when unrecognized.
    pub fn id(&self) -> &'static str {
        match self {
            Arch::I386 => "386",
            Arch::Amd64 => "amd64",
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::Ppc64 => "ppc64",
            Arch::S390x => "s390x",
            Arch::Unknown => "",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl From<object::Architecture> for Arch {
    fn from(arch: object::Architecture) -> Self {
        match arch {
            object::Architecture::I386 => Arch::I386,
            object::Architecture::X86_64 => Arch::Amd64,
            object::Architecture::Arm => Arch::Arm,
            object::Architecture::Aarch64 => Arch::Arm64,
            object::Architecture::PowerPc64 => Arch::Ppc64,
            object::Architecture::S390x => Arch::S390x,
            _ => Arch::Unknown,
        }
    }
}

enum Backing {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

/// Immutable image bytes shared between the adapter and disassembly workers.
#[derive(Clone)]
pub struct ImageBytes {
    inner: Arc<Backing>,
}

impl ImageBytes {
    /// Memory-map a file read-only. Empty files are read into an empty buffer
    /// since they cannot be mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        debug!(path = %path.display(), size = len, "opening image");
        if len == 0 {
            return Ok(Self::from_vec(Vec::new()));
        }
        // Safety: read-only map of a regular file we do not write to.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            inner: Arc::new(Backing::Mmap(mmap)),
        })
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(Backing::Owned(data)),
        }
    }

    pub fn len(&self) -> u64 {
        self.deref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.deref().is_empty()
    }

    /// Bounded slice by file offset.
    pub fn slice(&self, offset: u64, size: u64) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        let len = usize::try_from(size).ok()?;
        self.deref().get(start..start.checked_add(len)?)
    }
}

impl Deref for ImageBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &*self.inner {
            Backing::Mmap(m) => &m[..],
            Backing::Owned(v) => v.as_slice(),
        }
    }
}

impl fmt::Debug for ImageBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBytes").field("len", &self.len()).finish()
    }
}

/// A file-backed virtual address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub addr: u64,
    pub size: u64,
    pub offset: u64,
}

/// Virtual-to-file translation for one image. `holes` are memory-only
/// ranges that must never be read even if a region spans them.
#[derive(Debug, Clone, Default)]
pub struct RegionMap {
    regions: Vec<Region>,
    holes: Vec<(u64, u64)>,
}

impl RegionMap {
    pub fn new(mut regions: Vec<Region>, mut holes: Vec<(u64, u64)>) -> Self {
        regions.retain(|r| r.size > 0);
        regions.sort_by_key(|r| r.addr);
        holes.retain(|&(s, e)| e > s);
        holes.sort_unstable();
        Self { regions, holes }
    }

    /// File offset of `[addr, addr + size)`, if fully file-backed.
    pub fn translate(&self, addr: u64, size: u64) -> Option<u64> {
        let end = addr.checked_add(size)?;
        if self.holes.iter().any(|&(s, e)| addr < e && s < end) {
            return None;
        }
        self.regions
            .iter()
            .find(|r| r.addr <= addr && end <= r.addr.saturating_add(r.size))
            .and_then(|r| r.offset.checked_add(addr - r.addr))
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// One symbol-table entry as the format reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSymbol {
    pub name: String,
    pub addr: u64,
    /// `None` when the format records no size (COFF, Mach-O)
    pub size: Option<u64>,
    pub kind: AddrKind,
}

/// Uniform view of one object file.
pub trait FormatAdapter: Send + Sync {
    fn format(&self) -> Format;

    fn architecture(&self) -> Arch;

    fn sections(&self) -> &[Section];

    /// Raw symbol table, unfiltered. `Err(NoSymbolTable)` when absent.
    fn raw_symbols(&self) -> Result<&[RawSymbol]>;

    /// Start address and bytes of the executable text section.
    fn text_segment(&self) -> Result<(u64, &[u8])>;

    /// File bytes backing `[addr, addr + size)`.
    fn read_at(&self, addr: u64, size: u64) -> Result<&[u8]>;

    fn file_size(&self) -> u64;

    /// Section names that may hold the compiler metadata table, in
    /// preference order.
    fn metadata_table_sections(&self) -> &'static [&'static str];

    /// Visit every address-bearing symbol with a nonzero size, skipping
    /// linker-reserved names.
    fn iterate_symbols(&self, visitor: &mut dyn FnMut(&str, u64, u64, AddrKind)) -> Result<()> {
        for sym in resolve_symbols(self.raw_symbols()?) {
            visitor(sym.name, sym.addr, sym.size, sym.kind);
        }
        Ok(())
    }

    /// Extent of the string-literal table marker symbol, if present.
    fn go_string_table(&self) -> Result<Option<AddrPos>> {
        Ok(find_string_table(self.raw_symbols()?))
    }
}

/// Detect the format and build the matching adapter.
pub fn open(bytes: ImageBytes) -> Result<Arc<dyn FormatAdapter>> {
    let kind = object::FileKind::parse(&*bytes)
        .map_err(|e| SizeError::InvalidFormat(e.to_string()))?;
    debug!(?kind, size = bytes.len(), "detected file kind");
    match kind {
        object::FileKind::Elf32 | object::FileKind::Elf64 => Ok(Arc::new(ElfAdapter::new(bytes)?)),
        object::FileKind::Pe32 | object::FileKind::Pe64 => Ok(Arc::new(PeAdapter::new(bytes)?)),
        object::FileKind::MachO32 | object::FileKind::MachO64 => {
            Ok(Arc::new(MachOAdapter::new(bytes)?))
        }
        other => Err(SizeError::UnsupportedFormat(format!("{:?}", other))),
    }
}

/// Convenience: map a file and open it.
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Arc<dyn FormatAdapter>> {
    open(ImageBytes::open(path)?)
}

/// Linker-reserved symbols that mark table boundaries rather than content.
static IGNORED_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "runtime.text",
        "runtime.etext",
        "runtime.rodata",
        "runtime.erodata",
        "runtime.noptrdata",
        "runtime.enoptrdata",
        "runtime.bss",
        "runtime.ebss",
        "runtime.gcdata",
        "runtime.gcbss",
        "runtime.noptrbss",
        "runtime.enoptrbss",
        "runtime.end",
        "runtime.covctrs",
        "runtime.ecovctrs",
        "runtime.__start___sancov_cntrs",
        "runtime.__stop___sancov_cntrs",
        "internal/fuzz._counters",
        "internal/fuzz._ecounters",
        "runtime.types",
        "runtime.etypes",
        "runtime.itablink",
        "runtime.symtab",
        "runtime.esymtab",
        "runtime.pclntab",
        "runtime.pcheader",
        "runtime.funcnametab",
        "runtime.cutab",
        "runtime.filetab",
        "runtime.pctab",
        "runtime.functab",
        "runtime.epclntab",
        "runtime.zerobase",
        "go:buildinfo",
        "go:buildinfo.ref",
    ]
    .into_iter()
    .collect()
});

/// Marker symbols at the start of the string-literal table.
pub const STRING_TABLE_SYMBOLS: [&str; 2] = ["go:string.*", "go.string.*"];

pub fn is_ignored_symbol(name: &str) -> bool {
    IGNORED_SYMBOLS.contains(name)
}

/// A symbol ready for attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSymbol<'a> {
    pub name: &'a str,
    pub addr: u64,
    pub size: u64,
    pub kind: AddrKind,
}

fn sorted_addrs(raw: &[RawSymbol]) -> Vec<u64> {
    let mut addrs: Vec<u64> = raw
        .iter()
        .filter(|s| !is_ignored_symbol(&s.name))
        .map(|s| s.addr)
        .collect();
    addrs.sort_unstable();
    addrs.dedup();
    addrs
}

/// Distance to the next greater symbol address.
fn next_distance(addrs: &[u64], addr: u64) -> Option<u64> {
    let idx = addrs.partition_point(|&a| a <= addr);
    addrs.get(idx).map(|&next| next - addr)
}

/// Apply the ignore list, fill in missing sizes and drop zero-sized or
/// unclassified entries.
pub fn resolve_symbols(raw: &[RawSymbol]) -> Vec<ResolvedSymbol<'_>> {
    let addrs = sorted_addrs(raw);
    raw.iter()
        .filter(|s| !is_ignored_symbol(&s.name))
        .filter(|s| !STRING_TABLE_SYMBOLS.contains(&s.name.as_str()))
        .filter(|s| s.kind != AddrKind::Unknown)
        .filter_map(|s| {
            let size = match s.size {
                Some(size) => size,
                // the last symbol has no successor to measure against
                None => next_distance(&addrs, s.addr)?,
            };
            (size > 0).then_some(ResolvedSymbol {
                name: &s.name,
                addr: s.addr,
                size,
                kind: s.kind,
            })
        })
        .collect()
}

/// The string-literal table extends from its marker to the next symbol.
pub fn find_string_table(raw: &[RawSymbol]) -> Option<AddrPos> {
    let marker = raw
        .iter()
        .find(|s| STRING_TABLE_SYMBOLS.contains(&s.name.as_str()))?;
    let addrs = sorted_addrs(raw);
    let size = next_distance(&addrs, marker.addr)?;
    Some(AddrPos::new(marker.addr, size, AddrKind::Data))
}

/// First section with the given name, by raw name.
pub(crate) fn find_named<'a>(sections: &'a [Section], name: &str) -> Option<&'a Section> {
    sections.iter().find(|s| s.name == name)
}
