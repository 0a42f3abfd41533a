//! Section type for file-format organizational units.
//!
//! Sections carry both their virtual extent (what the loader maps) and their
//! on-disk extent (what the file actually stores). The two diverge for
//! relocation-expanded sections and for memory-only sections such as `.bss`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::AddrKind;

/// What a section holds, as far as attribution is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionContent {
    /// Executable code
    Text,
    /// Initialized, zero-filled or read-only data
    Data,
    /// Anything else (headers, notes, relocation tables, ...)
    Other,
}

impl SectionContent {
    pub fn matches(self, kind: AddrKind) -> bool {
        matches!(
            (self, kind),
            (SectionContent::Text, AddrKind::Text) | (SectionContent::Data, AddrKind::Data)
        )
    }
}

/// File-format organizational unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section name (e.g., ".text", "__data __DATA")
    pub name: String,
    /// Virtual size in bytes
    pub size: u64,
    /// Bytes the section occupies in the file
    pub file_size: u64,
    /// File offset where section data begins
    pub offset: u64,
    /// Exclusive end file offset
    pub end: u64,
    /// Virtual start address
    pub addr: u64,
    /// Exclusive virtual end address
    pub addr_end: u64,
    /// Zero-filled at load time; never backed by file bytes
    pub only_in_memory: bool,
    /// Debug information; excluded from attribution
    pub debug: bool,
    pub content: SectionContent,
    /// File bytes attributed by coverage; written once by the accountant
    pub known_size: u64,
}

impl Section {
    /// Builds a section, deriving the end markers. Memory-only sections get
    /// a zero file extent regardless of what the header claims.
    pub fn new(
        name: impl Into<String>,
        addr: u64,
        size: u64,
        offset: u64,
        file_size: u64,
        content: SectionContent,
    ) -> Self {
        let name = name.into();
        let debug = is_debug_name(&name);
        Self {
            name,
            size,
            file_size,
            offset,
            end: offset.saturating_add(file_size),
            addr,
            addr_end: addr.saturating_add(size),
            only_in_memory: false,
            debug,
            content,
            known_size: 0,
        }
    }

    /// Mark as zero-fill.
    pub fn memory_only(mut self) -> Self {
        self.only_in_memory = true;
        self.file_size = 0;
        self.offset = 0;
        self.end = 0;
        self
    }

    pub fn contains(&self, addr: u64, size: u64) -> bool {
        self.addr <= addr && addr.saturating_add(size) <= self.addr_end
    }

    /// Whether file bytes exist for this section.
    pub fn has_file_bytes(&self) -> bool {
        !self.only_in_memory && self.file_size > 0
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Section({} @ {:#x}-{:#x}, file {}/{} bytes)",
            self.name, self.addr, self.addr_end, self.file_size, self.size
        )
    }
}

/// Debug sections across ELF, PE and Mach-O naming conventions.
pub fn is_debug_name(name: &str) -> bool {
    name.starts_with(".debug_")
        || name.starts_with(".zdebug_")
        || name.starts_with("__debug_")
        || name.starts_with("__zdebug_")
}
