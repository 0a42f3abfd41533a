//! Address intervals and their provenance.
//!
//! An [`AddrPos`] is a bare `(address, size, kind)` interval. An [`Addr`]
//! wraps it with the evidence that produced it: the owning package and
//! function (when known), the source that reported it, and diagnostic
//! metadata used only when reporting conflicts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::core::id::{FunctionId, PackageId};

/// Content kind of a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddrKind {
    /// Executable code
    Text,
    /// Data or read-only data
    Data,
    /// Exists, but should never be collected
    Unknown,
}

impl fmt::Display for AddrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrKind::Text => write!(f, "text"),
            AddrKind::Data => write!(f, "data"),
            AddrKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Evidence source, ordered from most to least authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddrSource {
    /// Compiler metadata table (pclntab)
    Pclntab,
    /// Debug information
    Dwarf,
    /// Linker symbol table
    Symbol,
    /// String-literal recovery from machine code
    Disasm,
}

impl fmt::Display for AddrSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrSource::Pclntab => write!(f, "pclntab"),
            AddrSource::Dwarf => write!(f, "dwarf"),
            AddrSource::Symbol => write!(f, "symbol"),
            AddrSource::Disasm => write!(f, "disasm"),
        }
    }
}

/// A half-open byte interval `[addr, addr + size)` with a content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddrPos {
    pub addr: u64,
    pub size: u64,
    pub kind: AddrKind,
}

impl AddrPos {
    pub fn new(addr: u64, size: u64, kind: AddrKind) -> Self {
        Self { addr, size, kind }
    }

    /// Exclusive end address, saturating at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.addr.saturating_add(self.size)
    }

    pub fn contains(&self, addr: u64, size: u64) -> bool {
        self.addr <= addr && addr.saturating_add(size) <= self.end()
    }

    pub fn overlaps(&self, other: &AddrPos) -> bool {
        self.addr < other.end() && other.addr < self.end()
    }
}

impl fmt::Display for AddrPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Addr: {:#x} Size: {:#x} Kind: {}",
            self.addr, self.size, self.kind
        )
    }
}

/// Diagnostic provenance attached to an [`Addr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddrMeta {
    Pclntab {
        function: Arc<str>,
        package: Arc<str>,
    },
    Symbol {
        symbol: Arc<str>,
        package: Arc<str>,
    },
    Disasm {
        function: Arc<str>,
    },
    Dwarf,
}

impl fmt::Display for AddrMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrMeta::Pclntab { function, package } => {
                write!(f, "function {} in {}", function, package)
            }
            AddrMeta::Symbol { symbol, package } => write!(f, "symbol {} in {}", symbol, package),
            AddrMeta::Disasm { function } => write!(f, "literal loaded by {}", function),
            AddrMeta::Dwarf => write!(f, "dwarf"),
        }
    }
}

/// One piece of evidence about a byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addr {
    pub pos: AddrPos,
    /// Owning package; `None` for cgo symbols.
    pub package: Option<PackageId>,
    /// Owning function; `None` for symbol-sourced entries.
    pub function: Option<FunctionId>,
    pub source: AddrSource,
    pub meta: AddrMeta,
}

impl Addr {
    pub fn new(pos: AddrPos, source: AddrSource, meta: AddrMeta) -> Self {
        Self {
            pos,
            package: None,
            function: None,
            source,
            meta,
        }
    }

    pub fn with_package(mut self, package: Option<PackageId>) -> Self {
        self.package = package;
        self
    }

    pub fn with_function(mut self, function: FunctionId) -> Self {
        self.function = Some(function);
        self
    }

    pub fn is_disasm(&self) -> bool {
        self.source == AddrSource::Disasm
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Source: {} ({})", self.pos, self.source, self.meta)
    }
}
