//! Functions as reported by the compiler metadata table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::address_space::AddrSpace;
use crate::core::id::{FunctionId, PackageId};

/// Kind of function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    /// Free function
    #[default]
    Function,
    /// Method with a receiver type
    Method,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::Function => write!(f, "function"),
            FunctionKind::Method => write!(f, "method"),
        }
    }
}

/// Bytes a function contributes to the compiler metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PclnSize {
    /// Function name
    pub name: u64,
    /// File name table
    pub pcfile: u64,
    /// PC to stack pointer table
    pub pcsp: u64,
    /// PC to line number table
    pub pcln: u64,
    /// Fixed per-function header
    pub header: u64,
    /// Per-index pcdata tables
    pub pcdata: BTreeMap<String, u64>,
}

impl PclnSize {
    pub fn size(&self) -> u64 {
        [self.name, self.pcfile, self.pcsp, self.pcln, self.header]
            .into_iter()
            .chain(self.pcdata.values().copied())
            .fold(0u64, u64::saturating_add)
    }
}

/// A function owned by exactly one package and one file.
///
/// Everything except `disasm` is fixed once the registry is built; the
/// disassembly phase only adds intervals to `disasm`.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: FunctionId,
    pub name: Arc<str>,
    /// Entry address
    pub addr: u64,
    /// Bytes of machine code
    pub code_size: u64,
    pub pcln: PclnSize,
    pub kind: FunctionKind,
    /// Receiver type, methods only
    pub receiver: Option<Arc<str>>,
    /// Source file path
    pub file: Arc<str>,
    pub package: PackageId,
    /// String literals recovered from this function's code
    pub disasm: AddrSpace,
}

impl Function {
    /// Code plus metadata-table bytes.
    pub fn size(&self) -> u64 {
        self.code_size.saturating_add(self.pcln.size())
    }

    pub fn end(&self) -> u64 {
        self.addr.saturating_add(self.code_size)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Function({} @ {:#x}, {} bytes)",
            self.name,
            self.addr,
            self.size()
        )
    }
}
