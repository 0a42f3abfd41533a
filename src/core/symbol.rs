//! Symbol type for linker symbol-table entries.
//!
//! A symbol is recorded on its owning package once the attribution
//! heuristic has resolved it, alongside the `Addr` it produced.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::core::address::AddrKind;

/// A name/address/size triple from the symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: Arc<str>,
    pub addr: u64,
    pub size: u64,
    pub kind: AddrKind,
}

impl Symbol {
    pub fn new(name: Arc<str>, addr: u64, size: u64, kind: AddrKind) -> Self {
        Self {
            name,
            addr,
            size,
            kind,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Symbol: {} Addr: {:#x} Size: {:#x} Kind: {}",
            self.name, self.addr, self.size, self.kind
        )
    }
}
