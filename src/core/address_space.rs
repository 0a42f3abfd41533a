//! Address-keyed evidence maps.
//!
//! An [`AddrSpace`] holds at most one [`Addr`] per start address. Linkers
//! merge and alias symbols, so the same start address is routinely reported
//! more than once; the larger interval always wins.

use std::collections::BTreeMap;

use crate::core::address::Addr;
use crate::core::coverage::{AddrCoverage, CoveragePart};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddrSpace {
    entries: BTreeMap<u64, Addr>,
}

impl AddrSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, addr: u64) -> Option<&Addr> {
        self.entries.get(&addr)
    }

    /// Insert `addr`, keeping whichever entry at that address is larger.
    /// Zero-sized entries are never stored.
    pub fn insert(&mut self, addr: Addr) {
        if addr.pos.size == 0 {
            return;
        }
        match self.entries.get(&addr.pos.addr) {
            Some(old) if old.pos.size >= addr.pos.size => {}
            _ => {
                self.entries.insert(addr.pos.addr, addr);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Addr> {
        self.entries.values()
    }

    /// Union of several spaces under the same larger-wins rule.
    pub fn merge<'a>(spaces: impl IntoIterator<Item = &'a AddrSpace>) -> AddrSpace {
        let mut ret = AddrSpace::new();
        for space in spaces {
            for addr in space.iter() {
                ret.insert(addr.clone());
            }
        }
        ret
    }

    /// One coverage part per entry, ascending by address, not merged.
    pub fn to_dirty_coverage(&self) -> AddrCoverage {
        self.entries
            .values()
            .map(|a| CoveragePart::from_addr(a.clone()))
            .collect()
    }
}
