//! The shared address model every evidence source writes into.
//!
//! Compiler-table and symbol evidence live here directly. Disassembly
//! evidence is stored on the owning [`Function`] so that each package can
//! build its own coverage, but it is still admitted through this type so
//! the symbol coverage check is never skipped.

use std::sync::Arc;

use tracing::debug;

use crate::core::address::{Addr, AddrKind, AddrMeta, AddrPos, AddrSource};
use crate::core::address_space::AddrSpace;
use crate::core::coverage::{merge_and_clean, AddrCoverage};
use crate::core::function::Function;
use crate::core::id::PackageId;
use crate::core::section_store::SectionStore;
use crate::core::symbol::Symbol;
use crate::error::{Result, SizeError};

#[derive(Debug, Clone, Default)]
pub struct KnownAddr {
    /// Function bodies from the compiler metadata table
    pub text: AddrSpace,
    /// Every resolved symbol
    pub symbol: AddrSpace,
    /// Clean coverage of `symbol`; `None` until built
    symbol_coverage: Option<AddrCoverage>,
}

/// Outcome of offering a disassembly range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisasmInsert {
    Added,
    /// Symbol evidence already explains the range
    CoveredBySymbol,
    /// Range is not inside a data section
    SectionMismatch,
}

impl KnownAddr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text_from_pclntab(
        &mut self,
        sections: &SectionStore,
        function: &Function,
        package_name: Arc<str>,
    ) -> bool {
        let addr = Addr::new(
            AddrPos::new(function.addr, function.code_size, AddrKind::Text),
            AddrSource::Pclntab,
            AddrMeta::Pclntab {
                function: function.name.clone(),
                package: package_name,
            },
        )
        .with_package(Some(function.package))
        .with_function(function.id);
        insert_checked(sections, addr, &mut self.text).is_some()
    }

    /// Record a resolved symbol; returns the inserted entry so the owning
    /// package can keep its own copy.
    pub fn insert_symbol(
        &mut self,
        sections: &SectionStore,
        symbol: &Symbol,
        package: PackageId,
        package_name: Arc<str>,
    ) -> Option<Addr> {
        let addr = Addr::new(
            AddrPos::new(symbol.addr, symbol.size, symbol.kind),
            AddrSource::Symbol,
            AddrMeta::Symbol {
                symbol: symbol.name.clone(),
                package: package_name,
            },
        )
        .with_package(Some(package));
        insert_checked(sections, addr, &mut self.symbol)
    }

    /// Freeze symbol evidence. Must run before any disassembly insertion.
    pub fn build_symbol_coverage(&mut self) -> Result<()> {
        let dirty = self.symbol.to_dirty_coverage();
        let clean = merge_and_clean([&dirty])?;
        debug!(parts = clean.len(), bytes = clean.total_size(), "symbol coverage built");
        self.symbol_coverage = Some(clean);
        Ok(())
    }

    pub fn symbol_coverage(&self) -> Option<&AddrCoverage> {
        self.symbol_coverage.as_ref()
    }

    /// Kind of the symbol evidence overlapping `[addr, addr + size)`, if any.
    pub fn symbol_cov_has(&self, addr: u64, size: u64) -> Option<AddrKind> {
        self.symbol_coverage
            .as_ref()?
            .find_overlapping(addr, size)
            .map(|p| p.pos.kind)
    }

    /// Offer a string literal recovered from `function`'s code.
    pub fn insert_disasm(
        &self,
        sections: &SectionStore,
        addr: u64,
        size: u64,
        function: &mut Function,
    ) -> Result<DisasmInsert> {
        if self.symbol_coverage.is_none() {
            return Err(SizeError::Internal(
                "symbol coverage must be built before disassembly".into(),
            ));
        }

        if let Some(found) = self.symbol_cov_has(addr, size) {
            if found != AddrKind::Data {
                return Err(SizeError::DisasmKindMismatch { addr, size, found });
            }
            // the linker merged this constant into a symbol
            return Ok(DisasmInsert::CoveredBySymbol);
        }

        let entry = Addr::new(
            AddrPos::new(addr, size, AddrKind::Data),
            AddrSource::Disasm,
            AddrMeta::Disasm {
                function: function.name.clone(),
            },
        )
        .with_package(Some(function.package))
        .with_function(function.id);

        match insert_checked(sections, entry, &mut function.disasm) {
            Some(_) => Ok(DisasmInsert::Added),
            None => Ok(DisasmInsert::SectionMismatch),
        }
    }
}

fn insert_checked(sections: &SectionStore, addr: Addr, space: &mut AddrSpace) -> Option<Addr> {
    if !sections.is_type(addr.pos.addr, addr.pos.size, addr.pos.kind) {
        let name = sections
            .find_section(addr.pos.addr, addr.pos.size)
            .map(|s| s.name.as_str())
            .unwrap_or("unknown");
        debug!("section type mismatch addr: {} belongs to {}", addr, name);
        return None;
    }
    space.insert(addr.clone());
    Some(addr)
}
