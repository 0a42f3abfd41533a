//! Symbol table attribution.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{PrefixPolicy, SymbolConfig};
use crate::core::address::AddrKind;
use crate::core::known_addr::KnownAddr;
use crate::core::section_store::SectionStore;
use crate::core::symbol::Symbol;
use crate::error::Result;
use crate::formats::FormatAdapter;
use crate::intern::Interner;
use crate::registry::path::{PathHeuristic, PublicSuffix};
use crate::registry::PackageRegistry;

/// What happened to one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    Attributed,
    /// No package can be derived, or C-interop glue
    Ignored,
    /// A package path was derived but nothing is registered under it
    Unresolved,
    /// A compiler-table function already starts here
    YieldedToPclntab,
    /// Not inside a section of the symbol's kind
    SectionMismatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SymbolStats {
    pub seen: usize,
    pub attributed: usize,
    pub ignored: usize,
    pub unresolved: usize,
    pub yielded: usize,
    pub mismatched: usize,
    /// `false` when the binary is stripped
    pub symbol_table: bool,
}

impl SymbolStats {
    fn record(&mut self, a: Attribution) {
        self.seen += 1;
        match a {
            Attribution::Attributed => self.attributed += 1,
            Attribution::Ignored => self.ignored += 1,
            Attribution::Unresolved => self.unresolved += 1,
            Attribution::YieldedToPclntab => self.yielded += 1,
            Attribution::SectionMismatch => self.mismatched += 1,
        }
    }
}

/// Maps symbols to packages and records them in the address model.
pub struct SymbolAttributor<'a> {
    heuristic: PathHeuristic<'a>,
    cgo_prefixes: &'a [String],
}

impl<'a> SymbolAttributor<'a> {
    pub fn new(policy: PrefixPolicy, suffixes: &'a dyn PublicSuffix, config: &'a SymbolConfig) -> Self {
        Self {
            heuristic: PathHeuristic::new(policy, suffixes),
            cgo_prefixes: &config.cgo_prefixes,
        }
    }

    /// Attribute every symbol, then freeze symbol coverage. A missing symbol
    /// table is reported and tolerated; coverage is still built (empty) so
    /// the disassembly phase can run.
    pub fn run(
        &self,
        adapter: &dyn FormatAdapter,
        sections: &SectionStore,
        registry: &mut PackageRegistry,
        known: &mut KnownAddr,
        interner: &mut Interner,
    ) -> Result<SymbolStats> {
        info!(policy = ?self.heuristic.policy(), "Analyzing symbols...");
        let mut stats = SymbolStats {
            symbol_table: true,
            ..Default::default()
        };

        let walked = adapter.iterate_symbols(&mut |name, addr, size, kind| {
            let a = self.attribute(name, addr, size, kind, sections, registry, known, interner);
            stats.record(a);
        });
        match walked {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "continuing without symbol evidence");
                stats.symbol_table = false;
            }
            Err(e) => return Err(e),
        }

        known.build_symbol_coverage()?;
        info!(
            seen = stats.seen,
            attributed = stats.attributed,
            unresolved = stats.unresolved,
            "Analyzing symbols done"
        );
        Ok(stats)
    }

    /// Attribute a single symbol.
    #[allow(clippy::too_many_arguments)]
    pub fn attribute(
        &self,
        name: &str,
        addr: u64,
        size: u64,
        kind: AddrKind,
        sections: &SectionStore,
        registry: &mut PackageRegistry,
        known: &mut KnownAddr,
        interner: &mut Interner,
    ) -> Attribution {
        if size == 0 || kind == AddrKind::Unknown {
            return Attribution::Ignored;
        }

        let package = self.heuristic.package_of(name);
        if package.is_empty() || self.cgo_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            return Attribution::Ignored;
        }
        if package == "$f64" || package == "$f32" {
            return Attribution::Ignored;
        }

        let Some(pid) = registry.lookup(&package) else {
            debug!(name = %package, symbol = name, %kind, "package not found");
            return Attribution::Unresolved;
        };

        if kind == AddrKind::Text && known.text.get(addr).is_some() {
            return Attribution::YieldedToPclntab;
        }

        let symbol = Symbol::new(interner.intern(name), addr, size, kind);
        let package_name = registry.package(pid).name.clone();
        match known.insert_symbol(sections, &symbol, pid, package_name) {
            Some(entry) => {
                let pkg = registry.package_mut(pid);
                pkg.symbol_space.insert(entry);
                pkg.symbols.push(symbol);
                Attribution::Attributed
            }
            None => Attribution::SectionMismatch,
        }
    }
}
