//! Coverage collection and size accounting.
//!
//! Runs after every evidence source has finished, in this order:
//! per-package coverage (leaf first), global coverage, per-section known
//! sizes, per-package sizes. Each value is written once.

use tracing::{debug, info, warn};

use crate::core::address_space::AddrSpace;
use crate::core::coverage::{merge_and_clean, AddrCoverage};
use crate::core::known_addr::KnownAddr;
use crate::core::section_store::SectionStore;
use crate::error::{Result, SizeError};
use crate::registry::PackageRegistry;

/// Merge each package's symbol and disassembly evidence into its own
/// coverage.
pub fn build_package_coverages(registry: &mut PackageRegistry) -> Result<()> {
    for pid in registry.leaf_first() {
        let pkg = registry.package(pid);
        if pkg.coverage.is_some() {
            continue;
        }
        let disasm = AddrSpace::merge(pkg.functions().map(|f| &registry.function(f).disasm));
        let coverage = merge_and_clean([
            &pkg.symbol_space.to_dirty_coverage(),
            &disasm.to_dirty_coverage(),
        ])?;
        registry.package_mut(pid).coverage = Some(coverage);
    }
    Ok(())
}

/// Reconcile compiler-table, symbol and per-package evidence into one
/// coverage for the whole binary.
pub fn build_global_coverage(known: &KnownAddr, registry: &PackageRegistry) -> Result<AddrCoverage> {
    let text = known.text.to_dirty_coverage();
    let mut sources: Vec<&AddrCoverage> = vec![&text];
    if let Some(symbols) = known.symbol_coverage() {
        sources.push(symbols);
    }
    sources.extend(registry.packages().iter().filter_map(|p| p.coverage.as_ref()));

    let coverage = merge_and_clean(sources)?;
    info!(
        parts = coverage.len(),
        bytes = coverage.total_size(),
        "coverage collected"
    );
    Ok(coverage)
}

/// Where the compiler metadata table lives: the section holding
/// `pclntab_address` if given, else the first candidate name present.
fn metadata_section(
    sections: &SectionStore,
    candidates: &[&str],
    pclntab_address: Option<u64>,
) -> Option<usize> {
    if let Some(addr) = pclntab_address {
        if let Some(i) = sections
            .sections()
            .iter()
            .position(|s| s.addr <= addr && addr < s.addr_end)
        {
            return Some(i);
        }
    }
    candidates.iter().find_map(|name| {
        sections
            .sections()
            .iter()
            .position(|s| s.name == *name)
    })
}

/// Map `accumulated` virtual bytes of a section onto its file bytes.
pub fn file_bytes(accumulated: u64, virtual_size: u64, file_size: u64) -> u64 {
    if virtual_size == 0 || virtual_size == file_size {
        return accumulated;
    }
    ((accumulated as u128 * file_size as u128) / virtual_size as u128) as u64
}

/// Fill in `known_size` for every section from the global coverage and the
/// metadata-table byte total.
pub fn assign_section_sizes(
    sections: &mut SectionStore,
    coverage: &AddrCoverage,
    pcln_total: u64,
    metadata_candidates: &[&str],
    pclntab_address: Option<u64>,
) -> Result<()> {
    let mut acc = vec![0u64; sections.len()];
    for part in coverage {
        match sections.find_section_index(part.pos.addr, part.pos.size) {
            Some(i) => acc[i] = acc[i].saturating_add(part.pos.size),
            None => debug!("possible bss addr {}", part),
        }
    }

    let pcln_section = metadata_section(sections, metadata_candidates, pclntab_address);
    match pcln_section {
        Some(i) => acc[i] = acc[i].saturating_add(pcln_total),
        None if pcln_total > 0 => {
            return Err(SizeError::MetadataSectionNotFound(metadata_candidates.join(", ")));
        }
        None => {}
    }

    for (i, section) in sections.sections_mut().iter_mut().enumerate() {
        if acc[i] == 0 || section.file_size == 0 {
            section.known_size = 0;
            continue;
        }
        let mut known = file_bytes(acc[i], section.size, section.file_size);
        if known > section.file_size {
            // the metadata table shares data between functions
            if Some(i) != pcln_section {
                warn!(
                    "section {} known size {} > file size {}",
                    section.name, known, section.file_size
                );
            }
            known = section.file_size;
        }
        section.known_size = known;
    }
    Ok(())
}

/// Package size: own functions, own coverage, then every subpackage.
pub fn assign_package_sizes(registry: &mut PackageRegistry) {
    for pid in registry.leaf_first() {
        let pkg = registry.package(pid);
        let functions = pkg
            .functions()
            .map(|f| registry.function(f).size())
            .fold(0, u64::saturating_add);
        let coverage = pkg.coverage.as_ref().map_or(0, AddrCoverage::total_size);
        let subs: u64 = pkg
            .subpackages
            .values()
            .map(|&c| registry.package(c).size)
            .fold(0, u64::saturating_add);
        registry.package_mut(pid).size = functions.saturating_add(coverage).saturating_add(subs);
    }
}
