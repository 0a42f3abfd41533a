//! Coverage: reconciled byte intervals annotated with their evidence.
//!
//! Every evidence source yields an [`AddrCoverage`]. [`merge_and_clean`]
//! folds any number of them into one ascending, non-overlapping coverage.
//! Overlapping parts of the same kind are unioned; overlapping parts of
//! different kinds are resolved by discarding disassembly evidence, and are
//! otherwise a [`CoverageConflict`].

use std::fmt;

use tracing::trace;

use crate::core::address::{Addr, AddrPos};

/// A contiguous interval and every piece of evidence that landed in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoveragePart {
    pub pos: AddrPos,
    pub addrs: Vec<Addr>,
}

impl CoveragePart {
    pub fn from_addr(addr: Addr) -> Self {
        Self {
            pos: addr.pos,
            addrs: vec![addr],
        }
    }

    fn has_disasm(&self) -> bool {
        self.addrs.iter().any(Addr::is_disasm)
    }

    fn is_disasm_only(&self) -> bool {
        self.addrs.iter().all(Addr::is_disasm)
    }

    /// Rebuild this part from its non-disassembly contributors. Removing a
    /// contributor can split the interval, so this may yield several parts.
    fn without_disasm(self) -> Vec<CoveragePart> {
        let mut kept: Vec<Addr> = self.addrs.into_iter().filter(|a| !a.is_disasm()).collect();
        kept.sort_by_key(|a| (a.pos.addr, a.pos.size));

        let mut out: Vec<CoveragePart> = Vec::new();
        for addr in kept {
            match out.last_mut() {
                Some(last) if addr.pos.addr < last.pos.end() => {
                    let end = addr.pos.end();
                    if end > last.pos.end() {
                        last.pos.size = end - last.pos.addr;
                    }
                    last.addrs.push(addr);
                }
                _ => out.push(CoveragePart::from_addr(addr)),
            }
        }
        out
    }
}

impl fmt::Display for CoveragePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos: {}", self.pos)?;
        for addr in &self.addrs {
            write!(f, "\n  {}", addr)?;
        }
        Ok(())
    }
}

/// Two authoritative pieces of evidence disagree about an overlapping range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageConflict {
    pub addr: u64,
    pub existing: CoveragePart,
    pub incoming: CoveragePart,
}

impl fmt::Display for CoverageConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "addr {:#x} pos\n{}\nand\n{}\nconflict",
            self.addr, self.existing, self.incoming
        )
    }
}

/// A list of coverage parts. Clean coverages (the output of
/// [`merge_and_clean`]) are ascending and non-overlapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddrCoverage {
    parts: Vec<CoveragePart>,
}

impl AddrCoverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parts(&self) -> &[CoveragePart] {
        &self.parts
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CoveragePart> {
        self.parts.iter()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Byte count covered. Only meaningful for a clean coverage.
    pub fn total_size(&self) -> u64 {
        self.parts.iter().map(|p| p.pos.size).sum()
    }

    /// Binary search a clean coverage for a part overlapping
    /// `[addr, addr + size)`.
    pub fn find_overlapping(&self, addr: u64, size: u64) -> Option<&CoveragePart> {
        let end = addr.saturating_add(size);
        let idx = self.parts.partition_point(|p| p.pos.end() <= addr);
        self.parts.get(idx).filter(|p| p.pos.addr < end)
    }
}

impl FromIterator<CoveragePart> for AddrCoverage {
    fn from_iter<I: IntoIterator<Item = CoveragePart>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a AddrCoverage {
    type Item = &'a CoveragePart;
    type IntoIter = std::slice::Iter<'a, CoveragePart>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.iter()
    }
}

/// Merge several coverages into one clean coverage.
///
/// Inputs may be dirty or clean; every contributor is re-examined with its
/// own interval, so merging already-merged coverages is lossless.
pub fn merge_and_clean<'a>(
    coverages: impl IntoIterator<Item = &'a AddrCoverage>,
) -> Result<AddrCoverage, CoverageConflict> {
    let mut dirty: Vec<CoveragePart> = coverages
        .into_iter()
        .flat_map(|c| c.parts.iter())
        .flat_map(|p| p.addrs.iter())
        .filter(|a| a.pos.size > 0)
        .map(|a| CoveragePart::from_addr(a.clone()))
        .collect();

    dirty.sort_by_key(|p| (p.pos.addr, p.pos.size));

    let mut cover: Vec<CoveragePart> = Vec::with_capacity(dirty.len());
    for part in dirty {
        absorb(&mut cover, part)?;
    }

    Ok(AddrCoverage { parts: cover })
}

fn absorb(cover: &mut Vec<CoveragePart>, part: CoveragePart) -> Result<(), CoverageConflict> {
    loop {
        let last = match cover.last_mut() {
            Some(last) if part.pos.addr < last.pos.end() => last,
            _ => {
                cover.push(part);
                return Ok(());
            }
        };

        if last.pos.kind == part.pos.kind {
            let end = part.pos.end();
            if end > last.pos.end() {
                last.pos.size = end - last.pos.addr;
            }
            last.addrs.extend(part.addrs);
            return Ok(());
        }

        // disassembly is the least authoritative source
        if part.is_disasm_only() {
            trace!(pos = %part.pos, "dropping disassembly range overlapping other kind");
            return Ok(());
        }

        if !last.has_disasm() {
            return Err(CoverageConflict {
                addr: part.pos.addr,
                existing: last.clone(),
                incoming: part,
            });
        }

        if let Some(stale) = cover.pop() {
            trace!(pos = %stale.pos, "stripping disassembly contributors");
            cover.extend(stale.without_disasm());
        }
    }
}
