//! Per-function candidate extraction and validation.

use std::sync::Arc;

use tracing::debug;

use crate::core::address::AddrPos;
use crate::core::section_store::{cache_contains, SectionStore};
use crate::disasm::pattern::Candidate;
use crate::disasm::registry::{self, Backend};
use crate::error::Result;
use crate::formats::FormatAdapter;

/// Shared, read-only state for disassembly workers.
pub struct Extractor {
    adapter: Arc<dyn FormatAdapter>,
    backend: Backend,
    text_start: u64,
    text_end: u64,
    file_size: u64,
    /// Data section ranges; literals live nowhere else
    data: Vec<(u64, u64)>,
    /// Extent of the string-literal table, when the symbol table marks it
    string_table: Option<AddrPos>,
}

impl Extractor {
    /// Fails with `ArchNotSupported` or `TextSectionNotFound`; the first is
    /// recoverable.
    pub fn new(
        adapter: Arc<dyn FormatAdapter>,
        sections: &SectionStore,
        string_table: Option<AddrPos>,
    ) -> Result<Self> {
        let backend = registry::for_arch(adapter.architecture())?;
        let (text_start, text_len) = {
            let (start, text) = adapter.text_segment()?;
            (start, text.len() as u64)
        };
        let file_size = adapter.file_size();
        debug!(
            backend = backend.name(),
            text_start,
            text_len,
            string_table = string_table.is_some(),
            "extractor ready"
        );
        Ok(Self {
            adapter,
            backend,
            text_start,
            text_end: text_start.saturating_add(text_len),
            file_size,
            data: sections.data_ranges().to_vec(),
            string_table,
        })
    }

    /// Candidates from the code in `[start, end)`. Ranges outside the text
    /// section yield nothing.
    pub fn extract(&self, start: u64, end: u64) -> Vec<Candidate> {
        if start < self.text_start || end > self.text_end || start >= end {
            debug!(start, end, "function outside text section");
            return Vec::new();
        }
        let Ok((_, text)) = self.adapter.text_segment() else {
            return Vec::new();
        };
        let lo = (start - self.text_start) as usize;
        let hi = (end - self.text_start) as usize;
        match text.get(lo..hi) {
            Some(code) => self.backend.extract(code, start),
            None => Vec::new(),
        }
    }

    /// A candidate is a literal only if it is non-empty, no larger than the
    /// file, inside a data section (and the string table when one is known),
    /// and its bytes are valid UTF-8.
    pub fn validate(&self, addr: u64, size: u64) -> bool {
        if size == 0 || size > self.file_size {
            return false;
        }
        if !cache_contains(&self.data, addr, size) {
            return false;
        }
        if let Some(table) = &self.string_table {
            if !table.contains(addr, size) {
                return false;
            }
        }
        match self.adapter.read_at(addr, size) {
            Ok(bytes) => std::str::from_utf8(bytes).is_ok(),
            Err(_) => false,
        }
    }
}
