//! Section storage and address-to-section lookups.

use std::collections::HashMap;

use tracing::debug;

use crate::core::address::AddrKind;
use crate::core::section::{Section, SectionContent};
use crate::error::{Result, SizeError};

/// Holds every parsed section plus sorted interval caches for the text and
/// data sections.
#[derive(Debug, Clone, Default)]
pub struct SectionStore {
    sections: Vec<Section>,
    by_name: HashMap<String, usize>,
    text_cache: Vec<(u64, u64)>,
    data_cache: Vec<(u64, u64)>,
}

impl SectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load sections, rejecting duplicate names. Caches are rebuilt.
    pub fn from_sections(sections: impl IntoIterator<Item = Section>) -> Result<Self> {
        let mut store = Self::new();
        for section in sections {
            store.add(section)?;
        }
        store.build_cache();
        Ok(store)
    }

    pub fn add(&mut self, section: Section) -> Result<()> {
        if self.by_name.contains_key(&section.name) {
            return Err(SizeError::DuplicateSection(section.name));
        }
        self.by_name.insert(section.name.clone(), self.sections.len());
        self.sections.push(section);
        Ok(())
    }

    pub fn build_cache(&mut self) {
        let mut text = Vec::new();
        let mut data = Vec::new();
        for s in self.sections.iter().filter(|s| !s.debug) {
            match s.content {
                SectionContent::Text => text.push((s.addr, s.addr_end)),
                SectionContent::Data => data.push((s.addr, s.addr_end)),
                SectionContent::Other => {}
            }
        }
        text.sort_unstable();
        data.sort_unstable();
        self.text_cache = text;
        self.data_cache = data;
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.by_name.get(name).map(|&i| &self.sections[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Section> {
        match self.by_name.get(name) {
            Some(&i) => self.sections.get_mut(i),
            None => None,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn sections_mut(&mut self) -> &mut [Section] {
        &mut self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sorted `[start, end)` address ranges of the data sections.
    pub fn data_ranges(&self) -> &[(u64, u64)] {
        &self.data_cache
    }

    pub fn is_text(&self, addr: u64, size: u64) -> bool {
        cache_contains(&self.text_cache, addr, size)
    }

    pub fn is_data(&self, addr: u64, size: u64) -> bool {
        cache_contains(&self.data_cache, addr, size)
    }

    /// Whether `[addr, addr + size)` falls in a section compatible with
    /// `kind`. Unknown ranges are never accepted.
    pub fn is_type(&self, addr: u64, size: u64, kind: AddrKind) -> bool {
        match kind {
            AddrKind::Text => self.is_text(addr, size),
            AddrKind::Data => self.is_data(addr, size),
            AddrKind::Unknown => false,
        }
    }

    /// The non-debug section containing the whole range.
    pub fn find_section(&self, addr: u64, size: u64) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| !s.debug && s.contains(addr, size))
    }

    /// Index form of [`find_section`](Self::find_section).
    pub fn find_section_index(&self, addr: u64, size: u64) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| !s.debug && s.contains(addr, size))
    }

    /// Sum of on-disk section sizes must not exceed the file.
    pub fn assert_size(&self, file_size: u64) -> Result<()> {
        let total = self
            .sections
            .iter()
            .filter(|s| !s.only_in_memory)
            .try_fold(0u64, |acc, s| acc.checked_add(s.file_size));
        debug!(sections = ?total, file = file_size, "section size check");
        match total {
            Some(total) if total <= file_size => Ok(()),
            // an overflowing sum is always larger than the file
            total => Err(SizeError::SectionSizeExceeded {
                sections: total.unwrap_or(u64::MAX),
                file: file_size,
            }),
        }
    }
}

pub(crate) fn cache_contains(cache: &[(u64, u64)], addr: u64, size: u64) -> bool {
    let end = addr.saturating_add(size);
    // last interval starting at or before addr
    let idx = cache.partition_point(|&(start, _)| start <= addr);
    if idx == 0 {
        return false;
    }
    let (_, cend) = cache[idx - 1];
    end <= cend
}
