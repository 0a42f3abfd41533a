//! PE and Mach-O adapters over hand-assembled images.

mod common;

use bloatmap::core::address::{AddrKind, AddrPos};
use bloatmap::core::section::SectionContent;
use bloatmap::core::section_store::SectionStore;
use bloatmap::formats::{self, Arch, Format, FormatAdapter, ImageBytes, PeAdapter};
use bloatmap::SizeError;

use common::{macho, pe};

fn symbols(adapter: &dyn FormatAdapter) -> Vec<(String, u64, u64, AddrKind)> {
    let mut seen = Vec::new();
    adapter
        .iterate_symbols(&mut |name, addr, size, kind| seen.push((name.to_string(), addr, size, kind)))
        .unwrap();
    seen
}

#[test]
fn test_pe_sections_relocated_by_image_base() {
    let adapter = PeAdapter::new(ImageBytes::from_vec(pe::hello_pe())).unwrap();
    assert_eq!(adapter.image_base(), pe::IMAGE_BASE);
    assert_eq!(adapter.format(), Format::Pe);
    assert_eq!(adapter.architecture(), Arch::Amd64);

    let sections = adapter.sections();
    let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec![".text", ".rdata", ".bss"]);

    let text = &sections[0];
    assert_eq!(text.addr, pe::TEXT_ADDR);
    assert_eq!(text.offset, pe::TEXT_OFF as u64);
    assert_eq!(text.content, SectionContent::Text);

    let rdata = &sections[1];
    assert_eq!(rdata.addr, pe::RDATA_ADDR);
    assert_eq!(rdata.content, SectionContent::Data);
    assert!(!rdata.only_in_memory);

    let bss = &sections[2];
    assert_eq!(bss.addr, pe::BSS_ADDR);
    assert_eq!(bss.size, 0x100);
    assert_eq!(bss.file_size, 0);
    assert!(bss.only_in_memory);
}

#[test]
fn test_pe_reads_and_text() {
    let adapter = PeAdapter::new(ImageBytes::from_vec(pe::hello_pe())).unwrap();

    let (start, text) = adapter.text_segment().unwrap();
    assert_eq!(start, pe::TEXT_ADDR);
    assert_eq!(text.len(), 0x20);
    assert_eq!(&text[..3], &[0x48, 0x8d, 0x05]);

    assert_eq!(adapter.read_at(pe::RDATA_ADDR, 5).unwrap(), b"hello");
    // the relative address is not mapped
    assert!(matches!(
        adapter.read_at(pe::RDATA_RVA as u64, 5),
        Err(SizeError::AddrNotFound { .. })
    ));
    // zero-fill has no file bytes
    assert!(adapter.read_at(pe::BSS_ADDR, 4).is_err());
    // past the raw data
    assert!(adapter.read_at(pe::RDATA_ADDR + 0xc, 8).is_err());
}

#[test]
fn test_pe_symbol_sizes_from_next_symbol() {
    let adapter = PeAdapter::new(ImageBytes::from_vec(pe::hello_pe())).unwrap();

    // `main.counter` lives in a section that is neither code nor
    // initialized data, so it only bounds `main.table`
    assert_eq!(
        symbols(&adapter),
        vec![
            ("main.main".to_string(), pe::TEXT_ADDR, 0x10, AddrKind::Text),
            ("main.helper".to_string(), pe::TEXT_ADDR + 0x10, 0xff0, AddrKind::Text),
            ("main.table".to_string(), pe::RDATA_ADDR + 0xc, 0xff4, AddrKind::Data),
        ]
    );
    assert_eq!(
        adapter.go_string_table().unwrap(),
        Some(AddrPos::new(pe::RDATA_ADDR, 0xc, AddrKind::Data))
    );
}

#[test]
fn test_pe_passes_size_check() {
    let bytes = pe::hello_pe();
    let len = bytes.len() as u64;
    let adapter = formats::open(ImageBytes::from_vec(bytes)).unwrap();
    assert_eq!(adapter.format(), Format::Pe);
    let store = SectionStore::from_sections(adapter.sections().to_vec()).unwrap();
    assert!(store.assert_size(len).is_ok());
    assert!(store.is_data(pe::RDATA_ADDR, 0x10));
    assert!(!store.is_data(pe::BSS_ADDR, 4));
}

#[test]
fn test_macho_sections_named_with_segment() {
    let adapter = formats::open(ImageBytes::from_vec(macho::hello_macho())).unwrap();
    assert_eq!(adapter.format(), Format::MachO);
    assert_eq!(adapter.architecture(), Arch::Amd64);

    let sections = adapter.sections();
    let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["__text __TEXT", "__noptrdata __DATA", "__bss __DATA", "__data __DATA"]
    );
    assert_eq!(sections[0].content, SectionContent::Text);
    assert_eq!(sections[0].offset, macho::TEXT_OFF);
    assert_eq!(sections[1].content, SectionContent::Data);

    let bss = &sections[2];
    assert!(bss.only_in_memory);
    assert_eq!(bss.file_size, 0);
    assert_eq!(bss.addr, macho::BSS_ADDR);

    assert!(!sections[3].only_in_memory);
    assert_eq!(sections[3].file_size, 0x10);
}

#[test]
fn test_macho_zero_fill_hole() {
    let adapter = formats::open(ImageBytes::from_vec(macho::hello_macho())).unwrap();

    assert_eq!(adapter.read_at(macho::DATA_ADDR, 5).unwrap(), b"hello");
    assert_eq!(adapter.read_at(macho::VAR_ADDR, 4).unwrap(), &[0x22; 4]);
    // inside the segment's file range, but zero-filled
    assert!(matches!(
        adapter.read_at(macho::BSS_ADDR, 4),
        Err(SizeError::AddrNotFound { .. })
    ));
    // straddling into the hole
    assert!(adapter.read_at(macho::DATA_ADDR + 0xc, 8).is_err());

    let (start, text) = adapter.text_segment().unwrap();
    assert_eq!(start, macho::TEXT_ADDR);
    assert_eq!(text.len(), 0x20);
}

#[test]
fn test_macho_symbol_sizes_from_next_symbol() {
    let adapter = formats::open(ImageBytes::from_vec(macho::hello_macho())).unwrap();

    // zero-fill symbols are dropped and the last symbol has nothing to
    // measure against
    assert_eq!(
        symbols(adapter.as_ref()),
        vec![
            ("main.main".to_string(), macho::TEXT_ADDR, 0x10, AddrKind::Text),
            (
                "main.helper".to_string(),
                macho::TEXT_ADDR + 0x10,
                macho::DATA_ADDR - macho::TEXT_ADDR - 0x10,
                AddrKind::Text
            ),
            ("main.table".to_string(), macho::DATA_ADDR + 0xc, 4, AddrKind::Data),
        ]
    );
    assert_eq!(
        adapter.go_string_table().unwrap(),
        Some(AddrPos::new(macho::DATA_ADDR, 0xc, AddrKind::Data))
    );
}
