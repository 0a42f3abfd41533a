#![no_main]
use bloatmap::core::section_store::SectionStore;
use bloatmap::formats::{self, ImageBytes};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(adapter) = formats::open(ImageBytes::from_vec(data.to_vec())) {
        let _ = adapter.text_segment();
        let _ = adapter.go_string_table();
        let _ = adapter.iterate_symbols(&mut |_, _, _, _| {});
        for s in adapter.sections() {
            let _ = adapter.read_at(s.addr, s.size.min(64));
        }
        if let Ok(store) = SectionStore::from_sections(adapter.sections().to_vec()) {
            let _ = store.assert_size(adapter.file_size());
        }
    }
});
