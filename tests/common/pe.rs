//! A tiny hand-assembled x86-64 PE32+ image.
//!
//! Sections: `.text` and `.rdata` with raw data, `.bss` with none. A COFF
//! symbol table follows the raw data; it records no sizes, so every size
//! comes from the distance to the next symbol.

use super::{lea_rax, mov_ebx, pad_to, put_name, put_u16, put_u32, put_u64};

pub const IMAGE_BASE: u64 = 0x1_4000_0000;
pub const TEXT_RVA: u32 = 0x1000;
pub const RDATA_RVA: u32 = 0x2000;
pub const BSS_RVA: u32 = 0x3000;

pub const TEXT_ADDR: u64 = IMAGE_BASE + TEXT_RVA as u64;
pub const RDATA_ADDR: u64 = IMAGE_BASE + RDATA_RVA as u64;
pub const BSS_ADDR: u64 = IMAGE_BASE + BSS_RVA as u64;

pub const TEXT_OFF: u32 = 0x200;
pub const RDATA_OFF: u32 = 0x220;
const SYMTAB_OFF: u32 = 0x230;

const IMAGE_SCN_CODE_RX: u32 = 0x6000_0020;
const IMAGE_SCN_RDATA: u32 = 0x4000_0040;
const IMAGE_SCN_BSS: u32 = 0xc000_0080;
const IMAGE_SYM_CLASS_EXTERNAL: u8 = 2;

struct Shdr {
    name: &'static str,
    virtual_size: u32,
    rva: u32,
    raw_size: u32,
    raw_ptr: u32,
    characteristics: u32,
}

/// Symbols: `main.main` and `main.helper` in `.text`, the literal table
/// marker and `main.table` in `.rdata`, `main.counter` in `.bss`.
pub fn hello_pe() -> Vec<u8> {
    let mut text = vec![0xcc; 0x20];
    text[0..7].copy_from_slice(&lea_rax(TEXT_ADDR, RDATA_ADDR));
    text[7..12].copy_from_slice(&mov_ebx(5));

    let mut rdata = b"hello\0\0\0".to_vec();
    rdata.extend_from_slice(&[0xff, 0xfe, 0xfd, 0xfc]);
    rdata.extend_from_slice(&[0x11; 4]);

    let shdrs = [
        Shdr {
            name: ".text",
            virtual_size: 0x20,
            rva: TEXT_RVA,
            raw_size: 0x20,
            raw_ptr: TEXT_OFF,
            characteristics: IMAGE_SCN_CODE_RX,
        },
        Shdr {
            name: ".rdata",
            virtual_size: 0x10,
            rva: RDATA_RVA,
            raw_size: 0x10,
            raw_ptr: RDATA_OFF,
            characteristics: IMAGE_SCN_RDATA,
        },
        Shdr {
            name: ".bss",
            virtual_size: 0x100,
            rva: BSS_RVA,
            raw_size: 0,
            raw_ptr: 0,
            characteristics: IMAGE_SCN_BSS,
        },
    ];

    // (name, section number, offset within section)
    let syms: [(&str, u16, u32); 5] = [
        ("main.main", 1, 0),
        ("main.helper", 1, 0x10),
        ("go:string.*", 2, 0),
        ("main.table", 2, 0xc),
        ("main.counter", 3, 0),
    ];

    // string table offsets count the leading length field
    let mut strings = Vec::new();
    let mut symtab = Vec::new();
    for (name, section, value) in syms {
        let off = 4 + strings.len() as u32;
        strings.extend_from_slice(name.as_bytes());
        strings.push(0);
        put_u32(&mut symtab, 0);
        put_u32(&mut symtab, off);
        put_u32(&mut symtab, value);
        put_u16(&mut symtab, section);
        put_u16(&mut symtab, 0);
        symtab.push(IMAGE_SYM_CLASS_EXTERNAL);
        symtab.push(0);
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"MZ");
    pad_to(&mut out, 0x3c);
    put_u32(&mut out, 0x40);

    out.extend_from_slice(b"PE\0\0");
    put_u16(&mut out, 0x8664); // IMAGE_FILE_MACHINE_AMD64
    put_u16(&mut out, shdrs.len() as u16);
    put_u32(&mut out, 0);
    put_u32(&mut out, SYMTAB_OFF);
    put_u32(&mut out, syms.len() as u32);
    put_u16(&mut out, 240);
    put_u16(&mut out, 0x22);

    // PE32+ optional header
    put_u16(&mut out, 0x20b);
    out.extend_from_slice(&[14, 0]);
    put_u32(&mut out, 0x20);
    put_u32(&mut out, 0x10);
    put_u32(&mut out, 0x100);
    put_u32(&mut out, TEXT_RVA);
    put_u32(&mut out, TEXT_RVA);
    put_u64(&mut out, IMAGE_BASE);
    put_u32(&mut out, 0x1000);
    put_u32(&mut out, 0x200);
    for v in [6u16, 0, 0, 0, 6, 0] {
        put_u16(&mut out, v);
    }
    put_u32(&mut out, 0);
    put_u32(&mut out, 0x4000);
    put_u32(&mut out, TEXT_OFF);
    put_u32(&mut out, 0);
    put_u16(&mut out, 3); // console subsystem
    put_u16(&mut out, 0);
    for v in [0x10_0000u64, 0x1000, 0x10_0000, 0x1000] {
        put_u64(&mut out, v);
    }
    put_u32(&mut out, 0);
    put_u32(&mut out, 16);
    out.extend_from_slice(&[0u8; 16 * 8]);

    for sh in &shdrs {
        put_name::<8>(&mut out, sh.name);
        put_u32(&mut out, sh.virtual_size);
        put_u32(&mut out, sh.rva);
        put_u32(&mut out, sh.raw_size);
        put_u32(&mut out, sh.raw_ptr);
        put_u32(&mut out, 0);
        put_u32(&mut out, 0);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        put_u32(&mut out, sh.characteristics);
    }

    pad_to(&mut out, TEXT_OFF as u64);
    out.extend_from_slice(&text);
    out.extend_from_slice(&rdata);
    out.extend_from_slice(&symtab);
    put_u32(&mut out, 4 + strings.len() as u32);
    out.extend_from_slice(&strings);
    out
}
