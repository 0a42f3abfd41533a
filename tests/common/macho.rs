//! A tiny hand-assembled x86-64 Mach-O executable.
//!
//! `__TEXT` maps the header, load commands and `__text`. `__DATA` holds
//! `__noptrdata`, a zero-fill `__bss` and `__data`, in that order, so the
//! zero-fill section is a hole in the middle of a file-backed segment.

use super::{add_str, lea_rax, mov_ebx, pad_to, put_name, put_u16, put_u32, put_u64};

pub const BASE: u64 = 0x1_0000_0000;
pub const TEXT_OFF: u64 = 0x400;
pub const DATA_OFF: u64 = 0x420;

pub const TEXT_ADDR: u64 = BASE + TEXT_OFF;
pub const DATA_ADDR: u64 = BASE + 0x1000;
pub const BSS_ADDR: u64 = DATA_ADDR + 0x10;
pub const VAR_ADDR: u64 = DATA_ADDR + 0x20;

const SYMTAB_OFF: u64 = 0x450;

const LC_SEGMENT_64: u32 = 0x19;
const LC_SYMTAB: u32 = 0x2;
const S_ZEROFILL: u32 = 0x1;
const N_SECT_EXT: u8 = 0x0f;

struct Sect {
    sect: &'static str,
    addr: u64,
    size: u64,
    offset: u32,
    flags: u32,
}

struct Segment {
    name: &'static str,
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    sects: Vec<Sect>,
}

fn put_segment(out: &mut Vec<u8>, seg: &Segment) {
    put_u32(out, LC_SEGMENT_64);
    put_u32(out, 72 + 80 * seg.sects.len() as u32);
    put_name::<16>(out, seg.name);
    put_u64(out, seg.vmaddr);
    put_u64(out, seg.vmsize);
    put_u64(out, seg.fileoff);
    put_u64(out, seg.filesize);
    put_u32(out, 7);
    put_u32(out, 7);
    put_u32(out, seg.sects.len() as u32);
    put_u32(out, 0);
    for s in &seg.sects {
        put_name::<16>(out, s.sect);
        put_name::<16>(out, seg.name);
        put_u64(out, s.addr);
        put_u64(out, s.size);
        put_u32(out, s.offset);
        put_u32(out, 4);
        put_u32(out, 0);
        put_u32(out, 0);
        put_u32(out, s.flags);
        put_u32(out, 0);
        put_u32(out, 0);
        put_u32(out, 0);
    }
}

/// Symbols: `main.main` and `main.helper` in `__text`, the literal table
/// marker and `main.table` in `__noptrdata`, `main.counter` in `__bss` and
/// `main.state` in `__data`.
pub fn hello_macho() -> Vec<u8> {
    let mut text = vec![0xcc; 0x20];
    text[0..7].copy_from_slice(&lea_rax(TEXT_ADDR, DATA_ADDR));
    text[7..12].copy_from_slice(&mov_ebx(5));

    let mut noptrdata = b"hello\0\0\0".to_vec();
    noptrdata.extend_from_slice(&[0xff, 0xfe, 0xfd, 0xfc]);
    noptrdata.extend_from_slice(&[0x11; 4]);
    let data = [0x22u8; 0x10];

    let segments = [
        Segment {
            name: "__TEXT",
            vmaddr: BASE,
            vmsize: 0x1000,
            fileoff: 0,
            filesize: TEXT_OFF + 0x20,
            sects: vec![Sect {
                sect: "__text",
                addr: TEXT_ADDR,
                size: 0x20,
                offset: TEXT_OFF as u32,
                flags: 0x8000_0400,
            }],
        },
        Segment {
            name: "__DATA",
            vmaddr: DATA_ADDR,
            vmsize: 0x1000,
            fileoff: DATA_OFF,
            filesize: 0x30,
            sects: vec![
                Sect {
                    sect: "__noptrdata",
                    addr: DATA_ADDR,
                    size: 0x10,
                    offset: DATA_OFF as u32,
                    flags: 0,
                },
                Sect {
                    sect: "__bss",
                    addr: BSS_ADDR,
                    size: 0x10,
                    offset: 0,
                    flags: S_ZEROFILL,
                },
                Sect {
                    sect: "__data",
                    addr: VAR_ADDR,
                    size: 0x10,
                    offset: DATA_OFF as u32 + 0x20,
                    flags: 0,
                },
            ],
        },
    ];

    // (name, section ordinal, address)
    let syms: [(&str, u8, u64); 6] = [
        ("main.main", 1, TEXT_ADDR),
        ("main.helper", 1, TEXT_ADDR + 0x10),
        ("go:string.*", 2, DATA_ADDR),
        ("main.table", 2, DATA_ADDR + 0xc),
        ("main.counter", 3, BSS_ADDR),
        ("main.state", 4, VAR_ADDR),
    ];

    let mut strtab = vec![0u8];
    let mut symtab = Vec::new();
    for (name, sect, value) in syms {
        put_u32(&mut symtab, add_str(&mut strtab, name));
        symtab.push(N_SECT_EXT);
        symtab.push(sect);
        put_u16(&mut symtab, 0);
        put_u64(&mut symtab, value);
    }
    let stroff = SYMTAB_OFF + symtab.len() as u64;

    let mut cmds = Vec::new();
    for seg in &segments {
        put_segment(&mut cmds, seg);
    }
    put_u32(&mut cmds, LC_SYMTAB);
    put_u32(&mut cmds, 24);
    put_u32(&mut cmds, SYMTAB_OFF as u32);
    put_u32(&mut cmds, syms.len() as u32);
    put_u32(&mut cmds, stroff as u32);
    put_u32(&mut cmds, strtab.len() as u32);

    let mut out = Vec::new();
    put_u32(&mut out, 0xfeed_facf); // MH_MAGIC_64
    put_u32(&mut out, 0x0100_0007); // CPU_TYPE_X86_64
    put_u32(&mut out, 3);
    put_u32(&mut out, 2); // MH_EXECUTE
    put_u32(&mut out, 3);
    put_u32(&mut out, cmds.len() as u32);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    out.extend_from_slice(&cmds);

    pad_to(&mut out, TEXT_OFF);
    out.extend_from_slice(&text);
    out.extend_from_slice(&noptrdata);
    // file bytes under the zero-fill section, never to be read
    out.extend_from_slice(&[0xee; 0x10]);
    out.extend_from_slice(&data);
    out.extend_from_slice(&symtab);
    out.extend_from_slice(&strtab);
    out
}
