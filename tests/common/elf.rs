//! A tiny hand-assembled x86-64 ELF executable.
//!
//! One PT_LOAD segment maps the whole file at [`BASE`]. Sections:
//! `.text`, `.rodata`, `.symtab`, `.strtab`, `.shstrtab`.

use super::{add_str, lea_rax, mov_ebx, pad_to, put_u16, put_u32, put_u64};

pub const BASE: u64 = 0x40_0000;
pub const TEXT_OFF: u64 = 0x80;
pub const TEXT_SIZE: u64 = 0x20;
pub const RODATA_OFF: u64 = 0xa0;
pub const RODATA_SIZE: u64 = 0x10;

pub const TEXT_ADDR: u64 = BASE + TEXT_OFF;
pub const RODATA_ADDR: u64 = BASE + RODATA_OFF;

const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHF_ALLOC: u64 = 0x2;
const SHF_EXECINSTR: u64 = 0x4;
const STT_OBJECT: u8 = 1;
const STT_FUNC: u8 = 2;
const STB_GLOBAL: u8 = 1;

struct Sym {
    name: &'static str,
    value: u64,
    size: u64,
    kind: u8,
    shndx: u16,
}

struct Shdr {
    name: u32,
    kind: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    entsize: u64,
}

/// `main.main` loads "hello" from `.rodata`; `main.table` owns the last
/// four bytes of `.rodata`; `go:string.*` marks the literal table.
pub fn hello_elf() -> Vec<u8> {
    let mut text = vec![0xcc; TEXT_SIZE as usize];
    text[0..7].copy_from_slice(&lea_rax(TEXT_ADDR, RODATA_ADDR));
    text[7..12].copy_from_slice(&mov_ebx(5));

    let mut rodata = b"hello\0\0\0".to_vec();
    rodata.extend_from_slice(&[0xff, 0xfe, 0xfd, 0xfc]);
    rodata.extend_from_slice(&[0x11; 4]);

    let syms = [
        Sym {
            name: "main.main",
            value: TEXT_ADDR,
            size: 0x10,
            kind: STT_FUNC,
            shndx: 1,
        },
        Sym {
            name: "go:string.*",
            value: RODATA_ADDR,
            size: 0,
            kind: STT_OBJECT,
            shndx: 2,
        },
        Sym {
            name: "main.table",
            value: RODATA_ADDR + 0xc,
            size: 4,
            kind: STT_OBJECT,
            shndx: 2,
        },
    ];

    let mut strtab = vec![0u8];
    let mut symtab = vec![0u8; 24];
    for s in &syms {
        let name = add_str(&mut strtab, s.name);
        put_u32(&mut symtab, name);
        symtab.push((STB_GLOBAL << 4) | s.kind);
        symtab.push(0);
        put_u16(&mut symtab, s.shndx);
        put_u64(&mut symtab, s.value);
        put_u64(&mut symtab, s.size);
    }

    let mut shstrtab = vec![0u8];
    let n_text = add_str(&mut shstrtab, ".text");
    let n_rodata = add_str(&mut shstrtab, ".rodata");
    let n_symtab = add_str(&mut shstrtab, ".symtab");
    let n_strtab = add_str(&mut shstrtab, ".strtab");
    let n_shstrtab = add_str(&mut shstrtab, ".shstrtab");

    let symtab_off = RODATA_OFF + RODATA_SIZE;
    let strtab_off = symtab_off + symtab.len() as u64;
    let shstrtab_off = strtab_off + strtab.len() as u64;
    let shoff = (shstrtab_off + shstrtab.len() as u64 + 7) & !7;
    let load_size = RODATA_OFF + RODATA_SIZE;

    let shdrs = [
        Shdr {
            name: 0,
            kind: 0,
            flags: 0,
            addr: 0,
            offset: 0,
            size: 0,
            link: 0,
            info: 0,
            entsize: 0,
        },
        Shdr {
            name: n_text,
            kind: SHT_PROGBITS,
            flags: SHF_ALLOC | SHF_EXECINSTR,
            addr: TEXT_ADDR,
            offset: TEXT_OFF,
            size: TEXT_SIZE,
            link: 0,
            info: 0,
            entsize: 0,
        },
        Shdr {
            name: n_rodata,
            kind: SHT_PROGBITS,
            flags: SHF_ALLOC,
            addr: RODATA_ADDR,
            offset: RODATA_OFF,
            size: RODATA_SIZE,
            link: 0,
            info: 0,
            entsize: 0,
        },
        Shdr {
            name: n_symtab,
            kind: SHT_SYMTAB,
            flags: 0,
            addr: 0,
            offset: symtab_off,
            size: symtab.len() as u64,
            link: 4,
            info: 1,
            entsize: 24,
        },
        Shdr {
            name: n_strtab,
            kind: SHT_STRTAB,
            flags: 0,
            addr: 0,
            offset: strtab_off,
            size: strtab.len() as u64,
            link: 0,
            info: 0,
            entsize: 0,
        },
        Shdr {
            name: n_shstrtab,
            kind: SHT_STRTAB,
            flags: 0,
            addr: 0,
            offset: shstrtab_off,
            size: shstrtab.len() as u64,
            link: 0,
            info: 0,
            entsize: 0,
        },
    ];

    let mut out = Vec::new();
    // e_ident: ELFCLASS64, ELFDATA2LSB, EV_CURRENT
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
    pad_to(&mut out, 16);
    put_u16(&mut out, 2); // ET_EXEC
    put_u16(&mut out, 62); // EM_X86_64
    put_u32(&mut out, 1);
    put_u64(&mut out, TEXT_ADDR);
    put_u64(&mut out, 0x40);
    put_u64(&mut out, shoff);
    put_u32(&mut out, 0);
    put_u16(&mut out, 64);
    put_u16(&mut out, 56);
    put_u16(&mut out, 1);
    put_u16(&mut out, 64);
    put_u16(&mut out, shdrs.len() as u16);
    put_u16(&mut out, 5);

    // PT_LOAD, R+X
    put_u32(&mut out, 1);
    put_u32(&mut out, 5);
    put_u64(&mut out, 0);
    put_u64(&mut out, BASE);
    put_u64(&mut out, BASE);
    put_u64(&mut out, load_size);
    put_u64(&mut out, load_size);
    put_u64(&mut out, 0x1000);

    pad_to(&mut out, TEXT_OFF);
    out.extend_from_slice(&text);
    out.extend_from_slice(&rodata);
    out.extend_from_slice(&symtab);
    out.extend_from_slice(&strtab);
    out.extend_from_slice(&shstrtab);
    pad_to(&mut out, shoff);

    for sh in &shdrs {
        put_u32(&mut out, sh.name);
        put_u32(&mut out, sh.kind);
        put_u64(&mut out, sh.flags);
        put_u64(&mut out, sh.addr);
        put_u64(&mut out, sh.offset);
        put_u64(&mut out, sh.size);
        put_u32(&mut out, sh.link);
        put_u32(&mut out, sh.info);
        put_u64(&mut out, if sh.kind == 0 { 0 } else { 1 });
        put_u64(&mut out, sh.entsize);
    }
    out
}
