//! Instruction-window patterns that reveal string literals.
//!
//! A string literal passed by value is loaded as a `(pointer, length)`
//! pair, which the x86-64 backend of the compiler emits as
//!
//! ```text
//! LEAQ 0x1e5fd(IP), AX
//! MOVL $0x1e, BX
//! ```
//!
//! The first instruction yields the literal's address, the second its
//! length.

use iced_x86::{Instruction, Mnemonic, OpKind, Register};

/// A decoded instruction and the address it was decoded at.
#[derive(Debug, Clone, Copy)]
pub struct PosInst {
    pub ip: u64,
    pub inst: Instruction,
}

/// A possible string literal: `size` bytes at `addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate {
    pub addr: u64,
    pub size: u64,
}

/// A fixed-size instruction window matcher.
pub trait Pattern: Send + Sync {
    fn name(&self) -> &'static str;

    fn window(&self) -> usize;

    fn matches(&self, window: &[PosInst]) -> Option<Candidate>;
}

/// `LEA reg, [rip + disp]` followed by `MOV reg, imm` with `imm > 0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeaMovPattern;

impl Pattern for LeaMovPattern {
    fn name(&self) -> &'static str {
        "lea-mov"
    }

    fn window(&self) -> usize {
        2
    }

    fn matches(&self, window: &[PosInst]) -> Option<Candidate> {
        let [first, second] = window else {
            return None;
        };
        let addr = rip_relative_lea(&first.inst)?;
        let size = positive_mov_imm(&second.inst)?;
        Some(Candidate { addr, size })
    }
}

/// Absolute target of a `LEA reg, [rip + disp]`.
fn rip_relative_lea(inst: &Instruction) -> Option<u64> {
    if inst.mnemonic() != Mnemonic::Lea || inst.op_count() != 2 {
        return None;
    }
    if inst.op1_kind() != OpKind::Memory || inst.memory_base() != Register::RIP {
        return None;
    }
    // for RIP-relative operands iced resolves the displacement against the
    // next instruction pointer
    Some(inst.memory_displacement64())
}

/// Immediate of a `MOV reg, imm`, if strictly positive. A non-positive
/// immediate is an argument, not a length.
fn positive_mov_imm(inst: &Instruction) -> Option<u64> {
    if inst.mnemonic() != Mnemonic::Mov || inst.op_count() != 2 {
        return None;
    }
    if inst.op0_kind() != OpKind::Register {
        return None;
    }
    let value: i64 = match inst.op1_kind() {
        OpKind::Immediate8 => i64::from(inst.immediate8() as i8),
        OpKind::Immediate16 => i64::from(inst.immediate16() as i16),
        OpKind::Immediate32 => i64::from(inst.immediate32() as i32),
        OpKind::Immediate64 => inst.immediate64() as i64,
        OpKind::Immediate8to32 => i64::from(inst.immediate8to32()),
        OpKind::Immediate8to64 => inst.immediate8to64(),
        OpKind::Immediate32to64 => inst.immediate32to64(),
        _ => return None,
    };
    (value > 0).then_some(value as u64)
}
