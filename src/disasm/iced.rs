use std::collections::BTreeSet;

use iced_x86::{Decoder, DecoderOptions, Mnemonic};
use tracing::trace;

use crate::disasm::pattern::{Candidate, LeaMovPattern, Pattern, PosInst};

/// x86-64 candidate extraction backed by iced-x86.
pub struct IcedExtractor {
    bits: u32,
    patterns: Vec<Box<dyn Pattern>>,
}

impl IcedExtractor {
    pub fn new() -> Self {
        Self {
            bits: 64,
            patterns: vec![Box::new(LeaMovPattern)],
        }
    }

    /// Linear sweep over `code`, which starts at `pc`. Undecodable bytes are
    /// stepped over one at a time so a single bad byte cannot hide the rest
    /// of the function. NOPs are dropped before matching.
    pub fn decode(&self, code: &[u8], pc: u64) -> Vec<PosInst> {
        let mut out = Vec::new();
        let mut decoder = Decoder::with_ip(self.bits, code, pc, DecoderOptions::NONE);
        let mut pos = 0usize;

        while pos < code.len() {
            if decoder.set_position(pos).is_err() {
                break;
            }
            decoder.set_ip(pc.wrapping_add(pos as u64));

            let inst = decoder.decode();
            let len = inst.len();
            if inst.is_invalid() || len == 0 {
                pos += 1;
                continue;
            }
            if inst.mnemonic() != Mnemonic::Nop {
                out.push(PosInst {
                    ip: inst.ip(),
                    inst,
                });
            }
            pos += len;
        }
        out
    }

    /// Every distinct candidate produced by sliding each pattern's window
    /// over the decoded stream.
    pub fn extract(&self, code: &[u8], pc: u64) -> Vec<Candidate> {
        let insts = self.decode(code, pc);
        let mut found = BTreeSet::new();
        for p in &self.patterns {
            for window in insts.windows(p.window()) {
                if let Some(c) = p.matches(window) {
                    trace!(pattern = p.name(), ip = window[0].ip, addr = c.addr, size = c.size, "candidate");
                    found.insert(c);
                }
            }
        }
        found.into_iter().collect()
    }

    pub fn name(&self) -> &str {
        "iced-x86"
    }
}

impl Default for IcedExtractor {
    fn default() -> Self {
        Self::new()
    }
}
