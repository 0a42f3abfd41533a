use crate::disasm::iced::IcedExtractor;
use crate::disasm::pattern::Candidate;
use crate::error::{Result, SizeError};
use crate::formats::Arch;

/// Candidate extraction backend for one instruction set.
pub enum Backend {
    Amd64(IcedExtractor),
}

impl Backend {
    pub fn extract(&self, code: &[u8], pc: u64) -> Vec<Candidate> {
        match self {
            Backend::Amd64(e) => e.extract(code, pc),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Backend::Amd64(e) => e.name(),
        }
    }
}

/// Select a backend for the given architecture.
pub fn for_arch(arch: Arch) -> Result<Backend> {
    match arch {
        Arch::Amd64 => Ok(Backend::Amd64(IcedExtractor::new())),
        Arch::Unknown => Err(SizeError::ArchNotSupported("unknown".into())),
        other => Err(SizeError::ArchNotSupported(other.id().into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amd64_supported() {
        let b = for_arch(Arch::Amd64).unwrap();
        assert_eq!(b.name(), "iced-x86");
    }

    #[test]
    fn test_other_arches_recoverable() {
        for arch in [Arch::Arm64, Arch::I386, Arch::Unknown] {
            let err = for_arch(arch).err().unwrap();
            assert!(err.is_recoverable());
        }
    }
}
