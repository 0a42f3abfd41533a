//! Error types for the size attribution engine.
//!
//! This module provides structured error handling using thiserror. Most
//! variants are fatal for an analysis run; the orchestrator downgrades the
//! recoverable ones (missing symbol table, unsupported disassembly
//! architecture) to warnings.

use thiserror::Error;

use crate::core::address::AddrKind;
use crate::core::coverage::CoverageConflict;

/// Main error type for size attribution operations.
#[derive(Debug, Error)]
pub enum SizeError {
    /// Binary format parsing errors
    #[error("Invalid binary format: {0}")]
    InvalidFormat(String),

    /// The object file kind is recognized but not supported
    #[error("Unsupported binary format: {0}")]
    UnsupportedFormat(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors surfaced by the object parser
    #[error("Object parse error: {0}")]
    Object(#[from] object::read::Error),

    /// The binary carries no symbol table
    #[error("No symbol table found")]
    NoSymbolTable,

    /// The binary has no text section to disassemble
    #[error("Text section not found")]
    TextSectionNotFound,

    /// Disassembly is not available for this architecture
    #[error("Unsupported architecture for disassembly: {0}")]
    ArchNotSupported(String),

    /// No file-backed bytes exist for the requested range
    #[error("Address {addr:#x} (size {size:#x}) is not backed by file bytes")]
    AddrNotFound { addr: u64, size: u64 },

    /// On-disk sections add up to more than the file itself
    #[error("Section size {sections} exceeds file size {file}")]
    SectionSizeExceeded { sections: u64, file: u64 },

    /// Two sections share a name
    #[error("Section {0} already exists")]
    DuplicateSection(String),

    /// Two authoritative sources disagree on the kind of a byte range
    #[error("Coverage conflict: {0}")]
    CoverageConflict(Box<CoverageConflict>),

    /// Disassembly produced a range that symbol coverage claims with another kind
    #[error("Disassembly range {addr:#x} (size {size:#x}) conflicts with symbol coverage of kind {found}")]
    DisasmKindMismatch { addr: u64, size: u64, found: AddrKind },

    /// None of the candidate sections holds the compiler metadata table
    #[error("Metadata table section not found (candidates: {0})")]
    MetadataSectionNotFound(String),

    /// The metadata provider handed us something unusable
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Analysis timeout
    #[error("Analysis timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoverageConflict> for SizeError {
    fn from(conflict: CoverageConflict) -> Self {
        SizeError::CoverageConflict(Box::new(conflict))
    }
}

impl From<serde_json::Error> for SizeError {
    fn from(err: serde_json::Error) -> Self {
        SizeError::Config(err.to_string())
    }
}

impl SizeError {
    /// Whether the orchestrator may continue with reduced accuracy.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SizeError::NoSymbolTable | SizeError::ArchNotSupported(_)
        )
    }
}

/// Result type alias for size attribution operations
pub type Result<T> = std::result::Result<T, SizeError>;
