//! Attribute every byte of a compiled binary to the package, file and
//! function that produced it.
//!
//! Evidence comes from three sources of decreasing authority: the compiler
//! metadata table (supplied by an external provider as [`metadata::BuildMetadata`]),
//! the symbol table, and string literals recovered by disassembly. The
//! [`core::coverage`] engine reconciles them without double counting.

/// Core data model: intervals, coverage, packages, sections
pub mod core;

/// Per-format object file adapters
pub mod formats;

/// String-literal recovery
pub mod disasm;

/// Analysis phases and orchestration
pub mod analysis;

pub mod config;
pub mod error;
pub mod intern;
pub mod logging;
pub mod metadata;
pub mod registry;
pub mod result;
pub mod timeout;

pub use analysis::Analyzer;
pub use config::AnalysisConfig;
pub use error::{Result, SizeError};
pub use metadata::BuildMetadata;
pub use result::AnalysisResult;
