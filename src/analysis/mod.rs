//! Analysis phases and the orchestrator that sequences them.

pub mod accountant;
pub mod analyze;
pub mod symbols;

pub use analyze::Analyzer;
pub use symbols::{SymbolAttributor, SymbolStats};
