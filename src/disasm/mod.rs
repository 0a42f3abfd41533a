//! String-literal recovery from machine code.
//!
//! - `pattern`: instruction-window matchers
//! - `iced`: x86-64 linear sweep backed by iced-x86
//! - `registry`: backend selection by architecture
//! - `extract`: per-function extraction and validation
//! - `pipeline`: bounded concurrent scan feeding a single consumer

pub mod extract;
pub mod iced;
pub mod pattern;
pub mod pipeline;
pub mod registry;

pub use extract::Extractor;
pub use pipeline::{Accepted, DisasmStats, Job};
