//! Configuration for an analysis run.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SizeError};

/// Master configuration for the analysis pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Skip symbol attribution.
    pub skip_symbol: bool,
    /// Skip string-literal recovery.
    pub skip_disasm: bool,
    /// Symbol attribution configuration.
    pub symbols: SymbolConfig,
    /// Disassembly pipeline configuration.
    pub disasm: DisasmConfig,
    /// Whole-run deadline in seconds, applied by the caller-facing entry
    /// point only.
    pub timeout_seconds: Option<u64>,
}

impl AnalysisConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.disasm.channel_capacity == 0 {
            return Err(SizeError::Config(
                "disasm.channel_capacity must be positive".into(),
            ));
        }
        if self.disasm.max_workers == Some(0) {
            return Err(SizeError::Config("disasm.max_workers must be positive".into()));
        }
        if self.timeout_seconds == Some(0) {
            return Err(SizeError::Config("timeout_seconds must be positive".into()));
        }
        Ok(())
    }
}

/// Which compiler-internal symbol prefixes are stripped before a package
/// path is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixPolicy {
    /// `go.` / `type.`, toolchains up to 1.18
    Legacy,
    /// `go:` / `type:`, toolchains from 1.20
    Modern,
    /// Nothing stripped. Only selected through configuration.
    Unfiltered,
}

impl PrefixPolicy {
    pub fn prefixes(self) -> &'static [&'static str] {
        match self {
            PrefixPolicy::Legacy => &["go.", "type."],
            PrefixPolicy::Modern => &["go:", "type:"],
            PrefixPolicy::Unfiltered => &[],
        }
    }
}

/// Symbol attribution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolConfig {
    /// Overrides the policy derived from the compiler version.
    pub prefix_policy: Option<PrefixPolicy>,
    /// Symbol name prefixes of C-interop glue, never attributed.
    pub cgo_prefixes: Vec<String>,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            prefix_policy: None,
            cgo_prefixes: vec!["x_cgo".to_string(), "_cgo".to_string()],
        }
    }
}

/// Disassembly pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisasmConfig {
    /// Concurrent decoding tasks (default: available parallelism).
    pub max_workers: Option<usize>,
    /// Capacity of the producer to consumer channel (default: 32).
    pub channel_capacity: usize,
}

impl Default for DisasmConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            channel_capacity: 32,
        }
    }
}

impl DisasmConfig {
    pub fn worker_limit(&self) -> usize {
        self.max_workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}
