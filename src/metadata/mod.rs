//! Input contract with the binary metadata provider.
//!
//! Reading the compiler tables and build info out of a binary is done by an
//! external collaborator. It hands the engine a [`BuildMetadata`] value,
//! typically as JSON.

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::PrefixPolicy;
use crate::core::function::FunctionKind;
use crate::core::package::PackageKind;
use crate::error::{Result, SizeError};

pub use crate::core::function::PclnSize;

/// Everything the engine needs to know about the build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildMetadata {
    pub packages: Vec<PackageInput>,
    /// Dependency modules from the embedded build info
    pub modules: Vec<ModuleInput>,
    /// e.g. `go1.21.4`
    pub compiler_version: Option<String>,
    /// Address of the metadata table, if the provider located it
    pub pclntab_address: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageInput {
    pub name: String,
    pub kind: PackageKind,
    pub functions: Vec<FunctionInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionInput {
    pub name: String,
    pub address: u64,
    pub code_size: u64,
    /// Source file path
    pub file: String,
    pub kind: FunctionKind,
    pub receiver: Option<String>,
    pub pcln: PclnSize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleInput {
    pub path: String,
    pub kind: PackageKind,
}

impl BuildMetadata {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let meta: Self = serde_json::from_str(s)
            .map_err(|e| SizeError::InvalidMetadata(e.to_string()))?;
        meta.validate()?;
        Ok(meta)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        for p in &self.packages {
            for f in &p.functions {
                if f.name.is_empty() {
                    return Err(SizeError::InvalidMetadata(format!(
                        "function at {:#x} in package {:?} has no name",
                        f.address, p.name
                    )));
                }
                if f.address.checked_add(f.code_size).is_none() {
                    return Err(SizeError::InvalidMetadata(format!(
                        "function {} overflows the address space",
                        f.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn version_flag(&self) -> VersionFlag {
        VersionFlag::from_version(self.compiler_version.as_deref())
    }

    /// Total metadata-table bytes over every function.
    pub fn pcln_total(&self) -> u64 {
        self.packages
            .iter()
            .flat_map(|p| p.functions.iter())
            .map(|f| f.pcln.size())
            .fold(0, u64::saturating_add)
    }
}

/// Toolchain era, as far as symbol naming is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VersionFlag {
    /// go1.18.10 or older
    pub leq118: bool,
    /// go1.20rc1 or newer
    pub meq120: bool,
}

impl VersionFlag {
    /// An absent version is treated as a modern toolchain.
    pub fn from_version(version: Option<&str>) -> Self {
        match version {
            None => VersionFlag {
                leq118: false,
                meq120: true,
            },
            Some(v) => VersionFlag {
                leq118: compare_go_version(v, "go1.18.10") != Ordering::Greater,
                meq120: compare_go_version(v, "go1.20rc1") != Ordering::Less,
            },
        }
    }

    /// go1.19 sits in neither era but still emits `go.`/`type.` names, so it
    /// shares the legacy filter.
    pub fn prefix_policy(self) -> PrefixPolicy {
        if self.meq120 {
            PrefixPolicy::Modern
        } else {
            PrefixPolicy::Legacy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Beta,
    Rc,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct GoVersion {
    major: u32,
    minor: u32,
    patch: u32,
    stage: Stage,
    pre: u32,
}

fn leading_number(s: &str) -> Option<(u32, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let n = s[..end].parse().ok()?;
    Some((n, &s[end..]))
}

fn parse_go_version(v: &str) -> Option<GoVersion> {
    // build info may append experiment flags: "go1.21.0 X:loopvar"
    let v = v.split_whitespace().next()?;
    let rest = v.strip_prefix("go")?;

    let (major, rest) = leading_number(rest)?;
    let (minor, mut rest) = match rest.strip_prefix('.') {
        Some(r) => leading_number(r)?,
        None => (0, rest),
    };
    let mut patch = 0;
    if let Some(r) = rest.strip_prefix('.') {
        let (p, r) = leading_number(r)?;
        patch = p;
        rest = r;
    }

    let (stage, pre) = if rest.is_empty() {
        (Stage::Release, 0)
    } else if let Some(r) = rest.strip_prefix("beta") {
        (Stage::Beta, leading_number(r).map(|(n, _)| n).unwrap_or(0))
    } else if let Some(r) = rest.strip_prefix("rc") {
        (Stage::Rc, leading_number(r).map(|(n, _)| n).unwrap_or(0))
    } else {
        return None;
    };

    Some(GoVersion {
        major,
        minor,
        patch,
        stage,
        pre,
    })
}

/// Order two toolchain version strings.
///
/// Pre-releases sort before the release they lead to:
/// `go1.20beta1 < go1.20rc1 < go1.20 < go1.20.1`. Strings that do not
/// parse (development builds) sort after every release.
pub fn compare_go_version(a: &str, b: &str) -> Ordering {
    match (parse_go_version(a), parse_go_version(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
