//! Packages and their source files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::address_space::AddrSpace;
use crate::core::coverage::AddrCoverage;
use crate::core::id::{FunctionId, PackageId};
use crate::core::symbol::Symbol;

/// Package origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// The main module
    Main,
    /// Standard library
    Std,
    /// Third-party dependency
    Vendor,
    /// Compiler-generated, no import path
    Generated,
    #[default]
    Unknown,
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageKind::Main => "main",
            PackageKind::Std => "std",
            PackageKind::Vendor => "vendor",
            PackageKind::Generated => "generated",
            PackageKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A source file and the functions compiled from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub path: Arc<str>,
    pub functions: Vec<FunctionId>,
}

#[derive(Debug, Clone)]
pub struct Package {
    pub id: PackageId,
    pub name: Arc<str>,
    pub kind: PackageKind,
    /// Children keyed by the path segment(s) between this package and them
    pub subpackages: BTreeMap<String, PackageId>,
    pub files: Vec<File>,
    pub symbols: Vec<Symbol>,
    /// Intervals claimed by this package's symbols
    pub symbol_space: AddrSpace,
    /// Recursive size; written once by the accountant
    pub size: u64,
    /// Own merged coverage; written once, leaf first
    pub coverage: Option<AddrCoverage>,
    /// Display-only back link
    pub parent: Option<PackageId>,
}

impl Package {
    pub fn new(id: PackageId, name: Arc<str>, kind: PackageKind) -> Self {
        Self {
            id,
            name,
            kind,
            subpackages: BTreeMap::new(),
            files: Vec::new(),
            symbols: Vec::new(),
            symbol_space: AddrSpace::new(),
            size: 0,
            coverage: None,
            parent: None,
        }
    }

    /// Attach a function to the file at `path`, creating the file on first
    /// use.
    pub fn add_function(&mut self, path: Arc<str>, function: FunctionId) {
        match self.files.iter_mut().find(|f| f.path == path) {
            Some(file) => file.functions.push(function),
            None => self.files.push(File {
                path,
                functions: vec![function],
            }),
        }
    }

    /// Fold another package's files into this one, keeping paths unique.
    pub fn merge_files(&mut self, files: Vec<File>) {
        for file in files {
            for function in file.functions {
                self.add_function(file.path.clone(), function);
            }
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.files.iter().flat_map(|f| f.functions.iter().copied())
    }

    pub fn function_count(&self) -> usize {
        self.files.iter().map(|f| f.functions.len()).sum()
    }

    /// Whether any function or symbol landed here.
    pub fn is_loaded(&self) -> bool {
        !self.files.is_empty() || !self.symbols.is_empty()
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Package({}, {}, {} bytes)", self.name, self.kind, self.size)
    }
}
