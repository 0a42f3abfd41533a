//! Analysis output consumed by renderers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::analysis::symbols::SymbolStats;
use crate::core::id::PackageId;
use crate::core::package::PackageKind;
use crate::core::section::Section;
use crate::disasm::DisasmStats;
use crate::registry::PackageRegistry;

/// Evidence sources that contributed to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    Pclntab,
    Symbol,
    Disasm,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionResult {
    pub name: String,
    pub size: u64,
    pub file_size: u64,
    pub known_size: u64,
    pub addr: u64,
    pub only_in_memory: bool,
    pub debug: bool,
}

impl From<&Section> for SectionResult {
    fn from(s: &Section) -> Self {
        Self {
            name: s.name.clone(),
            size: s.size,
            file_size: s.file_size,
            known_size: s.known_size,
            addr: s.addr,
            only_in_memory: s.only_in_memory,
            debug: s.debug,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionResult {
    pub name: Arc<str>,
    pub address: u64,
    pub size: u64,
    pub code_size: u64,
    pub pcln_size: u64,
    pub kind: crate::core::function::FunctionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: Arc<str>,
    pub size: u64,
    pub functions: Vec<FunctionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageResult {
    pub name: Arc<str>,
    pub kind: PackageKind,
    pub size: u64,
    pub subpackages: BTreeMap<String, PackageResult>,
    pub files: Vec<FileResult>,
    pub symbols: Vec<crate::core::symbol::Symbol>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub name: String,
    /// File size in bytes
    pub size: u64,
    pub analyzers: Vec<AnalyzerKind>,
    pub sections: Vec<SectionResult>,
    pub packages: BTreeMap<String, PackageResult>,
    pub symbol_stats: Option<SymbolStats>,
    pub disasm_stats: Option<DisasmStats>,
}

impl AnalysisResult {
    pub fn known_size(&self) -> u64 {
        self.sections.iter().map(|s| s.known_size).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Find a package anywhere in the tree by its full name.
    pub fn find_package(&self, name: &str) -> Option<&PackageResult> {
        let mut stack: Vec<&PackageResult> = self.packages.values().collect();
        while let Some(p) = stack.pop() {
            if &*p.name == name {
                return Some(p);
            }
            stack.extend(p.subpackages.values());
        }
        None
    }

    /// Top-level display nodes: sections, then packages.
    pub fn roots(&self) -> Vec<Node<'_>> {
        self.sections
            .iter()
            .map(Node::Section)
            .chain(self.packages.values().map(Node::Package))
            .collect()
    }
}

pub(crate) fn package_tree(registry: &PackageRegistry) -> BTreeMap<String, PackageResult> {
    registry
        .top_level()
        .iter()
        .map(|(k, &id)| (k.clone(), package_result(registry, id)))
        .collect()
}

fn package_result(registry: &PackageRegistry, id: PackageId) -> PackageResult {
    let pkg = registry.package(id);
    let files = pkg
        .files
        .iter()
        .map(|file| {
            let functions: Vec<FunctionResult> = file
                .functions
                .iter()
                .map(|&fid| {
                    let f = registry.function(fid);
                    FunctionResult {
                        name: f.name.clone(),
                        address: f.addr,
                        size: f.size(),
                        code_size: f.code_size,
                        pcln_size: f.pcln.size(),
                        kind: f.kind,
                        receiver: f.receiver.clone(),
                    }
                })
                .collect();
            FileResult {
                path: file.path.clone(),
                size: functions.iter().map(|f| f.size).sum(),
                functions,
            }
        })
        .collect();

    PackageResult {
        name: pkg.name.clone(),
        kind: pkg.kind,
        size: pkg.size,
        subpackages: pkg
            .subpackages
            .iter()
            .map(|(k, &c)| (k.clone(), package_result(registry, c)))
            .collect(),
        files,
        symbols: pkg.symbols.clone(),
    }
}

/// Anything a renderer can draw as a tree node.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Package(&'a PackageResult),
    Section(&'a SectionResult),
    File(&'a FileResult),
    Function(&'a FunctionResult),
}

impl<'a> Node<'a> {
    pub fn name(&self) -> &'a str {
        match *self {
            Node::Package(p) => &p.name,
            Node::Section(s) => &s.name,
            Node::File(f) => &f.path,
            Node::Function(f) => &f.name,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Node::Package(p) => p.size,
            Node::Section(s) => s.known_size,
            Node::File(f) => f.size,
            Node::Function(f) => f.size,
        }
    }

    pub fn children(&self) -> Vec<Node<'a>> {
        match *self {
            Node::Package(p) => p
                .subpackages
                .values()
                .map(Node::Package)
                .chain(p.files.iter().map(Node::File))
                .collect(),
            Node::File(f) => f.functions.iter().map(Node::Function).collect(),
            Node::Section(_) | Node::Function(_) => Vec::new(),
        }
    }
}
