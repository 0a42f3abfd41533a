//! Package hierarchy built from the metadata provider.
//!
//! Packages and functions live in two arenas; the hierarchy is a trie keyed
//! by `/`-separated import-path segments whose nodes point into the package
//! arena. Intermediate segments that own no package (`github.com`,
//! `github.com/user`) are folded away by [`PackageRegistry::compact`], so
//! `github.com/user/repo` ends up as a single top-level entry.

pub mod path;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::function::Function;
use crate::core::id::{FunctionId, PackageId};
use crate::core::package::{Package, PackageKind};
use crate::core::address_space::AddrSpace;
use crate::intern::Interner;
use crate::metadata::{BuildMetadata, ModuleInput, PackageInput};
use crate::registry::path::{clean_package_path, PublicSuffix};

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: BTreeMap<String, usize>,
    value: Option<PackageId>,
}

#[derive(Debug, Clone)]
pub struct PackageRegistry {
    packages: Vec<Package>,
    functions: Vec<Function>,
    nodes: Vec<TrieNode>,
    /// Top-level entries after compaction; `""` holds generated code
    top: BTreeMap<String, PackageId>,
    compacted: bool,
}

impl Default for PackageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self {
            packages: Vec::new(),
            functions: Vec::new(),
            nodes: vec![TrieNode::default()],
            top: BTreeMap::new(),
            compacted: false,
        }
    }

    /// Build and compact the full hierarchy in one pass.
    pub fn from_metadata(
        meta: &BuildMetadata,
        suffixes: &dyn PublicSuffix,
        interner: &mut Interner,
    ) -> Self {
        info!(packages = meta.packages.len(), "Loading packages...");
        let mut reg = Self::new();
        for p in &meta.packages {
            reg.add_package(p, suffixes, interner);
        }
        reg.add_modules(&meta.modules, interner);
        reg.compact();
        info!(
            packages = reg.packages.len(),
            functions = reg.functions.len(),
            "Loaded packages done"
        );
        reg
    }

    /// Register a package and its functions. A package whose cleaned name
    /// is already present absorbs the new functions.
    pub fn add_package(
        &mut self,
        input: &PackageInput,
        suffixes: &dyn PublicSuffix,
        interner: &mut Interner,
    ) -> PackageId {
        let name = clean_package_path(&input.name, suffixes);
        let id = match self.get(&name) {
            Some(id) => {
                debug!(package = %name, "merging package with existing entry");
                let pkg = &mut self.packages[id.index()];
                if pkg.kind == PackageKind::Unknown {
                    pkg.kind = input.kind;
                }
                id
            }
            None => self.insert_package(interner.intern(&name), input.kind),
        };

        for f in &input.functions {
            let fid = FunctionId(self.functions.len() as u32);
            let file = interner.intern(&f.file);
            self.functions.push(Function {
                id: fid,
                name: interner.intern(&f.name),
                addr: f.address,
                code_size: f.code_size,
                pcln: f.pcln.clone(),
                kind: f.kind,
                receiver: f.receiver.as_deref().map(|r| interner.intern(r)),
                file: file.clone(),
                package: id,
                disasm: AddrSpace::new(),
            });
            self.packages[id.index()].add_function(file, fid);
        }
        id
    }

    /// Register build-info modules that no function landed in, so symbols
    /// of those modules still have an owner.
    pub fn add_modules(&mut self, modules: &[ModuleInput], interner: &mut Interner) {
        for m in modules {
            if m.path.is_empty() || self.get(&m.path).is_some() {
                continue;
            }
            self.insert_package(interner.intern(&m.path), m.kind);
        }
    }

    fn insert_package(&mut self, name: Arc<str>, kind: PackageKind) -> PackageId {
        let id = PackageId(self.packages.len() as u32);
        let node = self.node_for(&name);
        self.nodes[node].value = Some(id);
        self.packages.push(Package::new(id, name, kind));
        self.compacted = false;
        id
    }

    fn node_for(&mut self, path: &str) -> usize {
        let mut cur = 0;
        for seg in segments(path) {
            cur = match self.nodes[cur].children.get(seg) {
                Some(&next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[cur].children.insert(seg.to_string(), next);
                    next
                }
            };
        }
        cur
    }

    fn find_node(&self, path: &str) -> Option<usize> {
        let mut cur = 0;
        for seg in segments(path) {
            cur = *self.nodes[cur].children.get(seg)?;
        }
        Some(cur)
    }

    /// Exact lookup by import path.
    pub fn get(&self, path: &str) -> Option<PackageId> {
        self.nodes[self.find_node(path)?].value
    }

    /// Deepest registered package whose path is a segment prefix of `path`.
    pub fn longest_prefix(&self, path: &str) -> Option<PackageId> {
        let mut cur = 0;
        let mut best = None;
        for seg in segments(path) {
            match self.nodes[cur].children.get(seg) {
                Some(&next) => cur = next,
                None => break,
            }
            if let Some(v) = self.nodes[cur].value {
                best = Some(v);
            }
        }
        best
    }

    /// Exact match first, then the longest registered prefix.
    pub fn lookup(&self, path: &str) -> Option<PackageId> {
        if path.is_empty() {
            return None;
        }
        self.get(path).or_else(|| self.longest_prefix(path))
    }

    /// Fold package-less path segments into their children and record the
    /// resulting parent/child links on every package.
    pub fn compact(&mut self) {
        for p in &mut self.packages {
            p.subpackages.clear();
            p.parent = None;
        }

        let mut top = self.direct_children(0);
        if let Some(root) = self.nodes[0].value {
            top.insert(String::new(), root);
        }

        let mut pending: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.value.is_some())
            .map(|(i, _)| i)
            .collect();
        pending.retain(|&i| i != 0);

        for node in pending {
            let Some(parent) = self.nodes[node].value else {
                continue;
            };
            let children = self.direct_children(node);
            for &child in children.values() {
                self.packages[child.index()].parent = Some(parent);
            }
            self.packages[parent.index()].subpackages = children;
        }

        self.top = top;
        self.compacted = true;
        debug!(top = self.top.len(), "package tree compacted");
    }

    /// Nearest package-bearing descendants of `node`, keyed by the joined
    /// path segments in between.
    fn direct_children(&self, node: usize) -> BTreeMap<String, PackageId> {
        let mut out = BTreeMap::new();
        let mut stack: Vec<(String, usize)> = self.nodes[node]
            .children
            .iter()
            .map(|(k, &v)| (k.clone(), v))
            .collect();
        while let Some((key, n)) = stack.pop() {
            match self.nodes[n].value {
                Some(id) => {
                    out.insert(key, id);
                }
                None => {
                    for (seg, &c) in &self.nodes[n].children {
                        stack.push((format!("{}/{}", key, seg), c));
                    }
                }
            }
        }
        out
    }

    pub fn top_level(&self) -> &BTreeMap<String, PackageId> {
        &self.top
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.index()]
    }

    pub fn package_mut(&mut self, id: PackageId) -> &mut Package {
        &mut self.packages[id.index()]
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Split borrow for phases that read packages while writing functions.
    pub fn split_mut(&mut self) -> (&mut [Package], &mut [Function]) {
        (&mut self.packages, &mut self.functions)
    }

    /// Every package reachable from the top level, children before parents.
    pub fn leaf_first(&self) -> Vec<PackageId> {
        if !self.compacted {
            warn!("walking a package tree that was modified after compaction");
        }
        let mut order = Vec::with_capacity(self.packages.len());
        let mut stack: Vec<(PackageId, bool)> = self.top.values().rev().map(|&id| (id, false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in self.packages[id.index()].subpackages.values().rev() {
                stack.push((child, false));
            }
        }
        order
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
