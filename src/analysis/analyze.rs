//! End-to-end orchestration of one analysis run.
//!
//! Phases run strictly in order: sections, packages, compiler-table text,
//! symbols (which freezes symbol coverage), disassembly, coverage merge,
//! size accounting. Only disassembly is concurrent.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn, Instrument};

use crate::analysis::accountant;
use crate::analysis::symbols::SymbolAttributor;
use crate::config::AnalysisConfig;
use crate::core::known_addr::KnownAddr;
use crate::core::section_store::SectionStore;
use crate::disasm::{pipeline, Extractor, Job};
use crate::error::{Result, SizeError};
use crate::formats::{self, FormatAdapter};
use crate::intern::Interner;
use crate::metadata::BuildMetadata;
use crate::registry::path::{PublicSuffix, StaticSuffixList};
use crate::registry::PackageRegistry;
use crate::result::{package_tree, AnalysisResult, AnalyzerKind, SectionResult};
use crate::timeout::{with_timeout, TimeoutConfig};

pub struct Analyzer {
    config: AnalysisConfig,
    suffixes: Box<dyn PublicSuffix>,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            suffixes: Box::new(StaticSuffixList),
        }
    }

    /// Replace the bundled public-suffix list.
    pub fn with_suffixes(mut self, suffixes: impl PublicSuffix + 'static) -> Self {
        self.suffixes = Box::new(suffixes);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Open `path` and analyze it.
    pub async fn analyze_path<P: AsRef<Path>>(
        &self,
        path: P,
        meta: &BuildMetadata,
    ) -> Result<AnalysisResult> {
        let name = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let adapter = formats::open_path(path)?;
        self.analyze_with_deadline(&name, adapter, meta).await
    }

    /// [`analyze`](Self::analyze) bounded by `timeout_seconds`, when set.
    pub async fn analyze_with_deadline(
        &self,
        name: &str,
        adapter: Arc<dyn FormatAdapter>,
        meta: &BuildMetadata,
    ) -> Result<AnalysisResult> {
        match self.config.timeout_seconds {
            Some(secs) => {
                with_timeout(
                    TimeoutConfig::new(secs, format!("analyze {}", name)),
                    self.analyze(name, adapter, meta),
                )
                .await
            }
            None => self.analyze(name, adapter, meta).await,
        }
    }

    /// Run on a private multi-threaded runtime.
    pub fn analyze_blocking(
        &self,
        name: &str,
        adapter: Arc<dyn FormatAdapter>,
        meta: &BuildMetadata,
    ) -> Result<AnalysisResult> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.analyze_with_deadline(name, adapter, meta))
    }

    pub async fn analyze(
        &self,
        name: &str,
        adapter: Arc<dyn FormatAdapter>,
        meta: &BuildMetadata,
    ) -> Result<AnalysisResult> {
        let span = crate::span_trace!("analyze", name = %name, format = %adapter.format());
        self.run(name, adapter, meta)
            .instrument(span)
            .await
            .map_err(|e| crate::log_error!(e, "analysis aborted"))
    }

    async fn run(
        &self,
        name: &str,
        adapter: Arc<dyn FormatAdapter>,
        meta: &BuildMetadata,
    ) -> Result<AnalysisResult> {
        let file_size = adapter.file_size();
        let mut analyzers = vec![AnalyzerKind::Pclntab];

        info!("Loading sections...");
        let mut sections = SectionStore::from_sections(adapter.sections().iter().cloned())?;
        sections.assert_size(file_size)?;
        info!(sections = sections.len(), "Loaded sections");

        let mut interner = Interner::new();
        let mut registry = PackageRegistry::from_metadata(meta, self.suffixes.as_ref(), &mut interner);

        let mut known = KnownAddr::new();
        let mut dropped = 0usize;
        for f in registry.functions() {
            let package = registry.package(f.package).name.clone();
            if !known.insert_text_from_pclntab(&sections, f, package) {
                dropped += 1;
            }
        }
        debug!(text = known.text.len(), dropped, "compiler table text recorded");

        let symbol_stats = if self.config.skip_symbol {
            known.build_symbol_coverage()?;
            None
        } else {
            let policy = self
                .config
                .symbols
                .prefix_policy
                .unwrap_or_else(|| meta.version_flag().prefix_policy());
            let attributor = SymbolAttributor::new(policy, self.suffixes.as_ref(), &self.config.symbols);
            let stats = attributor.run(
                adapter.as_ref(),
                &sections,
                &mut registry,
                &mut known,
                &mut interner,
            )?;
            if stats.symbol_table {
                analyzers.push(AnalyzerKind::Symbol);
            }
            Some(stats)
        };

        let disasm_stats = if self.config.skip_disasm {
            None
        } else {
            let stats = self
                .disassemble(&adapter, &sections, &mut registry, &known)
                .await?;
            if stats.is_some() {
                analyzers.push(AnalyzerKind::Disasm);
            }
            stats
        };

        accountant::build_package_coverages(&mut registry)?;
        let coverage = accountant::build_global_coverage(&known, &registry)?;
        let pcln_total = registry
            .functions()
            .iter()
            .map(|f| f.pcln.size())
            .fold(0, u64::saturating_add);
        accountant::assign_section_sizes(
            &mut sections,
            &coverage,
            pcln_total,
            adapter.metadata_table_sections(),
            meta.pclntab_address,
        )?;
        accountant::assign_package_sizes(&mut registry);

        let result = AnalysisResult {
            name: name.to_string(),
            size: file_size,
            analyzers,
            sections: sections.sections().iter().map(SectionResult::from).collect(),
            packages: package_tree(&registry),
            symbol_stats,
            disasm_stats,
        };
        info!(
            size = result.size,
            known = result.known_size(),
            "analysis finished"
        );
        Ok(result)
    }

    /// `Ok(None)` when the architecture has no disassembler.
    async fn disassemble(
        &self,
        adapter: &Arc<dyn FormatAdapter>,
        sections: &SectionStore,
        registry: &mut PackageRegistry,
        known: &KnownAddr,
    ) -> Result<Option<pipeline::DisasmStats>> {
        let string_table = match adapter.go_string_table() {
            Ok(t) => t,
            Err(e) if e.is_recoverable() => None,
            Err(e) => return Err(e),
        };
        if string_table.is_none() {
            info!("no go:string.* symbol found, false-positive rates may rise");
        }

        let extractor = match Extractor::new(adapter.clone(), sections, string_table) {
            Ok(e) => Arc::new(e),
            Err(e @ SizeError::ArchNotSupported(_)) => {
                warn!(error = %e, "skipping disassembly");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let jobs: Vec<Job> = registry
            .functions()
            .iter()
            .map(|f| Job {
                function: f.id,
                start: f.addr,
                end: f.end(),
            })
            .collect();

        let stats = pipeline::run(extractor, jobs, &self.config.disasm, |accepted| {
            let function = registry.function_mut(accepted.function);
            known.insert_disasm(sections, accepted.addr, accepted.size, function)
        })
        .await?;
        Ok(Some(stats))
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
