//! Domain Graph Loader
//!
//! Discovers configuration modules under the spec directory, parses them
//! (in parallel, with rayon), admits them into the graph one domain at a
//! time and validates every reference as soon as its domain is complete.
//! The loader only reads from disk.
//!
//! Reference resolution follows the domain order: a module may point at
//! modules and entities of its own domain or of an earlier one. The kernel
//! is the exception, since it is the manifest for everything after it.

use crate::config::{
    ProjectConfig, ValidationPolicy, MIRROR_DIR, MODULE_EXTENSIONS, STANDARD_NAME,
    UNIFIED_BASE_NAME,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::domain::Domain;
use crate::error::{RgdError, RgdResult};
use crate::graph::{DomainGraph, Module, Reference};
use crate::jsonc;
use crate::model::{ACTUATION_TOPOLOGY, PROFILES_MAP};
use crate::profile::ProfileSet;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A graph that passed validation, with the warnings found on the way
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub graph: DomainGraph,
    pub warnings: Vec<Diagnostic>,
}

/// Loads and validates the modules of one project
#[derive(Debug, Clone)]
pub struct DomainGraphLoader {
    root: PathBuf,
    spec_dir: PathBuf,
    output_base: String,
    policy: ValidationPolicy,
}

impl DomainGraphLoader {
    /// Loader for `root` with default policy. Modules are read from
    /// `root/spec` when it exists, otherwise from `root` itself.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let spec_dir = resolve_spec_dir(&root, &crate::config::spec_dir_name());
        Self {
            root,
            spec_dir,
            output_base: UNIFIED_BASE_NAME.to_string(),
            policy: ValidationPolicy::default(),
        }
    }

    /// Loader configured from a project's `rgd.yaml`.
    pub fn from_config(root: impl Into<PathBuf>, config: &ProjectConfig) -> Self {
        let root = root.into();
        let spec_dir = resolve_spec_dir(&root, &config.spec_dir);
        Self {
            root,
            spec_dir,
            output_base: config.output_base.clone(),
            policy: config.validation,
        }
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn spec_dir(&self) -> &Path {
        &self.spec_dir
    }

    /// Module files under the spec directory, sorted by path.
    pub fn discover(&self) -> RgdResult<Vec<PathBuf>> {
        if !self.spec_dir.is_dir() {
            return Err(RgdError::NotFound(format!(
                "spec directory {}",
                self.spec_dir.display()
            )));
        }

        // The mirror lands under the root, so it only collides with
        // discovery when the modules live there too.
        let mirror = (self.spec_dir == self.root).then(|| self.root.join(MIRROR_DIR));

        let mut files: Vec<PathBuf> = WalkDir::new(&self.spec_dir)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_name().to_string_lossy().starts_with('.')
                        || mirror.as_deref() == Some(e.path()))
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.is_module_file(p))
            .collect();
        files.sort();

        log::debug!(
            "discovered {} module file(s) under {:?}",
            files.len(),
            self.spec_dir
        );
        Ok(files)
    }

    fn is_module_file(&self, path: &Path) -> bool {
        let ext_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| MODULE_EXTENSIONS.contains(&e))
            .unwrap_or(false);
        if !ext_ok {
            return false;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        !(stem.contains("unified_spec") || stem == self.output_base || is_domain_bundle(stem))
    }

    /// Discover, parse and validate. Errors are collected across the whole
    /// tree and returned together as [`RgdError::Validation`].
    pub fn load(&self) -> RgdResult<LoadedGraph> {
        let files = self.discover()?;
        let mut diags = Diagnostics::new();

        let parsed: Vec<Result<Option<Module>, Diagnostic>> =
            files.par_iter().map(|path| self.parse_module(path)).collect();

        let mut modules: Vec<Module> = Vec::with_capacity(parsed.len());
        let mut seen: HashMap<String, String> = HashMap::new();
        for result in parsed {
            match result {
                Ok(None) => {}
                Ok(Some(module)) => {
                    if let Some(first) = seen.get(&module.id) {
                        diags.push(
                            Diagnostic::error(
                                DiagnosticKind::DuplicateIdentifier,
                                module.rel_path.clone(),
                                format!("module identifier '{}' already used by {}", module.id, first),
                            )
                            .with_reference("id", module.id.clone()),
                        );
                        continue;
                    }
                    seen.insert(module.id.clone(), module.rel_path.clone());
                    modules.push(module);
                }
                Err(diag) => diags.push(diag),
            }
        }

        let mut graph = DomainGraph::new(self.root.clone(), self.spec_dir.clone(), modules);
        self.validate(&mut graph, &mut diags);

        if diags.has_errors() {
            log::debug!("validation failed with {} error(s)", diags.error_count());
            return Err(RgdError::Validation(diags));
        }

        log::info!(
            "loaded {} module(s) across {} domain(s)",
            graph.module_count(),
            graph.domains().count()
        );
        Ok(LoadedGraph {
            graph,
            warnings: diags.into_warnings(),
        })
    }

    /// Parse one file. Compiled aggregates written under a custom name are
    /// recognised by their content and yield `None`.
    fn parse_module(&self, path: &Path) -> Result<Option<Module>, Diagnostic> {
        let spec_rel = path.strip_prefix(&self.spec_dir).unwrap_or(path);
        let spec_path = posix(spec_rel);
        let rel_path = path
            .strip_prefix(&self.root)
            .map(posix)
            .unwrap_or_else(|_| spec_path.clone());

        let raw = fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(DiagnosticKind::Parse, rel_path.clone(), e.to_string())
        })?;
        let content = jsonc::parse(&rel_path, &raw)
            .map_err(|e| Diagnostic::error(DiagnosticKind::Parse, rel_path.clone(), e.to_string()))?;

        if is_generated_aggregate(&content) {
            log::debug!("skipping generated aggregate {}", rel_path);
            return Ok(None);
        }

        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Some(Module {
            id,
            domain: Domain::detect(spec_rel),
            path: path.to_path_buf(),
            rel_path,
            spec_path,
            raw: raw.trim().to_string(),
            content,
        }))
    }

    /// Admit modules domain by domain and check references, kernel entries
    /// and reachability.
    fn validate(&self, graph: &mut DomainGraph, diags: &mut Diagnostics) {
        // Where every symbol is first declared, to tell forward references
        // apart from dangling ones.
        let mut declared: HashMap<String, Domain> = HashMap::new();
        for module in graph.ordered() {
            for symbol in symbols_of(module) {
                declared.entry(symbol).or_insert_with(|| module.domain.clone());
            }
        }

        let mut loaded: HashMap<String, Domain> = HashMap::new();
        let domains: Vec<Domain> = graph.domains().cloned().collect();

        for domain in &domains {
            let indices = graph.indices_in(domain);
            for &idx in &indices {
                graph.record_loaded(idx);
                for symbol in symbols_of(graph.module_at(idx)) {
                    loaded.entry(symbol).or_insert_with(|| domain.clone());
                }
            }
            log::debug!("domain {} admitted ({} module(s))", domain, indices.len());

            for &idx in &indices {
                let module = graph.module_at(idx);
                for reference in module.references() {
                    self.check_reference(module, &reference, &loaded, &declared, diags);
                }
            }
        }

        self.check_kernel(graph, diags);
        check_profiles(graph, diags);
    }

    fn check_reference(
        &self,
        module: &Module,
        reference: &Reference,
        loaded: &HashMap<String, Domain>,
        declared: &HashMap<String, Domain>,
        diags: &mut Diagnostics,
    ) {
        let target = normalise_target(&reference.target);
        if target.is_empty() || loaded.contains_key(target) {
            return;
        }

        if module.is_kernel() {
            if declared.contains_key(target) {
                return;
            }
            if reference.is_path() {
                diags.push(
                    Diagnostic::error(
                        DiagnosticKind::MissingKernelEntry,
                        module.id.clone(),
                        "kernel points at a module that does not exist",
                    )
                    .with_severity(self.policy.dangling_kernel_entry)
                    .with_reference(reference.field.clone(), reference.target.clone()),
                );
                return;
            }
        }

        let diag = match declared.get(target) {
            Some(later) => Diagnostic::error(
                DiagnosticKind::ForwardReference,
                module.id.clone(),
                format!(
                    "target is declared in later domain {} (module is in {})",
                    later, module.domain
                ),
            ),
            None => Diagnostic::error(
                DiagnosticKind::DanglingReference,
                module.id.clone(),
                "target does not resolve to any module or entity",
            ),
        };
        diags.push(diag.with_reference(reference.field.clone(), reference.target.clone()));
    }

    fn check_kernel(&self, graph: &DomainGraph, diags: &mut Diagnostics) {
        let Some(kernel) = graph.kernel() else {
            diags.push(Diagnostic::warning(
                DiagnosticKind::MissingKernel,
                self.spec_dir.display().to_string(),
                "no kernel module found; reachability not checked",
            ));
            return;
        };

        let entries = kernel.kernel_entries();
        for entry in &entries {
            let on_disk = self.root.join(entry).is_file() || self.spec_dir.join(entry).is_file();
            if !on_disk {
                diags.push(
                    Diagnostic::error(
                        DiagnosticKind::MissingKernelEntry,
                        kernel.id.clone(),
                        "listed module is not on disk",
                    )
                    .with_severity(self.policy.dangling_kernel_entry)
                    .with_reference(crate::config::KERNEL_MODULE_LIST, entry.clone()),
                );
            }
        }

        let Some(severity) = self.policy.unreachable_module.severity() else {
            return;
        };
        let listed: Vec<&str> = entries.iter().map(|e| normalise_target(e)).collect();
        for module in graph.ordered() {
            if module.is_kernel() || !module.domain.is_recognised() {
                continue;
            }
            let reachable = listed
                .iter()
                .any(|e| *e == module.spec_path || *e == module.rel_path);
            if !reachable {
                diags.push(
                    Diagnostic::warning(
                        DiagnosticKind::UnreachableModule,
                        module.id.clone(),
                        format!("{} is not listed by the kernel", module.spec_path),
                    )
                    .with_severity(severity),
                );
            }
        }
    }
}

/// Load the project at `root` using its `rgd.yaml` (or defaults).
pub fn load_project(root: &Path) -> RgdResult<LoadedGraph> {
    let config = ProjectConfig::load(root)?;
    DomainGraphLoader::from_config(root, &config).load()
}

fn resolve_spec_dir(root: &Path, spec_dir: &str) -> PathBuf {
    let candidate = root.join(spec_dir);
    if candidate.is_dir() {
        candidate
    } else {
        root.to_path_buf()
    }
}

/// Profile chains of the actuation topology must end at a root profile.
/// Unknown parents already surface as dangling references, so only cycles
/// are reported here, once per cycle.
fn check_profiles(graph: &DomainGraph, diags: &mut Diagnostics) {
    let Some(topology) = graph.get(ACTUATION_TOPOLOGY) else {
        return;
    };
    let Some(map) = topology.content.get(PROFILES_MAP).and_then(Value::as_object) else {
        return;
    };

    let profiles = ProfileSet::from_map(map);
    let mut reported: BTreeSet<Vec<String>> = BTreeSet::new();
    for profile in profiles.iter() {
        let Err(RgdError::Cycle { path }) = profiles.chain(&profile.name) else {
            continue;
        };
        let mut members = path.clone();
        members.sort();
        members.dedup();
        if !reported.insert(members) {
            continue;
        }
        diags.push(
            Diagnostic::error(
                DiagnosticKind::ProfileCycle,
                topology.id.clone(),
                format!("profile inheritance loops: {}", path.join(" -> ")),
            )
            .with_reference(crate::profile::PROFILE_PARENT_FIELD, profile.name.clone()),
        );
    }
}

/// Twins and bundles carry the standard's tag next to the module list.
fn is_generated_aggregate(content: &Value) -> bool {
    let tagged = content
        .get("meta")
        .and_then(|m| m.get("standard"))
        .and_then(Value::as_str)
        == Some(STANDARD_NAME);
    tagged && content.get("files").is_some_and(Value::is_array)
}

/// `NN_spec` bundle names produced by the compiler.
fn is_domain_bundle(stem: &str) -> bool {
    let bytes = stem.as_bytes();
    bytes.len() == 7
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_digit()
        && &stem[2..] == "_spec"
}

fn normalise_target(target: &str) -> &str {
    target.trim().trim_start_matches("./")
}

/// Names under which other modules may reference `module`.
fn symbols_of(module: &Module) -> Vec<String> {
    let mut symbols = vec![
        module.id.clone(),
        module.spec_path.clone(),
        module.rel_path.clone(),
    ];
    symbols.extend(module.declared_entities());
    symbols
}

pub(crate) fn posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
