//! Module arena and the domain-ordered graph built by the loader
//!
//! Modules are stored once in a `Vec` and addressed by index. References
//! between modules stay as identifiers in the JSON content and are only
//! resolved to indices by the loader's validation pass.

use crate::config::{KERNEL_ID, KERNEL_META_GROUP, KERNEL_MODULE_LIST, MODULE_EXTENSIONS};
use crate::config::{REFERENCE_LIST_SUFFIX, REFERENCE_SUFFIXES};
use crate::domain::Domain;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Field holding the list of links of a description module
pub const KINEMATIC_CHAIN_FIELD: &str = "kinematic_chain";

/// One configuration fragment
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Identifier derived from the file stem
    pub id: String,
    pub domain: Domain,
    /// Location on disk
    pub path: PathBuf,
    /// POSIX path relative to the project root, e.g. `spec/01_foundation/description.jsonc`
    pub rel_path: String,
    /// POSIX path relative to the spec directory, e.g. `01_foundation/description.jsonc`
    pub spec_path: String,
    /// Source text, comments included
    pub raw: String,
    /// Parsed content, comments stripped
    pub content: Value,
}

/// A reference found in module content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Dotted path of the field, e.g. `joint_actuator_mapping_map.elbow.use_profile_ref_str`
    pub field: String,
    pub target: String,
}

impl Reference {
    /// Targets that look like a file path resolve against module paths.
    pub fn is_path(&self) -> bool {
        self.target.contains('/')
            || MODULE_EXTENSIONS
                .iter()
                .any(|ext| self.target.ends_with(&format!(".{}", ext)))
    }
}

impl Module {
    pub fn is_kernel(&self) -> bool {
        self.id == KERNEL_ID
    }

    /// Every reference field in the content, in deterministic order.
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        collect_references(&self.content, "", &mut refs);
        refs
    }

    /// Entity identifiers declared by this module.
    pub fn declared_entities(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_entities(&self.content, &mut out);
        out
    }

    /// `meta_group.id` for kernel modules.
    pub fn kernel_identifier(&self) -> Option<&str> {
        self.content
            .get(KERNEL_META_GROUP)
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
    }

    /// `module_loading_order_list` for kernel modules.
    pub fn kernel_entries(&self) -> Vec<String> {
        self.content
            .get(KERNEL_MODULE_LIST)
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn is_reference_field(key: &str) -> bool {
    REFERENCE_SUFFIXES.iter().any(|s| key.ends_with(s))
}

fn join_field(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn collect_references(value: &Value, prefix: &str, out: &mut Vec<Reference>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let field = join_field(prefix, key);
                match child {
                    Value::String(target) if is_reference_field(key) => {
                        out.push(Reference {
                            field,
                            target: target.clone(),
                        });
                    }
                    Value::Array(items) if key.ends_with(REFERENCE_LIST_SUFFIX) => {
                        for (i, item) in items.iter().enumerate() {
                            if let Some(target) = item.as_str() {
                                out.push(Reference {
                                    field: format!("{}[{}]", field, i),
                                    target: target.to_string(),
                                });
                            }
                        }
                    }
                    _ => collect_references(child, &field, out),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_references(item, &format!("{}[{}]", prefix, i), out);
            }
        }
        _ => {}
    }
}

fn collect_entities(value: &Value, out: &mut Vec<String>) {
    if let Value::Object(map) = value {
        for (key, child) in map {
            match child {
                Value::Object(entries) if key.ends_with("_map") || key == "actuators" => {
                    out.extend(entries.keys().cloned());
                    for entry in entries.values() {
                        collect_entities(entry, out);
                    }
                }
                Value::Array(items) if key == KINEMATIC_CHAIN_FIELD => {
                    out.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                }
                _ => collect_entities(child, out),
            }
        }
    }
}

/// A validated set of modules, indexed by identifier and domain
#[derive(Debug, Clone)]
pub struct DomainGraph {
    root: PathBuf,
    spec_dir: PathBuf,
    modules: Vec<Module>,
    by_id: HashMap<String, usize>,
    by_domain: BTreeMap<Domain, Vec<usize>>,
    load_order: Vec<usize>,
    kernel: Option<usize>,
}

impl DomainGraph {
    /// Build the arena. `modules` must carry unique identifiers.
    pub(crate) fn new(root: PathBuf, spec_dir: PathBuf, modules: Vec<Module>) -> Self {
        let mut by_id = HashMap::with_capacity(modules.len());
        let mut by_domain: BTreeMap<Domain, Vec<usize>> = BTreeMap::new();

        for (idx, module) in modules.iter().enumerate() {
            by_id.insert(module.id.clone(), idx);
            by_domain.entry(module.domain.clone()).or_default().push(idx);
        }
        for indices in by_domain.values_mut() {
            indices.sort_by(|a, b| modules[*a].id.cmp(&modules[*b].id));
        }

        let kernel = by_id.get(KERNEL_ID).copied();

        Self {
            root,
            spec_dir,
            modules,
            by_id,
            by_domain,
            load_order: Vec::new(),
            kernel,
        }
    }

    pub(crate) fn record_loaded(&mut self, idx: usize) {
        self.load_order.push(idx);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn spec_dir(&self) -> &Path {
        &self.spec_dir
    }

    pub fn get(&self, id: &str) -> Option<&Module> {
        self.by_id.get(id).map(|&i| &self.modules[i])
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn kernel(&self) -> Option<&Module> {
        self.kernel.map(|i| &self.modules[i])
    }

    /// Identity declared by the kernel, if any.
    pub fn kernel_id(&self) -> Option<&str> {
        self.kernel().and_then(Module::kernel_identifier)
    }

    /// Domains present in the graph, ascending.
    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.by_domain.keys()
    }

    /// Modules of one domain, sorted by identifier.
    pub fn modules_in(&self, domain: &Domain) -> impl Iterator<Item = &Module> {
        self.by_domain
            .get(domain)
            .into_iter()
            .flatten()
            .map(move |&i| &self.modules[i])
    }

    /// All modules ordered by domain, then identifier.
    pub fn ordered(&self) -> impl Iterator<Item = &Module> {
        self.by_domain
            .values()
            .flatten()
            .map(move |&i| &self.modules[i])
    }

    /// Modules in the order the loader admitted them.
    pub fn load_order(&self) -> impl Iterator<Item = &Module> {
        self.load_order.iter().map(move |&i| &self.modules[i])
    }

    /// Resolve a domain selector such as `01` or `foundation`.
    pub fn find_domain(&self, selector: &str) -> Option<&Domain> {
        self.by_domain.keys().find(|d| d.matches_selector(selector))
    }

    pub(crate) fn indices_in(&self, domain: &Domain) -> Vec<usize> {
        self.by_domain.get(domain).cloned().unwrap_or_default()
    }

    pub(crate) fn module_at(&self, idx: usize) -> &Module {
        &self.modules[idx]
    }
}
