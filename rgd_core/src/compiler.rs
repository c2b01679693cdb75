//! Unified Spec Compiler
//!
//! Turns a validated [`DomainGraph`] into the two unified twins:
//!
//! - the **human twin** (`.jsonc`): a banner comment followed by the
//!   document, each module's source text embedded verbatim with its comments
//! - the **machine twin** (`.json`): the same document, minified
//!
//! Records are ordered by domain rank, then module identifier. Both twins
//! share one metadata block, so stripping comments from the human twin and
//! minifying it reproduces the machine twin byte for byte.

use crate::config::{STANDARD_NAME, STANDARD_VERSION};
use crate::error::{RgdError, RgdResult};
use crate::graph::{DomainGraph, Module};
use crate::jsonc;
use crate::loader::LoadedGraph;
use crate::output::GeneratedFile;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::Path;

const CONTENT_INDENT: &str = "      ";

/// Metadata block shared by both twins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub standard: String,
    pub version: String,
    pub generated_at: String,
    pub module_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl DocumentMeta {
    pub fn new(module_count: usize) -> Self {
        Self {
            standard: STANDARD_NAME.to_string(),
            version: STANDARD_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            module_count,
            domain: None,
        }
    }
}

/// One module inside a unified document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRecord {
    pub path: String,
    pub id: String,
    pub domain: String,
    pub content: Value,
}

/// The machine twin, deserialised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedDocument {
    pub meta: DocumentMeta,
    pub files: Vec<UnifiedRecord>,
}

impl UnifiedDocument {
    pub fn from_json(text: &str) -> RgdResult<Self> {
        serde_json::from_str(text).map_err(|e| RgdError::from_json("machine twin", &e))
    }

    /// Content of the module with identifier `id`.
    pub fn module(&self, id: &str) -> Option<&Value> {
        self.files.iter().find(|r| r.id == id).map(|r| &r.content)
    }

    /// Minified encoding with keys in canonical (sorted) order.
    pub fn to_json(&self) -> RgdResult<String> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string(&value)?)
    }
}

/// Both renderings of one unified document
#[derive(Debug, Clone)]
pub struct Twins {
    pub human: String,
    pub machine: String,
    pub document: UnifiedDocument,
}

impl Twins {
    /// The two twin files named `<base>.jsonc` and `<base>.json`.
    pub fn files(&self, base: &str) -> [GeneratedFile; 2] {
        [
            GeneratedFile::new(format!("{}.jsonc", base), self.human.clone()),
            GeneratedFile::new(format!("{}.json", base), self.machine.clone()),
        ]
    }
}

/// Outcome of comparing one twin on disk with its regenerated form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwinStatus {
    Match,
    Mismatch,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityReport {
    pub human: TwinStatus,
    pub machine: TwinStatus,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool {
        self.human == TwinStatus::Match && self.machine == TwinStatus::Match
    }
}

/// Compiles the modules of a validated graph
pub struct UnifiedCompiler<'a> {
    graph: &'a DomainGraph,
    generated_at: Option<String>,
}

impl<'a> UnifiedCompiler<'a> {
    pub fn new(graph: &'a DomainGraph) -> Self {
        Self {
            graph,
            generated_at: None,
        }
    }

    /// Pin the timestamp written into the metadata block.
    pub fn with_timestamp(mut self, generated_at: impl Into<String>) -> Self {
        self.generated_at = Some(generated_at.into());
        self
    }

    /// Twins over every module.
    pub fn compile(&self) -> RgdResult<Twins> {
        let modules: Vec<&Module> = self.graph.ordered().collect();
        self.render(&modules, None)
    }

    /// Twins over the modules of one domain (`01`, `foundation`, `01_foundation`).
    pub fn compile_domain(&self, selector: &str) -> RgdResult<Twins> {
        let domain = self
            .graph
            .find_domain(selector)
            .ok_or_else(|| RgdError::NotFound(format!("domain '{}'", selector)))?;
        let modules: Vec<&Module> = self.graph.modules_in(domain).collect();
        self.render(&modules, Some(domain.name()))
    }

    /// `NN_spec.jsonc` / `NN_spec.json` bundles for every recognised domain.
    pub fn domain_bundles(&self) -> RgdResult<Vec<GeneratedFile>> {
        let mut files = Vec::new();
        for domain in self.graph.domains().filter(|d| d.is_recognised()) {
            let twins = self.compile_domain(domain.name())?;
            files.extend(twins.files(&format!("{}_spec", domain.prefix())));
        }
        Ok(files)
    }

    /// One pretty-printed, comment-free `.json` per module, mirroring the
    /// spec tree layout.
    pub fn standard_mirror(&self) -> RgdResult<Vec<GeneratedFile>> {
        self.graph
            .ordered()
            .map(|m| {
                let stem = m
                    .spec_path
                    .rsplit_once('.')
                    .map(|(stem, _)| stem)
                    .unwrap_or(&m.spec_path);
                Ok(GeneratedFile::new(
                    format!("{}.json", stem),
                    serde_json::to_string_pretty(&m.content)?,
                ))
            })
            .collect()
    }

    /// Regenerate both twins with the timestamps found on disk and compare.
    pub fn verify(&self, human_on_disk: Option<&str>, machine_on_disk: Option<&str>) -> IntegrityReport {
        let human = match human_on_disk {
            None => TwinStatus::Missing,
            Some(text) => self.compare(text, |twins| &twins.human),
        };
        let machine = match machine_on_disk {
            None => TwinStatus::Missing,
            Some(text) => self.compare(text, |twins| &twins.machine),
        };
        IntegrityReport { human, machine }
    }

    fn compare(&self, on_disk: &str, pick: impl Fn(&Twins) -> &String) -> TwinStatus {
        let stamp = jsonc::parse("twin", on_disk).ok().and_then(|v| {
            v.get("meta")
                .and_then(|m| m.get("generated_at"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        let Some(stamp) = stamp else {
            return TwinStatus::Mismatch;
        };

        let regenerated = UnifiedCompiler {
            graph: self.graph,
            generated_at: Some(stamp),
        }
        .compile();

        match regenerated {
            Ok(twins) if pick(&twins).trim_end() == on_disk.trim_end() => TwinStatus::Match,
            Ok(_) => TwinStatus::Mismatch,
            Err(e) => {
                log::warn!("could not regenerate twins: {}", e);
                TwinStatus::Mismatch
            }
        }
    }

    fn render(&self, modules: &[&Module], domain: Option<&str>) -> RgdResult<Twins> {
        let mut meta = DocumentMeta::new(modules.len());
        if let Some(ts) = &self.generated_at {
            meta.generated_at = ts.clone();
        }
        meta.domain = domain.map(str::to_string);

        let document = UnifiedDocument {
            meta,
            files: modules
                .iter()
                .map(|m| UnifiedRecord {
                    path: m.rel_path.clone(),
                    id: m.id.clone(),
                    domain: m.domain.name().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        };

        let machine = document.to_json()?;
        let human = render_human(&document, modules)?;
        log::debug!(
            "compiled {} module(s){}",
            modules.len(),
            domain.map(|d| format!(" for {}", d)).unwrap_or_default()
        );

        Ok(Twins {
            human,
            machine,
            document,
        })
    }
}

fn render_human(document: &UnifiedDocument, modules: &[&Module]) -> RgdResult<String> {
    let meta = &document.meta;
    let title = match &meta.domain {
        Some(d) => format!("DOMAIN SPEC (HUMAN TWIN) {}", d),
        None => "UNIFIED SPECIFICATION (HUMAN TWIN)".to_string(),
    };

    let mut out = String::new();
    let rule = "=".repeat(70);
    // writeln! into a String cannot fail
    let _ = writeln!(out, "// {}", rule);
    let _ = writeln!(out, "// {} {}", meta.standard.to_uppercase(), title);
    let _ = writeln!(out, "// {}", "-".repeat(70));
    let _ = writeln!(out, "// Generated at: {}", meta.generated_at);
    let _ = writeln!(out, "// Raw source of every module, comments included.");
    let _ = writeln!(out, "// {}", rule);
    out.push('\n');
    out.push_str("{\n");

    let meta_json = serde_json::to_string_pretty(meta)?;
    let _ = writeln!(out, "  \"meta\": {},", indent_tail(&meta_json, "  "));
    out.push_str("  \"files\": [\n");

    for (i, (record, module)) in document.files.iter().zip(modules).enumerate() {
        out.push_str("    {\n");
        let _ = writeln!(out, "{}\"path\": {},", CONTENT_INDENT, serde_json::to_string(&record.path)?);
        let _ = writeln!(out, "{}\"id\": {},", CONTENT_INDENT, serde_json::to_string(&record.id)?);
        let _ = writeln!(out, "{}\"domain\": {},", CONTENT_INDENT, serde_json::to_string(&record.domain)?);
        let _ = writeln!(out, "{}\"content\":", CONTENT_INDENT);
        out.push_str(&indent_block(&module.raw, CONTENT_INDENT));
        out.push('\n');
        out.push_str(if i + 1 < modules.len() { "    },\n" } else { "    }\n" });
    }

    out.push_str("  ]\n}\n");
    Ok(out)
}

/// Indent every non-blank line.
fn indent_block(text: &str, indent: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indent every line but the first.
fn indent_tail(text: &str, indent: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| if i == 0 { line.to_string() } else { format!("{}{}", indent, line) })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Load, validate and compile the project at `root`. Validation errors
/// are returned unchanged and nothing is compiled.
pub fn compile_tree(root: &Path) -> RgdResult<(LoadedGraph, Twins)> {
    let loaded = crate::loader::load_project(root)?;
    let twins = UnifiedCompiler::new(&loaded.graph).compile()?;
    Ok((loaded, twins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::loader::DomainGraphLoader;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "spec/00_core/kernel.jsonc",
            r#"/**
 * KERNEL
 */
{
  "meta_group": { "id": "did:rgd:unit" },
  // modules
  "module_loading_order_list": [
    "01_foundation/description.jsonc",
    "01_foundation/actuation_dynamics.jsonc",
    "04_volition/alignment.jsonc"
  ]
}"#,
        );
        write(
            root,
            "spec/04_volition/alignment.jsonc",
            "{\n  \"mission\": \"help\", // why\n  \"weights\": [100, 50.5]\n}",
        );
        write(
            root,
            "spec/01_foundation/description.jsonc",
            "/* desc */ {\"hardware_id\": \"unit\", \"note\": \"a // not a comment\"}",
        );
        write(
            root,
            "spec/01_foundation/actuation_dynamics.jsonc",
            "{\n\n  \"actuators\": { \"j1\": { \"limits\": { \"torque_nm\": 1.0 } } }\n}",
        );
        dir
    }

    fn loaded(dir: &TempDir) -> LoadedGraph {
        DomainGraphLoader::new(dir.path()).load().unwrap()
    }

    #[test]
    fn test_records_ordered_by_domain_then_id() {
        let dir = project();
        let graph = loaded(&dir).graph;
        let twins = UnifiedCompiler::new(&graph).compile().unwrap();
        let ids: Vec<&str> = twins.document.files.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["kernel", "actuation_dynamics", "description", "alignment"]
        );
        assert_eq!(twins.document.meta.module_count, 4);
        assert_eq!(twins.document.files[0].path, "spec/00_core/kernel.jsonc");
    }

    #[test]
    fn test_twin_equivalence() {
        let dir = project();
        let graph = loaded(&dir).graph;
        let twins = UnifiedCompiler::new(&graph).compile().unwrap();

        assert!(twins.human.contains("// modules"));
        assert!(twins.human.contains("// why"));
        assert_eq!(jsonc::minify(&twins.human).unwrap(), twins.machine);
    }

    #[test]
    fn test_machine_twin_round_trips_into_document() {
        let dir = project();
        let graph = loaded(&dir).graph;
        let twins = UnifiedCompiler::new(&graph).compile().unwrap();
        let doc = UnifiedDocument::from_json(&twins.machine).unwrap();
        assert_eq!(doc, twins.document);
        assert_eq!(doc.module("description").unwrap()["hardware_id"], "unit");
    }

    #[test]
    fn test_compilation_is_deterministic_for_fixed_timestamp() {
        let dir = project();
        let graph = loaded(&dir).graph;
        let a = UnifiedCompiler::new(&graph).with_timestamp("2025-01-01T00:00:00Z").compile().unwrap();
        let b = UnifiedCompiler::new(&graph).with_timestamp("2025-01-01T00:00:00Z").compile().unwrap();
        assert_eq!(a.human, b.human);
        assert_eq!(a.machine, b.machine);
    }

    #[test]
    fn test_domain_bundle() {
        let dir = project();
        let graph = loaded(&dir).graph;
        let compiler = UnifiedCompiler::new(&graph);

        let twins = compiler.compile_domain("foundation").unwrap();
        assert_eq!(twins.document.meta.domain.as_deref(), Some("01_foundation"));
        assert_eq!(twins.document.files.len(), 2);
        assert_eq!(jsonc::minify(&twins.human).unwrap(), twins.machine);

        let names: Vec<String> = compiler.domain_bundles().unwrap().into_iter().map(|f| f.path).collect();
        assert!(names.contains(&"01_spec.jsonc".to_string()));
        assert!(names.contains(&"04_spec.json".to_string()));

        assert!(matches!(compiler.compile_domain("09"), Err(RgdError::NotFound(_))));
    }

    #[test]
    fn test_standard_mirror_strips_comments() {
        let dir = project();
        let graph = loaded(&dir).graph;
        let mirror = UnifiedCompiler::new(&graph).standard_mirror().unwrap();
        let kernel = mirror.iter().find(|f| f.path == "00_core/kernel.json").unwrap();
        assert!(!kernel.contents.contains("//"));
        assert_eq!(mirror.len(), 4);
    }

    #[test]
    fn test_integrity_ignores_timestamp_only() {
        let dir = project();
        let graph = loaded(&dir).graph;
        let old = UnifiedCompiler::new(&graph)
            .with_timestamp("2020-05-05T10:00:00Z")
            .compile()
            .unwrap();

        let report = UnifiedCompiler::new(&graph).verify(Some(&old.human), Some(&old.machine));
        assert!(report.passed());

        let tampered = old.machine.replace("\"help\"", "\"harm\"");
        let report = UnifiedCompiler::new(&graph).verify(Some(&old.human), Some(&tampered));
        assert_eq!(report.machine, TwinStatus::Mismatch);
        assert_eq!(report.human, TwinStatus::Match);

        let report = UnifiedCompiler::new(&graph).verify(None, Some("not json"));
        assert_eq!(report.human, TwinStatus::Missing);
        assert_eq!(report.machine, TwinStatus::Mismatch);
    }

    #[test]
    fn test_validation_errors_block_compilation() {
        let dir = project();
        write(
            dir.path(),
            "spec/01_foundation/description.jsonc",
            r#"{ "parent_ref_str": "missing_module" }"#,
        );
        let err = compile_tree(dir.path()).unwrap_err();
        let diags = err.diagnostics().unwrap();
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.errors().next().unwrap().kind, DiagnosticKind::DanglingReference);
    }
}
