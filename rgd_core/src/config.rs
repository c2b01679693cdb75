//! RGD project configuration
//!
//! File-name conventions of the standard live here as constants, together
//! with the typed `rgd.yaml` project file. Every section is optional; a
//! project without `rgd.yaml` gets the defaults below.
//!
//! # Example rgd.yaml
//!
//! ```yaml
//! name: atlas-mini
//! spec_dir: spec
//! output_base: openrgd_unified_spec
//!
//! validation:
//!   # error | warning
//!   dangling_kernel_entry: warning
//!   # error | warning | ignore
//!   unreachable_module: ignore
//!
//! export:
//!   out_dir: export
//! ```

use crate::diagnostics::Severity;
use crate::error::RgdResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// === Standard identity ===

/// Format tag written into every aggregate document.
pub const STANDARD_NAME: &str = "OpenRGD";

/// Version of the aggregate document layout.
pub const STANDARD_VERSION: &str = "0.1.0";

// === File Name Constants ===

/// Project configuration file name.
pub const RGD_YAML: &str = "rgd.yaml";

/// Directory holding the configuration modules.
pub const SPEC_DIR: &str = "spec";

/// Base name of the unified twins (`.jsonc` / `.json`).
pub const UNIFIED_BASE_NAME: &str = "openrgd_unified_spec";

/// Identifier of the kernel module.
pub const KERNEL_ID: &str = "kernel";

/// Extensions of configuration modules.
pub const MODULE_EXTENSIONS: &[&str] = &["jsonc", "json"];

/// Directory under the project root that receives the per-module mirror.
pub const MIRROR_DIR: &str = "standard";

// === Field Name Constants ===

/// Kernel identity lives at `meta_group.id`.
pub const KERNEL_META_GROUP: &str = "meta_group";

/// Kernel list of module paths.
pub const KERNEL_MODULE_LIST: &str = "module_loading_order_list";

/// Suffixes marking a string-valued reference field.
pub const REFERENCE_SUFFIXES: &[&str] = &["_ref_str", "_ref"];

/// Suffix marking a list-valued reference field.
pub const REFERENCE_LIST_SUFFIX: &str = "_ref_list";

/// Override the spec directory name.
pub fn spec_dir_name() -> String {
    std::env::var("RGD_SPEC_DIR").unwrap_or_else(|_| SPEC_DIR.to_string())
}

/// Whether a unreachable module is reported, and how loudly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Error,
    #[default]
    Warning,
    Ignore,
}

impl Policy {
    pub fn severity(self) -> Option<Severity> {
        match self {
            Policy::Error => Some(Severity::Error),
            Policy::Warning => Some(Severity::Warning),
            Policy::Ignore => None,
        }
    }
}

/// Severity knobs for the kernel checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Kernel lists a module path that does not exist
    pub dangling_kernel_entry: Severity,
    /// Module in a recognised domain that the kernel does not list
    pub unreachable_module: Policy,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            dangling_kernel_entry: Severity::Error,
            unreachable_module: Policy::Warning,
        }
    }
}

impl ValidationPolicy {
    /// Apply `RGD_KERNEL_SEVERITY` on top of the configured value.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var("RGD_KERNEL_SEVERITY") {
            match raw.parse::<Severity>() {
                Ok(severity) => self.dangling_kernel_entry = severity,
                Err(e) => log::warn!("ignoring RGD_KERNEL_SEVERITY: {}", e),
            }
        }
        self
    }
}

/// Export section of rgd.yaml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub out_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("export"),
        }
    }
}

/// RGD project configuration from rgd.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name
    pub name: Option<String>,

    /// Directory holding the modules, relative to the project root
    pub spec_dir: String,

    /// Base name of the unified twins
    pub output_base: String,

    pub validation: ValidationPolicy,

    pub export: ExportConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            spec_dir: spec_dir_name(),
            output_base: UNIFIED_BASE_NAME.to_string(),
            validation: ValidationPolicy::default(),
            export: ExportConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Load `rgd.yaml` from a project root, or fall back to defaults.
    pub fn load(project_root: &Path) -> RgdResult<Self> {
        let path = project_root.join(RGD_YAML);
        let mut config = if path.exists() {
            log::debug!("loading project config from {:?}", path);
            let content = std::fs::read_to_string(&path)?;
            serde_yaml::from_str::<ProjectConfig>(&content)?
        } else {
            ProjectConfig::default()
        };
        config.validation = config.validation.with_env_overrides();
        Ok(config)
    }
}
