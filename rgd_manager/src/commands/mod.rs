//! `rgd` subcommands

pub mod check;
pub mod compile;
pub mod export;
pub mod formats;
pub mod import;
pub mod integrity;

use crate::cli_output;
use anyhow::{bail, Context, Result};
use rgd_core::{DomainGraphLoader, GeneratedFile, LoadedGraph, ProjectConfig, RgdError};
use std::fs;
use std::path::{Path, PathBuf};

/// A project root with its configuration and a loader built from it
pub(crate) struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub loader: DomainGraphLoader,
}

impl Project {
    pub fn open(root: Option<PathBuf>) -> Result<Self> {
        let root = root.unwrap_or_else(|| PathBuf::from("."));
        if !root.exists() {
            bail!("project root not found: {}", root.display());
        }
        let config = ProjectConfig::load(&root)
            .with_context(|| format!("failed to read project config in {}", root.display()))?;
        let loader = DomainGraphLoader::from_config(&root, &config);
        log::debug!("project {:?}, modules from {:?}", root, loader.spec_dir());
        Ok(Self {
            root,
            config,
            loader,
        })
    }

    /// Load and validate. Every collected diagnostic is printed before the
    /// error is returned.
    pub fn load(&self) -> Result<LoadedGraph> {
        match self.loader.load() {
            Ok(loaded) => {
                for warning in &loaded.warnings {
                    cli_output::diagnostic(warning);
                }
                Ok(loaded)
            }
            Err(RgdError::Validation(diagnostics)) => {
                for d in diagnostics.iter() {
                    cli_output::diagnostic(d);
                }
                bail!(
                    "validation failed with {} error(s)",
                    diagnostics.error_count()
                )
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Write generated files below `out_dir`, creating directories as needed.
pub(crate) fn write_files(out_dir: &Path, files: &[GeneratedFile]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let target = file.target(out_dir);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, &file.contents)
            .with_context(|| format!("failed to write {}", target.display()))?;
        cli_output::written(&target);
        written.push(target);
    }
    Ok(written)
}

pub(crate) fn print_warnings(warnings: &[String]) {
    for w in warnings {
        cli_output::warn(w);
    }
}
