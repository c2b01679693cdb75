//! Import command - normalise a URDF or USD file into a new spec tree

use super::{print_warnings, write_files};
use crate::cli_output;
use anyhow::{Context, Result};
use rgd_core::import_file;
use std::path::PathBuf;

pub fn run_import(file: PathBuf, out: Option<PathBuf>) -> Result<()> {
    cli_output::info(&format!("Importing {}", file.display()));
    let imported = import_file(&file)
        .with_context(|| format!("failed to import {}", file.display()))?;
    let model = &imported.model;

    let out_dir = out.unwrap_or_else(|| PathBuf::from(format!("RGD-{}", model.name)));
    let files = model.to_modules()?;
    write_files(&out_dir, &files)?;
    print_warnings(&imported.warnings);

    cli_output::success(&format!(
        "Imported '{}' ({} joint(s), {} link(s)) into {}",
        model.name,
        model.entities.len(),
        model.links.len(),
        out_dir.display()
    ));
    cli_output::hint(&format!("next: rgd compile {}", out_dir.display()));
    Ok(())
}
