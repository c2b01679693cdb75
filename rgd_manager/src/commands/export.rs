//! Export command - compile in memory and run one bridge

use super::{print_warnings, write_files, Project};
use crate::cli_output;
use anyhow::Result;
use rgd_core::{bridge, BridgeTarget, UnifiedCompiler};
use std::path::PathBuf;

pub fn run_export(target: &str, root: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let target = BridgeTarget::from_name(target)?;
    let project = Project::open(root)?;
    let loaded = project.load()?;
    let twins = UnifiedCompiler::new(&loaded.graph).compile()?;

    cli_output::info(&format!("Running {} bridge", target));
    let output = bridge::export(target, &twins.document)?;

    let out_dir = out.unwrap_or_else(|| project.root.join(&project.config.export.out_dir));
    write_files(&out_dir, &output.files)?;
    print_warnings(&output.warnings);

    cli_output::success(&format!(
        "{} file(s) written to {}",
        output.files.len(),
        out_dir.display()
    ));
    Ok(())
}
