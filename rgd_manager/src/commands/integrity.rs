//! Integrity command - compare the twins on disk with a fresh compilation

use super::Project;
use crate::cli_output;
use anyhow::{bail, Result};
use rgd_core::{TwinStatus, UnifiedCompiler};
use std::fs;
use std::path::PathBuf;

pub fn run_integrity(root: Option<PathBuf>, name: Option<String>) -> Result<()> {
    let project = Project::open(root)?;
    let loaded = project.load()?;
    let base = name.unwrap_or_else(|| project.config.output_base.clone());
    let spec_dir = project.loader.spec_dir();

    let human_path = spec_dir.join(format!("{}.jsonc", base));
    let machine_path = spec_dir.join(format!("{}.json", base));
    let human = fs::read_to_string(&human_path).ok();
    let machine = fs::read_to_string(&machine_path).ok();

    let report = UnifiedCompiler::new(&loaded.graph).verify(human.as_deref(), machine.as_deref());

    for (label, path, status) in [
        ("human twin", &human_path, report.human),
        ("machine twin", &machine_path, report.machine),
    ] {
        let msg = format!("{} {}", label, path.display());
        match status {
            TwinStatus::Match => cli_output::success(&format!("{}: up to date", msg)),
            TwinStatus::Mismatch => cli_output::error(&format!("{}: out of date", msg)),
            TwinStatus::Missing => cli_output::error(&format!("{}: missing", msg)),
        }
    }

    if !report.passed() {
        cli_output::hint("run `rgd compile` to regenerate");
        bail!("integrity check failed");
    }
    Ok(())
}
