//! Check command - load the spec tree and report every validation finding

use super::Project;
use crate::cli_output;
use anyhow::Result;
use std::path::PathBuf;

pub fn run_check(root: Option<PathBuf>) -> Result<()> {
    let project = Project::open(root)?;
    let spec_dir = project.loader.spec_dir().display();
    match &project.config.name {
        Some(name) => cli_output::info(&format!("Checking {} ({})", name, spec_dir)),
        None => cli_output::info(&format!("Checking {}", spec_dir)),
    }

    let loaded = project.load()?;
    let graph = &loaded.graph;

    cli_output::header("Domains");
    for domain in graph.domains() {
        println!("  {:<20} {} module(s)", domain.name(), graph.modules_in(domain).count());
    }

    match graph.kernel_id() {
        Some(id) => cli_output::hint(&format!("kernel: {}", id)),
        None => cli_output::hint("no kernel identifier"),
    }
    cli_output::success(&format!(
        "{} module(s) valid, {} warning(s)",
        graph.module_count(),
        loaded.warnings.len()
    ));
    Ok(())
}
