//! Compile command - write the unified twins, domain bundles or the
//! standard mirror

use super::{write_files, Project};
use crate::cli_output;
use anyhow::{anyhow, Result};
use rgd_core::config::MIRROR_DIR;
use rgd_core::UnifiedCompiler;
use std::path::PathBuf;

pub struct CompileOptions {
    pub domain: Option<String>,
    pub all_domains: bool,
    pub name: Option<String>,
    pub mirror: bool,
}

pub fn run_compile(root: Option<PathBuf>, options: CompileOptions) -> Result<()> {
    let project = Project::open(root)?;
    let loaded = project.load()?;
    let compiler = UnifiedCompiler::new(&loaded.graph);
    let spec_dir = project.loader.spec_dir().to_path_buf();

    let files = if let Some(selector) = &options.domain {
        let domain = loaded
            .graph
            .find_domain(selector)
            .ok_or_else(|| anyhow!("unknown domain '{}'", selector))?;
        let base = options
            .name
            .clone()
            .unwrap_or_else(|| format!("{}_spec", domain.prefix()));
        cli_output::info(&format!("Compiling domain {}", domain.name()));
        compiler.compile_domain(selector)?.files(&base).to_vec()
    } else if options.all_domains {
        cli_output::info("Compiling every domain bundle");
        compiler.domain_bundles()?
    } else {
        let base = options
            .name
            .clone()
            .unwrap_or_else(|| project.config.output_base.clone());
        cli_output::info(&format!(
            "Compiling {} module(s)",
            loaded.graph.module_count()
        ));
        compiler.compile()?.files(&base).to_vec()
    };
    write_files(&spec_dir, &files)?;

    if options.mirror {
        let mirror_dir = project.root.join(MIRROR_DIR);
        cli_output::info(&format!("Mirroring modules into {}", mirror_dir.display()));
        write_files(&mirror_dir, &compiler.standard_mirror()?)?;
    }

    cli_output::success("Compilation complete");
    Ok(())
}
