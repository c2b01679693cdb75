use clap::{Parser, Subcommand};
use colored::*;
use rgd_manager::commands;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rgd")]
#[command(about = "RGD - OpenRGD robot description compiler")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase output verbosity (show debug messages)
    #[arg(short = 'v', long = "verbose", global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the spec tree and report every finding
    Check {
        /// Project root (default: current directory)
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,
    },

    /// Compile the unified twins
    Compile {
        /// Project root (default: current directory)
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        /// Compile a single domain bundle (01, foundation or 01_foundation)
        #[arg(short = 'd', long = "domain", conflicts_with = "all_domains")]
        domain: Option<String>,

        /// Compile one bundle per domain
        #[arg(long = "all-domains")]
        all_domains: bool,

        /// Base name of the output files
        #[arg(short = 'n', long = "name")]
        name: Option<String>,

        /// Also write one comment-free JSON file per module under standard/
        #[arg(long = "mirror")]
        mirror: bool,
    },

    /// Import a URDF or USD file into a new spec tree
    Import {
        /// File to import
        file: PathBuf,

        /// Output directory (default: RGD-<robot name>)
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },

    /// Generate target configuration with a bridge
    Export {
        /// Bridge target (ros2, isaac)
        target: String,

        /// Project root (default: current directory)
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        /// Output directory (default: export/ under the project root)
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },

    /// Check that the twins on disk match the spec tree
    Integrity {
        /// Project root (default: current directory)
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        /// Base name of the twins
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
    },

    /// List supported import formats and bridge targets
    Formats,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("rgd v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_command(cli.command) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Check { root } => commands::check::run_check(root),

        Commands::Compile {
            root,
            domain,
            all_domains,
            name,
            mirror,
        } => commands::compile::run_compile(
            root,
            commands::compile::CompileOptions {
                domain,
                all_domains,
                name,
                mirror,
            },
        ),

        Commands::Import { file, out } => commands::import::run_import(file, out),

        Commands::Export { target, root, out } => commands::export::run_export(&target, root, out),

        Commands::Integrity { root, name } => commands::integrity::run_integrity(root, name),

        Commands::Formats => {
            commands::formats::run_formats();
            Ok(())
        }
    }
}
