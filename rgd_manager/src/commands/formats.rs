use crate::cli_output;
use rgd_core::{BridgeTarget, ImportFormat};

/// List import formats and bridge targets.
pub fn run_formats() {
    cli_output::header("Import formats");
    for format in ImportFormat::all() {
        println!("  {:<8} .{}", format.name(), format.extensions().join(", ."));
    }

    println!();
    cli_output::header("Bridge targets");
    for target in BridgeTarget::all() {
        println!("  {:<8} {}", target.name(), target.file_names().join(", "));
    }
}
