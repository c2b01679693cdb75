//! Terminal output helpers shared by every `rgd` command.
//!
//! Commands print through these instead of raw `println!` so icons and
//! colours stay consistent.

use colored::*;
use rgd_core::{Diagnostic, Severity};
use std::path::Path;

pub const ICON_SUCCESS: &str = "\u{2713}"; // ✓
pub const ICON_ERROR: &str = "\u{2717}"; // ✗
pub const ICON_WARN: &str = "\u{26a0}"; // ⚠
pub const ICON_INFO: &str = "\u{25b6}"; // ▶
pub const ICON_HINT: &str = "\u{00b7}"; // ·

pub fn success(msg: &str) {
    println!("{} {}", ICON_SUCCESS.green(), msg);
}

/// Printed to stderr.
pub fn error(msg: &str) {
    eprintln!("{} {}", ICON_ERROR.red(), msg);
}

pub fn warn(msg: &str) {
    println!("{} {}", ICON_WARN.yellow(), msg);
}

pub fn info(msg: &str) {
    println!("{} {}", ICON_INFO.cyan(), msg);
}

pub fn hint(msg: &str) {
    println!("  {} {}", ICON_HINT.dimmed(), msg.dimmed());
}

pub fn header(msg: &str) {
    println!("{}", msg.cyan().bold());
}

/// One validation finding, coloured by severity.
pub fn diagnostic(d: &Diagnostic) {
    match d.severity {
        Severity::Error => error(&d.to_string()),
        Severity::Warning => warn(&d.to_string()),
    }
}

/// Announce a file written below `out_dir`.
pub fn written(path: &Path) {
    println!("  {} {}", ICON_SUCCESS.green(), path.display().to_string().dimmed());
}
