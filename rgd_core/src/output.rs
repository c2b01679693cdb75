//! Generated artifacts handed back to the caller for writing

use std::path::{Path, PathBuf};

/// A file produced in memory; the caller decides where it lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// POSIX path relative to the output directory
    pub path: String,
    pub contents: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Destination of this file below `out_dir`.
    pub fn target(&self, out_dir: &Path) -> PathBuf {
        self.path
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(out_dir.to_path_buf(), |acc, part| acc.join(part))
    }
}
