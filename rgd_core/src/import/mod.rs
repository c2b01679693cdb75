//! Import Normalizers
//!
//! Each supported external format has one pure function from file bytes to
//! an [`Imported`] canonical model. The registry is the closed
//! [`ImportFormat`] enum, selected by file extension.

pub mod urdf;
pub mod usd;

use crate::error::{RgdError, RgdResult};
use crate::model::RobotModel;
use std::fmt;
use std::path::Path;

/// Result of a successful import
#[derive(Debug, Clone)]
pub struct Imported {
    pub model: RobotModel,
    /// Non-fatal findings, e.g. an empty actuation set
    pub warnings: Vec<String>,
}

impl Imported {
    pub(crate) fn new(model: RobotModel) -> Self {
        Self {
            model,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// Kinematic XML robot description
    Urdf,
    /// Text scene description, plain or archived
    Usd,
}

impl ImportFormat {
    pub fn all() -> &'static [ImportFormat] {
        &[ImportFormat::Urdf, ImportFormat::Usd]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ImportFormat::Urdf => "urdf",
            ImportFormat::Usd => "usd",
        }
    }

    /// Extensions (without dot) handled by this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImportFormat::Urdf => &["urdf", "xml"],
            ImportFormat::Usd => &["usd", "usda", "usdz", "tgz"],
        }
    }

    /// Every extension any importer accepts.
    pub fn supported_extensions() -> Vec<&'static str> {
        Self::all()
            .iter()
            .flat_map(|f| f.extensions().iter().copied())
            .collect()
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    pub fn from_path(path: &Path) -> RgdResult<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| RgdError::UnsupportedFormat {
            format: if ext.is_empty() {
                "<no extension>".to_string()
            } else {
                ext.to_string()
            },
            guidance: format!(
                "supported extensions: {}",
                Self::supported_extensions().join(", ")
            ),
        })
    }

    /// Run the importer on in-memory bytes. `source_name` is the file name,
    /// used for the fallback robot name and in error messages.
    pub fn import(&self, source_name: &str, bytes: &[u8]) -> RgdResult<Imported> {
        log::debug!("importing {} as {}", source_name, self);
        match self {
            ImportFormat::Urdf => urdf::import(source_name, bytes),
            ImportFormat::Usd => usd::import(source_name, bytes),
        }
    }
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Read `path` and import it with the format its extension selects.
pub fn import_file(path: &Path) -> RgdResult<Imported> {
    let format = ImportFormat::from_path(path)?;
    let bytes = std::fs::read(path)?;
    let source_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input");
    format.import(source_name, &bytes)
}

/// Robot name derived from a file name: stem, lower case, spaces and
/// dashes as underscores.
pub fn normalise_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_name);
    stem.to_lowercase().replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_selects_format_by_extension() {
        assert_eq!(
            ImportFormat::from_path(&PathBuf::from("arm.URDF")).unwrap(),
            ImportFormat::Urdf
        );
        assert_eq!(
            ImportFormat::from_path(&PathBuf::from("scene.usdz")).unwrap(),
            ImportFormat::Usd
        );
        assert!(matches!(
            ImportFormat::from_path(&PathBuf::from("model.stl")),
            Err(RgdError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_supported_extensions_cover_all_formats() {
        let exts = ImportFormat::supported_extensions();
        assert!(exts.contains(&"xml"));
        assert!(exts.contains(&"usda"));
    }

    #[test]
    fn test_normalise_name() {
        assert_eq!(normalise_name("My Robot-v2.urdf"), "my_robot_v2");
    }
}
