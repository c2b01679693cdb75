//! Validation diagnostics collected during a loader run
//!
//! The loader never stops at the first broken reference. Every finding is
//! pushed into a [`Diagnostics`] list so a single `rgd check` reports all of
//! them at once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "fatal" => Ok(Severity::Error),
            "warning" | "warn" | "advisory" => Ok(Severity::Warning),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// What kind of problem a diagnostic describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// File could not be parsed
    Parse,
    /// Reference target does not exist anywhere
    DanglingReference,
    /// Reference target lives in a later domain
    ForwardReference,
    /// Two modules or entities share an identifier
    DuplicateIdentifier,
    /// Kernel lists a module that is not on disk
    MissingKernelEntry,
    /// Module on disk that the kernel does not list
    UnreachableModule,
    /// No kernel module found
    MissingKernel,
    /// Control profiles extend each other in a loop
    ProfileCycle,
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Offending module identifier (or file path for parse failures)
    pub module: String,
    /// Field holding the reference, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Reference target, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            module: module.into(),
            field: None,
            target: None,
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, module, message)
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_reference(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self.target = Some(target.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.module)?;
        if let Some(field) = &self.field {
            write!(f, ".{}", field)?;
        }
        if let Some(target) = &self.target {
            write!(f, " -> '{}'", target)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Ordered collection of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => log::debug!("validation error: {}", diagnostic),
            Severity::Warning => log::warn!("{}", diagnostic),
        }
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Keep only the warnings (used once errors have been ruled out)
    pub fn into_warnings(self) -> Vec<Diagnostic> {
        self.items.into_iter().filter(|d| !d.is_error()).collect()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
