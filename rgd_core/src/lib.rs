//! # RGD Core
//!
//! Specification resolution and bridge compilation for OpenRGD robot
//! descriptions.
//!
//! A robot is described by a tree of JSONC modules grouped into numbered
//! domains (`00_core`, `01_foundation`, ...). This crate:
//!
//! - **Loads** the tree in domain order and validates every cross-module
//!   reference ([`DomainGraphLoader`])
//! - **Compiles** it into a human and a machine "twin" ([`UnifiedCompiler`])
//! - **Resolves** control profile inheritance ([`ProfileSet`])
//! - **Imports** URDF and USD into the canonical model ([`import`])
//! - **Exports** the canonical model to ROS 2 and Isaac ([`bridge`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rgd_core::{bridge, compile_tree, BridgeTarget};
//! use std::path::Path;
//!
//! # fn main() -> rgd_core::RgdResult<()> {
//! let (_graph, twins) = compile_tree(Path::new("my_robot"))?;
//! let output = bridge::export(BridgeTarget::Ros2, &twins.document)?;
//! for file in &output.files {
//!     println!("{}", file.path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod graph;
pub mod import;
pub mod jsonc;
pub mod loader;
pub mod model;
pub mod output;
pub mod profile;

pub use bridge::{BridgeOutput, BridgeTarget};
pub use compiler::{
    compile_tree, IntegrityReport, TwinStatus, Twins, UnifiedCompiler,
    UnifiedDocument,
};
pub use config::{ProjectConfig, ValidationPolicy};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use domain::Domain;
pub use error::{RgdError, RgdResult};
pub use graph::{DomainGraph, Module};
pub use import::{import_file, ImportFormat, Imported};
pub use loader::{load_project, DomainGraphLoader, LoadedGraph};
pub use model::{Entity, JointKind, RobotModel};
pub use output::GeneratedFile;
pub use profile::{Profile, ProfileSet};
