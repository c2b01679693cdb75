//! RGD Manager Library
//!
//! Command implementations behind the `rgd` binary. Each command is a thin
//! layer over `rgd_core`: it resolves paths, calls the engine and prints
//! the outcome.

pub mod cli_output;
pub mod commands;
