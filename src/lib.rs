//! exportkit - deterministic project exporter
//!
//! Saving a project writes its main file, a folder of generated code
//! (configuration headers, module wrappers, embedded resources) and one
//! native build project per configured target.

pub mod core;
pub mod export;
pub mod generator;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test fixtures for exportkit unit tests.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{ExportTarget, Module, ProjectDescription, ProjectRoot};

pub use export::{SaveError, SaveFailure, SaveMode};
pub use ops::{ProjectSaver, SaveOptions, SaveReport};
pub use resolver::ValidationError;
