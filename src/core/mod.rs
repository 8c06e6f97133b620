//! Core data structures for exportkit.
//!
//! This module contains the foundational types used throughout exportkit:
//! - The project description (Export.toml)
//! - File groups listed by target projects
//! - Library modules
//! - Export targets

pub mod group;
pub mod module;
pub mod project;
pub mod target;

pub use group::{FileGroup, FileItem};
pub use module::{CompileUnit, ConfigFlag, Module};
pub use project::{
    find_project_file, LineEnding, ModuleRef, ProjectDescription, ProjectRoot, ProjectSettings,
    ProjectType, TargetConfig, TargetFormat, PROJECT_FILE_NAME,
};
pub use target::{ExportTarget, TargetKind};
