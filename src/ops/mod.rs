//! High-level operations.
//!
//! This module contains the implementation of exportkit commands.

pub mod new;
pub mod save;

pub use new::{init_project, InitOptions};
pub use save::{save, ProjectSaver, SaveOptions, SaveReport, SaveStage};
