//! Target writers - serializers for native build projects.
//!
//! Each [`TargetFormat`] is served by one [`TargetWriter`]. Writers only see
//! the private [`ExportTarget`] they are handed plus read-only project data,
//! so standard targets can be written on different threads at once.

pub mod cmake;
pub mod json;
pub mod makefile;
pub mod registry;

pub use registry::WriterRegistry;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::module::Module;
use crate::core::project::{ProjectSettings, TargetConfig, TargetFormat};
use crate::core::target::ExportTarget;
use crate::export::context::SaveContext;

/// Read-only inputs shared by every writer in one save.
#[derive(Clone, Copy)]
pub struct WriteContext<'a> {
    /// Shared save state; writers write through it
    pub save: &'a SaveContext,

    /// Project settings snapshot
    pub settings: &'a ProjectSettings,

    /// Resolved modules, dependencies first
    pub modules: &'a [Module],

    /// Absolute project folder
    pub project_folder: &'a Path,

    /// Absolute generated-code folder
    pub generated_dir: &'a Path,

    /// Every standard target; only filled in for the aggregator pass
    pub siblings: &'a [TargetSummary],
}

impl WriteContext<'_> {
    /// Write one of a target's files.
    pub fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.save.write_target_file(path, content)
    }
}

/// What the aggregator knows about a standard target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSummary {
    pub name: String,
    pub format: TargetFormat,
    /// Absolute output folder
    pub folder: PathBuf,
}

impl TargetSummary {
    pub fn from_config(config: &TargetConfig, project_folder: &Path) -> Self {
        let folder = if config.folder.is_absolute() {
            config.folder.clone()
        } else {
            project_folder.join(&config.folder)
        };
        TargetSummary {
            name: config.name.clone(),
            format: config.format,
            folder,
        }
    }
}

/// A serializer for one native project format.
pub trait TargetWriter: Send + Sync {
    /// The format this writer produces.
    fn format(&self) -> TargetFormat;

    /// Brief description for listings.
    fn description(&self) -> &'static str;

    /// Write the target's project files into `target.folder`.
    ///
    /// Returns the files written.
    fn write(&self, target: &mut ExportTarget, cx: &WriteContext<'_>) -> Result<Vec<PathBuf>>;
}

/// Make a name safe for use as a file name or build-system identifier.
pub(crate) fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "Project".to_string()
    } else {
        cleaned
    }
}
