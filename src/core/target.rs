//! Export targets - the native build/IDE projects a save produces.
//!
//! An [`ExportTarget`] is the private, per-save view of one `[[target]]`
//! entry. Each target owns its own copy of the structural state it edits
//! (settings, search paths, file groups), so targets can be written
//! concurrently without sharing anything mutable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::group::FileGroup;
use crate::core::module::Module;
use crate::core::project::{ProjectType, TargetConfig, TargetFormat};
use crate::util::fs::{ensure_dir, relative_path, to_unix_string};

/// Capability tag of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Produces an independent build project
    Standard,
    /// Summarises every standard target; written last
    Aggregator,
}

/// The private view of one target during a save.
#[derive(Debug, Clone)]
pub struct ExportTarget {
    /// Target name
    pub name: String,

    /// Native project format
    pub format: TargetFormat,

    /// Absolute output folder
    pub folder: PathBuf,

    /// Absolute project folder
    pub project_folder: PathBuf,

    /// Private copy of the writer settings
    pub settings: BTreeMap<String, String>,

    /// Absolute header search paths
    pub search_paths: Vec<PathBuf>,

    /// Preprocessor definitions
    pub defines: BTreeMap<String, String>,

    /// Copy of the project's own source tree
    pub main_group: FileGroup,

    /// Additional groups (the generated-files group among them)
    pub groups: Vec<FileGroup>,
}

impl ExportTarget {
    /// Build the private view of `config`.
    pub fn from_config(config: &TargetConfig, project_folder: &Path) -> Self {
        let folder = if config.folder.is_absolute() {
            config.folder.clone()
        } else {
            project_folder.join(&config.folder)
        };

        let search_paths = config
            .extra_search_paths
            .iter()
            .map(|p| project_folder.join(p))
            .collect();

        ExportTarget {
            name: config.name.clone(),
            format: config.format,
            folder,
            project_folder: project_folder.to_path_buf(),
            settings: config.settings.clone(),
            search_paths,
            defines: BTreeMap::new(),
            main_group: FileGroup::default(),
            groups: Vec::new(),
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.format.kind()
    }

    pub fn is_aggregator(&self) -> bool {
        self.kind() == TargetKind::Aggregator
    }

    /// Create the output folder.
    pub fn create_folder(&self) -> Result<()> {
        ensure_dir(&self.folder)
    }

    /// Take a private copy of the project's source tree.
    pub fn copy_main_group(&mut self, group: &FileGroup) {
        self.main_group = group.clone();
    }

    /// Add an absolute header search path unless already present.
    pub fn add_to_extra_search_paths(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    /// Record the defines implied by the project type.
    pub fn add_settings_for_project_type(&mut self, project_type: ProjectType) {
        self.defines
            .insert("PROJECT_TYPE".to_string(), format!("\"{}\"", project_type.as_str()));
        self.defines.insert(
            "PROJECT_STANDALONE_APPLICATION".to_string(),
            if project_type.is_standalone_application() { "1" } else { "0" }.to_string(),
        );
    }

    /// List `module`'s wrapper units in `group` and add its include paths.
    pub fn add_module_settings(&mut self, module: &Module, group: &mut FileGroup, generated_dir: &Path) {
        for unit in module.compile_units() {
            group.add_file(generated_dir.join(unit.proxy_file_name()), !unit.is_r_file());
        }

        self.add_to_extra_search_paths(module.parent_folder());
        for path in module.search_paths() {
            self.add_to_extra_search_paths(path);
        }

        self.defines
            .insert(format!("MODULE_AVAILABLE_{}", module.id()), "1".to_string());
    }

    /// Resolve a project-relative path to an absolute one.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_folder.join(path)
        }
    }

    /// Render `path` relative to the output folder with forward slashes.
    pub fn relative_to_folder(&self, path: &Path) -> String {
        to_unix_string(&relative_path(&self.folder, &self.resolve(path)))
    }

    /// Every file to compile: the main tree first, then the other groups.
    pub fn compile_files(&self) -> Vec<PathBuf> {
        std::iter::once(&self.main_group)
            .chain(self.groups.iter())
            .flat_map(|g| g.compile_files())
            .map(|f| self.resolve(&f.path))
            .collect()
    }

    /// Every listed file, compiled or not.
    pub fn all_files(&self) -> Vec<PathBuf> {
        std::iter::once(&self.main_group)
            .chain(self.groups.iter())
            .flat_map(|g| g.all_files())
            .map(|f| self.resolve(&f.path))
            .collect()
    }
}
