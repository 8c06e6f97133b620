//! Test fixtures for exportkit unit tests.
//!
//! [`TestProject`] lays out a throwaway project on disk (modules, resources,
//! sources) and hands back a [`ProjectDescription`] pointing at it.
//!
//! ```rust,ignore
//! let (tmp, project) = TestProject::new("Demo")
//!     .module("core", &[])
//!     .module("gui", &["core"])
//!     .target("Linux", TargetFormat::Makefile)
//!     .build();
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::module::MODULE_MANIFEST_NAME;
use crate::core::project::{
    ModuleRef, ProjectDescription, ProjectRoot, TargetConfig, TargetFormat, PROJECT_FILE_NAME,
};

/// Folder (relative to the project) that fixture modules live in.
pub const MODULES_DIR: &str = "modules";

/// Builder for an on-disk project.
pub struct TestProject {
    dir: TempDir,
    root: ProjectRoot,
}

impl TestProject {
    /// An empty project in a fresh temporary folder.
    pub fn new(name: &str) -> Self {
        TestProject {
            dir: TempDir::new().unwrap(),
            root: ProjectRoot::new(name),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the project folder.
    pub fn file(self, rel: &str, contents: impl AsRef<[u8]>) -> Self {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
        self
    }

    /// Write a source file and list it in the main group.
    pub fn source(mut self, rel: &str, contents: &str) -> Self {
        let compile = !rel.ends_with(".h");
        self.root.main_group.add_file(rel, compile);
        self.file(rel, contents)
    }

    /// Create module `id` with one compile unit and enable it.
    pub fn module(mut self, id: &str, deps: &[&str]) -> Self {
        let deps: Vec<String> = deps.iter().map(|d| format!("\"{}\"", d)).collect();
        let manifest = format!(
            "id = \"{id}\"\ndependencies = [{deps}]\n\n[[config]]\nsymbol = \"{flag}_ENABLE_EXTRAS\"\ndefault = true\n",
            id = id,
            deps = deps.join(", "),
            flag = id.to_uppercase(),
        );

        let base = format!("{}/{}", MODULES_DIR, id);
        self.root.modules.push(ModuleRef::new(id, MODULES_DIR));
        self.file(&format!("{}/{}", base, MODULE_MANIFEST_NAME), manifest)
            .file(&format!("{}/{}.h", base, id), format!("#pragma once // {}\n", id))
            .file(&format!("{}/{}.cpp", base, id), format!("#include \"{}.h\"\n", id))
    }

    /// Enable a module without creating its folder.
    pub fn missing_module(mut self, id: &str) -> Self {
        self.root.modules.push(ModuleRef::new(id, MODULES_DIR));
        self
    }

    /// Write a resource file and add it to the resource globs.
    pub fn resource(mut self, rel: &str, bytes: &[u8]) -> Self {
        self.root.resources.push(rel.to_string());
        self.file(rel, bytes)
    }

    /// Add a target exported to `Builds/<name>`.
    pub fn target(mut self, name: &str, format: TargetFormat) -> Self {
        let folder = PathBuf::from("Builds").join(name.replace(' ', ""));
        self.root.targets.push(TargetConfig::new(name, format, folder));
        self
    }

    /// Edit the root directly.
    pub fn with(mut self, f: impl FnOnce(&mut ProjectRoot)) -> Self {
        f(&mut self.root);
        self
    }

    /// Finish; the folder lives as long as the returned `TempDir`.
    pub fn build(self) -> (TempDir, ProjectDescription) {
        let file = self.dir.path().join(PROJECT_FILE_NAME);
        (self.dir, ProjectDescription::new(file, self.root))
    }
}

/// Every file under `dir`, relative to it, sorted.
pub fn list_tree(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}
