//! Library modules - reusable source bundles a project enables.
//!
//! A module lives in a folder named after its id and carries a
//! `module.toml` manifest declaring its dependencies and config flags.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::core::project::ModuleRef;
use crate::util::fs::{list_files, read_to_string};

/// Name of the manifest file inside a module folder.
pub const MODULE_MANIFEST_NAME: &str = "module.toml";

/// Extensions of files compiled as module units.
const COMPILE_UNIT_EXTENSIONS: &[&str] = &["c", "cpp", "mm", "r"];

/// On-disk `module.toml` schema.
#[derive(Debug, Clone, Deserialize)]
struct ModuleManifest {
    id: String,

    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    dependencies: Vec<String>,

    #[serde(default)]
    search_paths: Vec<String>,

    #[serde(default, rename = "config")]
    config_flags: Vec<ConfigFlagDecl>,
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigFlagDecl {
    symbol: String,

    #[serde(default)]
    default: bool,

    #[serde(default)]
    description: String,
}

/// A preprocessor option a module declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFlag {
    /// Macro name
    pub symbol: String,
    /// Human-readable description
    pub description: String,
    /// Value used when the project leaves it unset
    pub default: bool,
    /// Value set by the project, if any
    pub value: Option<bool>,
}

impl ConfigFlag {
    /// Whether the project left this flag at its default.
    pub fn is_using_default(&self) -> bool {
        self.value.is_none()
    }

    /// The effective value.
    pub fn value(&self) -> bool {
        self.value.unwrap_or(self.default)
    }
}

/// A source file of a module that gets its own wrapper unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileUnit {
    /// Absolute path of the real source
    pub file: PathBuf,
}

impl CompileUnit {
    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Rez files are included without the module folder prefix.
    pub fn is_r_file(&self) -> bool {
        self.file.extension().and_then(|e| e.to_str()) == Some("r")
    }

    /// File name of the generated wrapper that forwards to this unit.
    pub fn proxy_file_name(&self) -> String {
        format!("include_{}", self.file_name())
    }
}

/// A resolved, immutable module.
#[derive(Debug, Clone)]
pub struct Module {
    id: String,
    name: String,
    root: PathBuf,
    dependencies: Vec<String>,
    search_paths: Vec<String>,
    config_flags: Vec<ConfigFlag>,
    compile_units: Vec<CompileUnit>,
}

impl Module {
    /// Load the module referenced by `module_ref`.
    ///
    /// `project_folder` anchors relative module paths.
    pub fn load(module_ref: &ModuleRef, project_folder: &Path) -> Result<Module> {
        let base = if module_ref.path.is_absolute() {
            module_ref.path.clone()
        } else {
            project_folder.join(&module_ref.path)
        };
        let root = base.join(&module_ref.id);

        if !root.is_dir() {
            bail!("module folder not found: {}", root.display());
        }

        let manifest_path = root.join(MODULE_MANIFEST_NAME);
        if !manifest_path.is_file() {
            bail!("missing {}: {}", MODULE_MANIFEST_NAME, manifest_path.display());
        }

        let manifest: ModuleManifest = toml::from_str(&read_to_string(&manifest_path)?)
            .with_context(|| format!("failed to parse module manifest: {}", manifest_path.display()))?;

        if manifest.id != module_ref.id {
            bail!(
                "module folder `{}` declares id `{}`",
                root.display(),
                manifest.id
            );
        }

        for symbol in module_ref.config.keys() {
            if !manifest.config_flags.iter().any(|f| &f.symbol == symbol) {
                tracing::warn!("module `{}` has no config flag `{}`", module_ref.id, symbol);
            }
        }

        let config_flags = manifest
            .config_flags
            .into_iter()
            .map(|decl| ConfigFlag {
                value: module_ref.config.get(&decl.symbol).copied(),
                symbol: decl.symbol,
                description: decl.description,
                default: decl.default,
            })
            .collect();

        let compile_units = find_compile_units(&root, &manifest.id);

        Ok(Module {
            name: manifest.name.unwrap_or_else(|| manifest.id.clone()),
            id: manifest.id,
            root,
            dependencies: manifest.dependencies,
            search_paths: manifest.search_paths,
            config_flags,
            compile_units,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The folder containing the module folder; include paths point here.
    pub fn parent_folder(&self) -> &Path {
        self.root.parent().unwrap_or(&self.root)
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Extra include folders, absolute.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.iter().map(|p| self.root.join(p)).collect()
    }

    pub fn config_flags(&self) -> &[ConfigFlag] {
        &self.config_flags
    }

    pub fn compile_units(&self) -> &[CompileUnit] {
        &self.compile_units
    }

    /// The module's main header, as written in an include directive.
    pub fn header_include(&self) -> String {
        format!("{0}/{0}.h", self.id)
    }
}

fn find_compile_units(root: &Path, id: &str) -> Vec<CompileUnit> {
    list_files(root, 1)
        .into_iter()
        .filter(|path| {
            let ext_ok = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| COMPILE_UNIT_EXTENSIONS.contains(&e))
                .unwrap_or(false);
            let stem_ok = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.starts_with(id))
                .unwrap_or(false);
            ext_ok && stem_ok
        })
        .map(|file| CompileUnit { file })
        .collect()
}
