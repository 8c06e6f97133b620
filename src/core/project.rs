//! Export.toml project description.
//!
//! The project description is owned by the caller. A save may mutate a few
//! narrow fields of it: the modification timestamp, the on-disk path, and
//! target entries that pick up auto-added search paths while targets are
//! written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::group::FileGroup;
use crate::core::target::TargetKind;
use crate::util::fs::{normalize_path, read_to_string};
use crate::util::hash::sha256_str;

/// Canonical project file name.
pub const PROJECT_FILE_NAME: &str = "Export.toml";

/// Default folder (relative to the project) for generated code.
pub const DEFAULT_GENERATED_DIR: &str = "GeneratedCode";

/// Default namespace for embedded binary data.
pub const DEFAULT_BINARY_DATA_NAMESPACE: &str = "BinaryData";

/// Default maximum size of one generated binary-data unit.
pub const DEFAULT_MAX_BINARY_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Placeholder in post-export commands replaced by the project folder.
pub const PROJECT_FOLDER_PLACEHOLDER: &str = "%%1%%";

/// Line-ending convention for everything the project writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// The newline sequence.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }

    /// Rewrite every line ending in `text` to this convention.
    pub fn apply(&self, text: &str) -> String {
        let unified = text.replace("\r\n", "\n");
        match self {
            LineEnding::Lf => unified,
            LineEnding::CrLf => unified.replace('\n', "\r\n"),
        }
    }
}

/// What kind of binary the project produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    #[default]
    GuiApp,
    ConsoleApp,
    StaticLib,
    DynamicLib,
    Plugin,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::GuiApp => "gui-app",
            ProjectType::ConsoleApp => "console-app",
            ProjectType::StaticLib => "static-lib",
            ProjectType::DynamicLib => "dynamic-lib",
            ProjectType::Plugin => "plugin",
        }
    }

    /// Whether the project builds a standalone application.
    pub fn is_standalone_application(&self) -> bool {
        !matches!(self, ProjectType::Plugin | ProjectType::DynamicLib)
    }
}

/// Splash-screen colour scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplashColour {
    #[default]
    Dark,
    Light,
}

/// Native project format a target is exported as.
///
/// The format decides the target's kind up front; nothing inspects writer
/// types at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetFormat {
    /// GNU Makefile
    #[serde(rename = "makefile")]
    Makefile,
    /// JSON listing of sources, defines and include paths
    #[serde(rename = "compile-manifest")]
    CompileManifest,
    /// CMakeLists.txt summarising the other targets
    #[serde(rename = "cmake")]
    CMake,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Makefile => "makefile",
            TargetFormat::CompileManifest => "compile-manifest",
            TargetFormat::CMake => "cmake",
        }
    }

    /// The capability tag for targets of this format.
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetFormat::Makefile | TargetFormat::CompileManifest => TargetKind::Standard,
            TargetFormat::CMake => TargetKind::Aggregator,
        }
    }
}

/// Project-wide settings from the `[project]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Project name
    pub name: String,

    /// Company name
    #[serde(default)]
    pub company: String,

    /// Version string (e.g. "1.2.3")
    #[serde(default = "default_version")]
    pub version: String,

    /// Project type
    #[serde(default)]
    pub project_type: ProjectType,

    /// Line endings used for every written file
    #[serde(default)]
    pub line_ending: LineEnding,

    /// Whether to generate AppConfig.h
    #[serde(default = "default_true")]
    pub use_app_config: bool,

    /// Whether the splash screen is shown
    #[serde(default = "default_true")]
    pub display_splash_screen: bool,

    /// Splash-screen colour
    #[serde(default)]
    pub splash_colour: SplashColour,

    /// Include the binary-data header from the aggregate header
    #[serde(default = "default_true")]
    pub include_binary_in_header: bool,

    /// Generated code folder, relative to the project folder
    #[serde(default = "default_generated_dir")]
    pub generated_dir: PathBuf,

    /// Namespace for embedded binary data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_data_namespace: Option<String>,

    /// Maximum raw resource bytes per binary-data unit (0 = default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_binary_file_size: Option<u64>,

    /// Command run after export on POSIX hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_export_shell_command_posix: Option<String>,

    /// Command run after export on Windows hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_export_shell_command_windows: Option<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_generated_dir() -> PathBuf {
    PathBuf::from(DEFAULT_GENERATED_DIR)
}

impl ProjectSettings {
    /// Settings for a new project with defaults everywhere else.
    pub fn new(name: impl Into<String>) -> Self {
        ProjectSettings {
            name: name.into(),
            company: String::new(),
            version: default_version(),
            project_type: ProjectType::default(),
            line_ending: LineEnding::default(),
            use_app_config: true,
            display_splash_screen: true,
            splash_colour: SplashColour::default(),
            include_binary_in_header: true,
            generated_dir: default_generated_dir(),
            binary_data_namespace: None,
            max_binary_file_size: None,
            post_export_shell_command_posix: None,
            post_export_shell_command_windows: None,
        }
    }
}

/// An enabled module from `[[modules]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    /// Module identifier (also its folder name)
    pub id: String,

    /// Folder containing the module folder
    pub path: PathBuf,

    /// Explicit config-flag values; absent flags use their defaults
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, bool>,
}

impl ModuleRef {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        ModuleRef {
            id: id.into(),
            path: path.into(),
            config: BTreeMap::new(),
        }
    }
}

/// A configured export target from `[[target]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target name
    pub name: String,

    /// Native project format
    pub format: TargetFormat,

    /// Output folder, relative to the project folder
    pub folder: PathBuf,

    /// Extra header search paths, relative to the project folder
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_search_paths: Vec<String>,

    /// Free-form writer settings
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
}

impl TargetConfig {
    pub fn new(name: impl Into<String>, format: TargetFormat, folder: impl Into<PathBuf>) -> Self {
        TargetConfig {
            name: name.into(),
            format,
            folder: folder.into(),
            extra_search_paths: Vec::new(),
            settings: BTreeMap::new(),
        }
    }

    /// Add a search path unless already present.
    ///
    /// Returns `true` if the list changed.
    pub fn add_extra_search_path(&mut self, path: &str) -> bool {
        if self.extra_search_paths.iter().any(|p| p == path) {
            return false;
        }
        self.extra_search_paths.push(path.to_string());
        true
    }
}

/// The serialized root of a project description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRoot {
    /// Glob patterns of files to embed as binary data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    /// Project settings
    pub project: ProjectSettings,

    /// Plugin flags written to the plugin-properties header
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plugin: BTreeMap<String, String>,

    /// Enabled modules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleRef>,

    /// The project's own source tree
    #[serde(default)]
    pub main_group: FileGroup,

    /// Export targets
    #[serde(default, rename = "target", skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetConfig>,
}

impl ProjectRoot {
    /// A root with default settings and nothing enabled.
    pub fn new(name: impl Into<String>) -> Self {
        ProjectRoot {
            resources: Vec::new(),
            project: ProjectSettings::new(name),
            plugin: BTreeMap::new(),
            modules: Vec::new(),
            main_group: FileGroup::new("Source"),
            targets: Vec::new(),
        }
    }

    /// Find a target entry by name.
    pub fn target_mut(&mut self, name: &str) -> Option<&mut TargetConfig> {
        self.targets.iter_mut().find(|t| t.name == name)
    }

    /// Serialize to the on-disk text form (LF line endings).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize project")
    }
}

/// A loaded project: root content plus where it lives on disk.
#[derive(Debug, Clone)]
pub struct ProjectDescription {
    root: ProjectRoot,
    file: PathBuf,
    modified: Option<SystemTime>,
}

impl ProjectDescription {
    /// Create a project description for `root` stored at `file`.
    pub fn new(file: impl Into<PathBuf>, root: ProjectRoot) -> Self {
        ProjectDescription {
            root,
            file: file.into(),
            modified: None,
        }
    }

    /// Load a project description from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)?;
        let root: ProjectRoot = toml::from_str(&contents)
            .with_context(|| format!("failed to parse project file: {}", path.display()))?;

        let mut project = ProjectDescription::new(normalize_path(path), root);
        project.modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        Ok(project)
    }

    pub fn root(&self) -> &ProjectRoot {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ProjectRoot {
        &mut self.root
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.root.project
    }

    /// The project file path.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Point the description at a different project file.
    pub fn set_file(&mut self, file: impl Into<PathBuf>) {
        self.file = file.into();
    }

    /// The folder containing the project file.
    pub fn project_folder(&self) -> &Path {
        self.file.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Resolve a project-relative path.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_folder().join(path)
        }
    }

    /// Absolute path of the generated code folder.
    pub fn generated_dir(&self) -> PathBuf {
        self.resolve_path(&self.root.project.generated_dir)
    }

    pub fn line_ending(&self) -> LineEnding {
        self.root.project.line_ending
    }

    /// The serialized root content with the project's line endings.
    pub fn serialize(&self) -> Result<String> {
        Ok(self.line_ending().apply(&self.root.to_toml()?))
    }

    /// Hash of the serialized root content.
    pub fn root_hash(&self) -> Result<String> {
        Ok(sha256_str(&self.serialize()?))
    }

    pub fn update_modification_time(&mut self) {
        self.modified = Some(SystemTime::now());
    }

    pub fn modification_time(&self) -> Option<SystemTime> {
        self.modified
    }

    /// The version packed into an integer, as a hex literal.
    pub fn version_as_hex(&self) -> String {
        version_as_hex(&self.root.project.version)
    }

    pub fn binary_data_namespace(&self) -> String {
        match self.root.project.binary_data_namespace.as_deref().map(str::trim) {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => DEFAULT_BINARY_DATA_NAMESPACE.to_string(),
        }
    }

    pub fn max_binary_file_size(&self) -> u64 {
        match self.root.project.max_binary_file_size {
            Some(size) if size > 0 => size,
            _ => DEFAULT_MAX_BINARY_FILE_SIZE,
        }
    }

    /// The binary-data header inside the generated folder.
    pub fn binary_data_header_file(&self) -> PathBuf {
        self.generated_dir().join(format!("{}.h", DEFAULT_BINARY_DATA_NAMESPACE))
    }

    /// The binary-data unit with zero-based `index`.
    pub fn binary_data_cpp_file(&self, index: usize) -> PathBuf {
        self.generated_dir()
            .join(format!("{}{}.cpp", DEFAULT_BINARY_DATA_NAMESPACE, index + 1))
    }

    /// The post-export command for the host platform, if configured.
    pub fn post_export_shell_command(&self) -> Option<&str> {
        let cmd = if cfg!(windows) {
            self.root.project.post_export_shell_command_windows.as_deref()
        } else {
            self.root.project.post_export_shell_command_posix.as_deref()
        };
        cmd.map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Pack a dotted version string into an integer.
///
/// `major.minor.patch` becomes `major << 16 | minor << 8 | patch`; a fourth
/// segment shifts the value left by one more byte.
pub fn version_number(version: &str) -> u32 {
    if let Ok(v) = semver::Version::parse(version.trim()) {
        return (v.major as u32).wrapping_shl(16)
            .wrapping_add((v.minor as u32).wrapping_shl(8))
            .wrapping_add(v.patch as u32);
    }

    let segments: Vec<u32> = version
        .split('.')
        .map(|s| s.trim().parse::<u32>().unwrap_or(0))
        .collect();
    let seg = |i: usize| segments.get(i).copied().unwrap_or(0);

    let mut value = seg(0)
        .wrapping_shl(16)
        .wrapping_add(seg(1).wrapping_shl(8))
        .wrapping_add(seg(2));
    if segments.len() > 3 {
        value = value.wrapping_shl(8).wrapping_add(seg(3));
    }
    value
}

/// Format [`version_number`] as a C hex literal.
pub fn version_as_hex(version: &str) -> String {
    format!("0x{:x}", version_number(version))
}

/// Find the project file, searching upward from `start`.
pub fn find_project_file(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(PROJECT_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            anyhow::bail!(
                "could not find `{}` in `{}` or any parent directory\n\
                 help: Run `exportkit init` to create a new project",
                PROJECT_FILE_NAME,
                start.display()
            );
        }
    }
}
