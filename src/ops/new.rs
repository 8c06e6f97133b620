//! Implementation of `exportkit init`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::core::project::{ProjectRoot, TargetConfig, TargetFormat, PROJECT_FILE_NAME};

/// Options for creating a new project.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Project name
    pub name: String,
}

const MAIN_CPP: &str = r#"#include "ProjectHeader.h"

int main (int argc, char* argv[])
{
    (void) argc;
    (void) argv;
    return 0;
}
"#;

/// Create a project skeleton in `path`: the project file, one source file
/// and a Makefile target.
pub fn init_project(path: &Path, opts: &InitOptions) -> Result<()> {
    let project_file = path.join(PROJECT_FILE_NAME);
    if project_file.exists() {
        bail!("`{}` already exists in `{}`", PROJECT_FILE_NAME, path.display());
    }

    fs::create_dir_all(path.join("Source"))
        .with_context(|| format!("failed to create directory: {}", path.display()))?;

    let main_cpp = path.join("Source").join("Main.cpp");
    if !main_cpp.exists() {
        fs::write(&main_cpp, MAIN_CPP).with_context(|| "failed to write Source/Main.cpp")?;
    }

    let mut root = ProjectRoot::new(&opts.name);
    root.main_group.add_file("Source/Main.cpp", true);
    root.targets.push(TargetConfig::new(
        "Linux Makefile",
        TargetFormat::Makefile,
        "Builds/LinuxMakefile",
    ));

    fs::write(&project_file, root.to_toml()?)
        .with_context(|| format!("failed to write {}", PROJECT_FILE_NAME))?;

    tracing::debug!("created project `{}` in {}", opts.name, path.display());
    Ok(())
}
