//! `exportkit init` command

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cli::InitArgs;
use exportkit::ops::{init_project, InitOptions};

/// The project name from the arguments, or the directory name.
pub fn determine_project_name(name: Option<&str>, path: &Path) -> String {
    if let Some(name) = name {
        return name.to_string();
    }
    path.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

pub fn execute(args: InitArgs) -> Result<()> {
    let path = args.path.unwrap_or_else(|| PathBuf::from("."));
    let name = determine_project_name(args.name.as_deref(), &path);

    init_project(&path, &InitOptions { name: name.clone() })?;
    eprintln!("     Initialized project `{}`", name);

    Ok(())
}
