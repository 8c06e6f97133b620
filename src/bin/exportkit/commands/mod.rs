//! Command implementations

pub mod init;
pub mod resources;
pub mod save;

use std::path::{Path, PathBuf};

use anyhow::Result;

use exportkit::core::project::find_project_file;
use exportkit::ProjectDescription;

/// Load the project named by `path`: a project file, or any folder inside
/// a project.
pub fn load_project(path: Option<&Path>) -> Result<ProjectDescription> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let file = if path.is_file() {
        path
    } else {
        find_project_file(&path)?
    };
    ProjectDescription::load(&file)
}

/// Print every recorded error after the first, which the caller reports.
pub fn report_other_errors(failure: &exportkit::SaveFailure) {
    for error in failure.errors().skip(1) {
        eprintln!("error: {}", error);
    }
}
