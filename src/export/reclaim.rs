//! Orphan reclamation.
//!
//! After a save, anything in the generated-code folder that this save did
//! not produce is stale and gets deleted. Each directory is classified in
//! full before anything inside it is removed, and symbolic links are never
//! followed, so nothing outside the folder can be touched.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::export::context::CreatedFileSet;
use crate::util::fs::{is_inside, normalize_path};

/// Names that always survive reclamation.
pub const KEEP_LIST: &[&str] = &[".git", ".svn", ".cvs", ".gitignore", "CMakeLists.txt"];

/// Whether `name` is on the keep-list.
pub fn should_keep(name: &str) -> bool {
    KEEP_LIST.contains(&name)
}

/// What a reclamation pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Delete everything under `root` that was not created during this save.
///
/// `root` itself is never removed.
pub fn reclaim(root: &Path, created: &CreatedFileSet) -> ReclaimReport {
    let mut report = ReclaimReport::default();
    if root.is_dir() {
        delete_unwanted_files_in(root, root, created, &mut report);
    }
    tracing::debug!(
        "reclaimed {} stale entries under {}",
        report.removed.len(),
        root.display()
    );
    report
}

/// Returns `true` if `dir` holds nothing worth keeping once its unwanted
/// entries are gone.
fn delete_unwanted_files_in(
    root: &Path,
    dir: &Path,
    created: &CreatedFileSet,
    report: &mut ReclaimReport,
) -> bool {
    let mut folder_is_now_empty = true;
    let mut to_delete: Vec<(PathBuf, bool)> = Vec::new();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("couldn't inspect {}: {}", dir.display(), e);
                folder_is_now_empty = false;
                continue;
            }
        };

        let path = entry.path().to_path_buf();
        let name = entry.file_name().to_string_lossy();

        if is_created(&path, created) || should_keep(&name) {
            folder_is_now_empty = false;
        } else if entry.file_type().is_dir() {
            if delete_unwanted_files_in(root, &path, created, report) {
                to_delete.push((path, true));
            } else {
                folder_is_now_empty = false;
            }
        } else {
            to_delete.push((path, false));
        }
    }

    for (path, is_dir) in to_delete.into_iter().rev() {
        if !is_inside(&path, root) {
            continue;
        }

        let result = if is_dir {
            fs::remove_dir(&path)
        } else {
            fs::remove_file(&path)
        };

        match result {
            Ok(()) => {
                tracing::debug!("removed stale {}", path.display());
                report.removed.push(path);
            }
            Err(e) => {
                tracing::warn!("couldn't remove {}: {}", path.display(), e);
                report.failed.push(path);
                folder_is_now_empty = false;
            }
        }
    }

    folder_is_now_empty
}

fn is_created(path: &Path, created: &CreatedFileSet) -> bool {
    created.contains(path) || created.contains(&normalize_path(path))
}
