//! Shared state of one save.
//!
//! A [`SaveContext`] is created at the start of a save and dropped at its
//! end. Everything in it can be reached from several worker threads at
//! once, so each piece sits behind its own mutex.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};

use crate::core::project::LineEnding;
use crate::export::error::{SaveError, SaveFailure};
use crate::util::fs::{normalize_path, remove_file_if_exists, write_if_different};

/// Lock `mutex`, carrying on with the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered list of recorded failures.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Mutex<Vec<SaveError>>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, error: SaveError) {
        tracing::debug!("recorded error: {}", error);
        lock(&self.errors).push(error);
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.errors).is_empty()
    }

    pub fn len(&self) -> usize {
        lock(&self.errors).len()
    }

    /// The first recorded error.
    pub fn first(&self) -> Option<SaveError> {
        lock(&self.errors).first().cloned()
    }

    pub fn snapshot(&self) -> Vec<SaveError> {
        lock(&self.errors).clone()
    }

    /// The recorded errors as a failure, if there are any.
    pub fn to_failure(&self) -> Option<SaveFailure> {
        SaveFailure::from_errors(self.snapshot())
    }
}

/// Append-only set of absolute paths written during this save.
#[derive(Debug, Default)]
pub struct CreatedFileSet {
    paths: Mutex<BTreeSet<PathBuf>>,
}

impl CreatedFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the path was already recorded.
    pub fn add(&self, path: impl Into<PathBuf>) -> bool {
        lock(&self.paths).insert(path.into())
    }

    pub fn contains(&self, path: &Path) -> bool {
        lock(&self.paths).contains(path)
    }

    pub fn len(&self) -> usize {
        lock(&self.paths).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> BTreeSet<PathBuf> {
        lock(&self.paths).clone()
    }
}

/// Shared state of one save.
#[derive(Debug)]
pub struct SaveContext {
    line_ending: LineEnding,
    errors: ErrorList,
    created: CreatedFileSet,
    claimed: Mutex<HashSet<PathBuf>>,
    written: Mutex<Vec<PathBuf>>,
}

impl SaveContext {
    pub fn new(line_ending: LineEnding) -> Self {
        SaveContext {
            line_ending,
            errors: ErrorList::new(),
            created: CreatedFileSet::new(),
            claimed: Mutex::new(HashSet::new()),
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    pub fn created(&self) -> &CreatedFileSet {
        &self.created
    }

    pub fn add_error(&self, error: impl Into<SaveError>) {
        self.errors.add(error.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Paths whose bytes actually changed during this save.
    pub fn written(&self) -> Vec<PathBuf> {
        lock(&self.written).clone()
    }

    /// Write `content` to `path` unless the file already holds it.
    ///
    /// The path is recorded as created whether or not bytes change. A
    /// failure is recorded and reported as `false`.
    pub fn replace_file_if_different(&self, path: &Path, content: &str) -> bool {
        match self.write_normalized(path, content) {
            Ok(()) => true,
            Err(e) => {
                self.add_error(SaveError::io(format!(
                    "Can't write to file: {}: {:#}",
                    path.display(),
                    e
                )));
                false
            }
        }
    }

    /// Like [`replace_file_if_different`](Self::replace_file_if_different),
    /// but an output path already produced earlier in this save is left
    /// alone: the first producer wins.
    pub fn produce_file(&self, path: &Path, content: &str) -> bool {
        if !self.claim(path) {
            return false;
        }
        self.replace_file_if_different(path, content)
    }

    /// Write a file belonging to one target.
    ///
    /// Errors are returned rather than recorded so the target's job can
    /// report them as one failure.
    pub fn write_target_file(&self, path: &Path, content: &str) -> Result<()> {
        if !self.claim(path) {
            return Ok(());
        }
        self.write_normalized(path, content)
            .with_context(|| format!("Can't write to file: {}", path.display()))
    }

    /// Delete a generated file that is no longer needed.
    pub fn remove_unneeded_file(&self, path: &Path) {
        match remove_file_if_exists(path) {
            Ok(true) => tracing::debug!("removed {}", path.display()),
            Ok(false) => {}
            Err(_) => self.add_error(SaveError::io(format!(
                "Couldn't remove unnecessary file: {}",
                path.display()
            ))),
        }
    }

    fn claim(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        if lock(&self.claimed).insert(path.clone()) {
            return true;
        }
        tracing::warn!(
            "{} was already produced during this save; keeping the first version",
            path.display()
        );
        false
    }

    fn write_normalized(&self, path: &Path, content: &str) -> Result<()> {
        let text = self.line_ending.apply(content);
        let result = write_if_different(path, text.as_bytes());

        let path = normalize_path(path);
        self.created.add(path.clone());

        if result? {
            tracing::debug!("wrote {}", path.display());
            lock(&self.written).push(path);
        } else {
            tracing::debug!("unchanged {}", path.display());
        }
        Ok(())
    }
}
