//! Save error taxonomy.

use std::fmt;

use thiserror::Error;

use crate::resolver::ValidationError;

/// One recorded failure during a save.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    /// The module set is unusable; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A directory or file could not be created, written or removed.
    #[error("{0}")]
    Io(String),

    /// The post-export command failed or timed out.
    #[error("{0}")]
    ExternalTool(String),

    /// Generating one target failed.
    #[error("{target}: {message}")]
    Aggregation { target: String, message: String },

    /// The project has no targets at all.
    #[error("No targets found! Please add a target before saving.")]
    NoTargets,

    /// The target set or the save options are inconsistent.
    #[error("{0}")]
    Configuration(String),
}

impl SaveError {
    pub fn io(message: impl Into<String>) -> Self {
        SaveError::Io(message.into())
    }

    pub fn aggregation(target: impl Into<String>, error: &anyhow::Error) -> Self {
        SaveError::Aggregation {
            target: target.into(),
            message: format!("{:#}", error),
        }
    }
}

/// A failed save.
///
/// Displays as the first recorded error; every recorded error stays
/// available through [`SaveFailure::errors`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFailure {
    first: SaveError,
    rest: Vec<SaveError>,
}

impl SaveFailure {
    /// `None` when `errors` is empty.
    pub fn from_errors(errors: Vec<SaveError>) -> Option<Self> {
        let mut iter = errors.into_iter();
        let first = iter.next()?;
        Some(SaveFailure {
            first,
            rest: iter.collect(),
        })
    }

    /// The authoritative failure reason.
    pub fn first(&self) -> &SaveError {
        &self.first
    }

    /// Every recorded error, in the order they were recorded.
    pub fn errors(&self) -> impl Iterator<Item = &SaveError> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl From<SaveError> for SaveFailure {
    fn from(error: SaveError) -> Self {
        SaveFailure {
            first: error,
            rest: Vec::new(),
        }
    }
}

impl fmt::Display for SaveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)
    }
}

impl std::error::Error for SaveFailure {}
