//! Module validation errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why the enabled module set cannot be used.
///
/// Any of these aborts a save before a single file is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("module path for `{module}` is invalid ({}): {reason}", path.display())]
    InvalidModulePath {
        module: String,
        path: PathBuf,
        reason: String,
    },

    #[error("module `{module}` has missing dependencies: {}", missing.join(", "))]
    MissingDependencies { module: String, missing: Vec<String> },

    #[error("module `{0}` is enabled more than once")]
    DuplicateModule(String),

    #[error("cycle detected in module dependencies: {}", modules.join(" -> "))]
    DependencyCycle { modules: Vec<String> },
}

impl ValidationError {
    /// A suggested fix for the user.
    pub fn help(&self) -> &'static str {
        match self {
            ValidationError::InvalidModulePath { .. } => {
                "help: Make sure each module path points at the folder containing the module"
            }
            ValidationError::MissingDependencies { .. } => {
                "help: Enable the listed modules in Export.toml"
            }
            ValidationError::DuplicateModule(_) => {
                "help: Remove the duplicate [[modules]] entry"
            }
            ValidationError::DependencyCycle { .. } => {
                "help: Break the cycle by removing a module dependency"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependencies_message_names_modules() {
        let err = ValidationError::MissingDependencies {
            module: "A".to_string(),
            missing: vec!["B".to_string(), "C".to_string()],
        };
        assert_eq!(err.to_string(), "module `A` has missing dependencies: B, C");
        assert!(err.help().contains("Enable"));
    }

    #[test]
    fn test_cycle_message() {
        let err = ValidationError::DependencyCycle {
            modules: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "cycle detected in module dependencies: a -> b");
    }
}
