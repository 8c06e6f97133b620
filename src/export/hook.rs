//! Post-export hook.

use std::path::Path;
use std::time::Duration;

use crate::core::project::PROJECT_FOLDER_PLACEHOLDER;
use crate::export::error::SaveError;
use crate::util::process::{ProcessBuilder, ProcessOutcome};

/// How long the hook may run before it is abandoned.
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Substitute the project folder into a command template.
pub fn expand_command(template: &str, project_folder: &Path) -> String {
    template.replace(
        PROJECT_FOLDER_PLACEHOLDER,
        &project_folder.display().to_string(),
    )
}

/// Run the post-export command through the host shell.
///
/// An empty command does nothing.
pub fn run_post_export_hook(
    template: &str,
    project_folder: &Path,
    timeout: Duration,
) -> Result<(), SaveError> {
    let command = expand_command(template, project_folder);
    if command.trim().is_empty() {
        return Ok(());
    }

    let process = ProcessBuilder::shell(&command).cwd(project_folder);
    let command_line = process.display_command();
    tracing::debug!("running post-export command: {}", command_line);

    match process.exec_with_timeout(timeout) {
        Err(e) => {
            tracing::debug!("{:#}", e);
            Err(SaveError::ExternalTool(format!(
                "Failed to run shell command: {}",
                command_line
            )))
        }
        Ok(ProcessOutcome::TimedOut) => Err(SaveError::ExternalTool(format!(
            "Timeout running shell command: {}",
            command_line
        ))),
        Ok(ProcessOutcome::Exited(status)) if !status.success() => {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            Err(SaveError::ExternalTool(format!(
                "Shell command: {} failed with exit code: {}",
                command_line, code
            )))
        }
        Ok(ProcessOutcome::Exited(_)) => Ok(()),
    }
}
