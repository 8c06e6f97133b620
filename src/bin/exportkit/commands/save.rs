//! `exportkit save` command

use std::path::Path;

use anyhow::Result;

use crate::cli::SaveArgs;
use crate::commands::{load_project, report_other_errors};
use exportkit::util::config::{global_config_path, load_config, project_config_path, Config};
use exportkit::{ProjectSaver, SaveMode, SaveOptions};

/// Combine the CLI flags with configuration; flags win.
pub fn save_options(args: &SaveArgs, config: &Config) -> SaveOptions {
    let mode = if args.headless || config.headless() {
        SaveMode::Headless
    } else {
        SaveMode::Interactive {
            jobs: args.jobs.or(config.save.jobs),
        }
    };

    SaveOptions {
        mode,
        target: args.target.clone(),
        progress: config.progress(),
        save_as: args.save_as.clone(),
    }
}

pub fn execute(args: SaveArgs) -> Result<()> {
    let mut project = load_project(args.path.as_deref())?;

    let config = load_config(
        &global_config_path().unwrap_or_default(),
        &project_config_path(project.project_folder()),
    );
    let opts = save_options(&args, &config);

    let mut saver = ProjectSaver::new(&mut project);
    let result = if args.live_build {
        saver.save_content_for_live_build()
    } else {
        saver.save(&opts)
    };
    let report = result.inspect_err(report_other_errors)?;

    eprintln!(
        "       Saved {} ({} files written, {} stale removed)",
        display_name(project.file()),
        report.written.len(),
        report.reclaimed.len()
    );
    Ok(())
}

fn display_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}
