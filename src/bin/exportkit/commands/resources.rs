//! `exportkit resources` command

use anyhow::Result;

use crate::cli::ResourcesArgs;
use crate::commands::{load_project, report_other_errors};
use exportkit::ProjectSaver;

pub fn execute(args: ResourcesArgs) -> Result<()> {
    let mut project = load_project(args.path.as_deref())?;

    let report = ProjectSaver::new(&mut project)
        .save_resources_only()
        .inspect_err(report_other_errors)?;

    eprintln!("     Resources {} files written", report.written.len());
    Ok(())
}
