//! Export scheduling - writing every selected target.
//!
//! Standard targets are independent: each one works on its own folder and
//! its own deep copy of the generated-files group, so in interactive mode
//! they are written on a worker pool. The aggregator summarises the
//! standard targets and always runs afterwards, on the calling thread.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::core::group::FileGroup;
use crate::core::module::Module;
use crate::core::project::{ProjectRoot, ProjectSettings, TargetConfig};
use crate::core::target::{ExportTarget, TargetKind};
use crate::export::context::SaveContext;
use crate::export::error::SaveError;
use crate::export::writer::{TargetSummary, WriteContext, WriterRegistry};
use crate::util::fs::to_unix_string;

/// How targets are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Standard targets run on a worker pool of `jobs` threads (all cores
    /// when unset).
    Interactive { jobs: Option<usize> },
    /// Everything runs sequentially on the calling thread.
    Headless,
}

impl Default for SaveMode {
    fn default() -> Self {
        SaveMode::Interactive { jobs: None }
    }
}

/// Pick the targets to write and check the target set is consistent.
///
/// Returned in configuration order.
pub fn select_targets<'c>(
    configs: &'c [TargetConfig],
    selected: Option<&str>,
) -> Result<Vec<&'c TargetConfig>, SaveError> {
    if configs.is_empty() {
        return Err(SaveError::NoTargets);
    }

    let mut names = HashSet::new();
    for config in configs {
        if !names.insert(config.name.as_str()) {
            return Err(SaveError::Configuration(format!(
                "target name `{}` is used more than once",
                config.name
            )));
        }
    }

    let aggregators: Vec<&str> = configs
        .iter()
        .filter(|c| c.format.kind() == TargetKind::Aggregator)
        .map(|c| c.name.as_str())
        .collect();
    if aggregators.len() > 1 {
        return Err(SaveError::Configuration(format!(
            "only one aggregator target is allowed, found: {}",
            aggregators.join(", ")
        )));
    }

    match selected {
        None => Ok(configs.iter().collect()),
        Some(name) => configs
            .iter()
            .find(|c| c.name == name)
            .map(|c| vec![c])
            .ok_or_else(|| SaveError::Configuration(format!("no target named `{}`", name))),
    }
}

/// The caller's project root, shared with target jobs for the few edits
/// they are allowed to make.
pub struct LiveProject<'p> {
    root: RwLock<&'p mut ProjectRoot>,
}

impl<'p> LiveProject<'p> {
    pub fn new(root: &'p mut ProjectRoot) -> Self {
        LiveProject {
            root: RwLock::new(root),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, &'p mut ProjectRoot> {
        self.root.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a search path to the live entry of `target`.
    ///
    /// Returns `true` if the project changed.
    pub fn add_extra_search_path(&self, target: &str, path: &str) -> bool {
        let mut root = self.write();
        match root.target_mut(target) {
            Some(config) => config.add_extra_search_path(path),
            None => false,
        }
    }
}

/// Read-only inputs for writing targets.
#[derive(Clone, Copy)]
pub struct ScheduleInputs<'a> {
    pub ctx: &'a SaveContext,
    pub settings: &'a ProjectSettings,
    pub modules: &'a [Module],
    pub project_folder: &'a Path,
    pub generated_dir: &'a Path,
    /// The project's own source tree
    pub main_group: &'a FileGroup,
    /// Pristine generated-files group; copied, never edited
    pub generated_group: &'a FileGroup,
    pub registry: &'a WriterRegistry,
}

/// Writes a set of targets.
pub struct Scheduler<'a> {
    inputs: ScheduleInputs<'a>,
    mode: SaveMode,
    progress: bool,
}

impl<'a> Scheduler<'a> {
    pub fn new(inputs: ScheduleInputs<'a>, mode: SaveMode) -> Self {
        Scheduler {
            inputs,
            mode,
            progress: false,
        }
    }

    /// Show a progress bar over targets in interactive mode.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Write `selected`, then the aggregator if one is among them.
    ///
    /// `all` is the full target list; the aggregator summarises every
    /// standard target in it. Failures are recorded in the save context.
    pub fn write_targets(&self, all: &[TargetConfig], selected: &[&TargetConfig], live: &LiveProject<'_>) {
        let mut standard = Vec::new();
        let mut aggregator = None;

        for config in selected {
            let Some(target) = self.prepare(config) else {
                continue;
            };
            if target.is_aggregator() {
                aggregator = Some(target);
            } else {
                standard.push(target);
            }
        }

        let progress = self.progress_bar(standard.len() + usize::from(aggregator.is_some()));
        self.write_standard_targets(&mut standard, live, progress.as_ref());

        if let Some(mut target) = aggregator {
            let siblings: Vec<TargetSummary> = all
                .iter()
                .filter(|c| c.format.kind() == TargetKind::Standard)
                .map(|c| TargetSummary::from_config(c, self.inputs.project_folder))
                .collect();

            if let Err(e) = self.run_job(&mut target, &siblings, None) {
                self.inputs.ctx.add_error(e);
            }
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
    }

    /// Build the private view of one target.
    ///
    /// Returns `None` (with the error recorded) if its folder can't be made.
    fn prepare(&self, config: &TargetConfig) -> Option<ExportTarget> {
        let inputs = &self.inputs;
        let mut target = ExportTarget::from_config(config, inputs.project_folder);

        if let Err(e) = target.create_folder() {
            tracing::debug!("{:#}", e);
            inputs.ctx.add_error(SaveError::io(format!(
                "Can't create folder: {}",
                target.folder.display()
            )));
            return None;
        }

        target.copy_main_group(inputs.main_group);

        if target.kind() == TargetKind::Standard {
            target.add_to_extra_search_paths(inputs.generated_dir);

            let mut group = inputs.generated_group.clone();
            target.add_settings_for_project_type(inputs.settings.project_type);
            for module in inputs.modules {
                target.add_module_settings(module, &mut group, inputs.generated_dir);
            }
            group.sort_alphabetically();
            target.groups.push(group);
        }

        Some(target)
    }

    fn write_standard_targets(
        &self,
        targets: &mut [ExportTarget],
        live: &LiveProject<'_>,
        progress: Option<&ProgressBar>,
    ) {
        let results: Vec<Result<(), SaveError>> = match self.pool() {
            Some(pool) => pool.install(|| {
                targets
                    .par_iter_mut()
                    .map(|target| {
                        let result = self.run_job(target, &[], Some(live));
                        if let Some(pb) = progress {
                            pb.inc(1);
                        }
                        result
                    })
                    .collect()
            }),
            None => targets
                .iter_mut()
                .map(|target| {
                    let result = self.run_job(target, &[], Some(live));
                    if let Some(pb) = progress {
                        pb.inc(1);
                    }
                    result
                })
                .collect(),
        };

        for result in results {
            if let Err(e) = result {
                self.inputs.ctx.add_error(e);
            }
        }
    }

    fn pool(&self) -> Option<rayon::ThreadPool> {
        let SaveMode::Interactive { jobs } = self.mode else {
            return None;
        };

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = jobs {
            builder = builder.num_threads(jobs.max(1));
        }
        match builder.build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!("couldn't start worker pool, writing targets sequentially: {}", e);
                None
            }
        }
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.progress || self.mode == SaveMode::Headless || total < 2 {
            return None;
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("Saving targets");
        Some(pb)
    }

    /// Write one target, turning any failure or panic into one error.
    fn run_job(
        &self,
        target: &mut ExportTarget,
        siblings: &[TargetSummary],
        live: Option<&LiveProject<'_>>,
    ) -> Result<(), SaveError> {
        let inputs = &self.inputs;
        let name = target.name.clone();

        let Some(writer) = inputs.registry.get(target.format) else {
            return Err(SaveError::Aggregation {
                target: name,
                message: format!("no writer registered for format `{}`", target.format.as_str()),
            });
        };

        tracing::debug!("{}: writing {}", name, writer.description());

        if let Some(live) = live {
            let path = to_unix_string(&inputs.settings.generated_dir);
            if live.add_extra_search_path(&name, &path) {
                tracing::debug!("{}: added search path {}", name, path);
            }
        }

        let cx = WriteContext {
            save: inputs.ctx,
            settings: inputs.settings,
            modules: inputs.modules,
            project_folder: inputs.project_folder,
            generated_dir: inputs.generated_dir,
            siblings,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| writer.write(target, &cx)));
        match outcome {
            Ok(Ok(files)) => {
                tracing::debug!("{}: wrote {} files", name, files.len());
                tracing::info!("Finished saving: {}", name);
                Ok(())
            }
            Ok(Err(e)) => Err(SaveError::aggregation(name, &e)),
            Err(payload) => Err(SaveError::Aggregation {
                target: name,
                message: format!("writer panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::{LineEnding, TargetFormat};
    use crate::export::writer::TargetWriter;
    use anyhow::Result;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn configs() -> Vec<TargetConfig> {
        vec![
            TargetConfig::new("Make", TargetFormat::Makefile, "Builds/Make"),
            TargetConfig::new("CMake", TargetFormat::CMake, "Builds/CMake"),
            TargetConfig::new("Index", TargetFormat::CompileManifest, "Builds/Index"),
        ]
    }

    #[test]
    fn test_select_all_targets() {
        let configs = configs();
        let selected = select_targets(&configs, None).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_select_one_target() {
        let configs = configs();
        let selected = select_targets(&configs, Some("Index")).unwrap();
        assert_eq!(selected[0].name, "Index");

        let err = select_targets(&configs, Some("Xcode")).unwrap_err();
        assert!(matches!(err, SaveError::Configuration(_)));
    }

    #[test]
    fn test_select_rejects_bad_target_sets() {
        assert_eq!(select_targets(&[], None).unwrap_err(), SaveError::NoTargets);

        let mut configs = configs();
        configs.push(TargetConfig::new("CMake 2", TargetFormat::CMake, "Builds/CMake2"));
        assert!(matches!(select_targets(&configs, None), Err(SaveError::Configuration(_))));

        let mut configs = self::configs();
        configs.push(TargetConfig::new("Make", TargetFormat::Makefile, "Builds/Other"));
        assert!(matches!(select_targets(&configs, None), Err(SaveError::Configuration(_))));
    }

    #[test]
    fn test_live_project_add_search_path() {
        let mut root = ProjectRoot::new("Demo");
        root.targets = configs();

        let live = LiveProject::new(&mut root);
        assert!(live.add_extra_search_path("Make", "GeneratedCode"));
        assert!(!live.add_extra_search_path("Make", "GeneratedCode"));
        assert!(!live.add_extra_search_path("Missing", "GeneratedCode"));
        drop(live);

        assert_eq!(root.targets[0].extra_search_paths, vec!["GeneratedCode".to_string()]);
    }

    struct PanickingWriter;

    impl TargetWriter for PanickingWriter {
        fn format(&self) -> TargetFormat {
            TargetFormat::CompileManifest
        }

        fn description(&self) -> &'static str {
            "always panics"
        }

        fn write(&self, _: &mut ExportTarget, _: &WriteContext<'_>) -> Result<Vec<PathBuf>> {
            panic!("boom");
        }
    }

    fn run(mode: SaveMode, registry: &WriterRegistry, tmp: &TempDir) -> (SaveContext, ProjectRoot) {
        run_targets(configs(), mode, registry, tmp)
    }

    fn run_targets(
        targets: Vec<TargetConfig>,
        mode: SaveMode,
        registry: &WriterRegistry,
        tmp: &TempDir,
    ) -> (SaveContext, ProjectRoot) {
        let ctx = SaveContext::new(LineEnding::Lf);
        let mut root = ProjectRoot::new("Demo");
        root.targets = targets;
        let all = root.targets.clone();
        let settings = root.project.clone();
        let main_group = FileGroup::new("Source");
        let generated = FileGroup::new("Generated Code");
        let generated_dir = tmp.path().join("GeneratedCode");

        {
            let inputs = ScheduleInputs {
                ctx: &ctx,
                settings: &settings,
                modules: &[],
                project_folder: tmp.path(),
                generated_dir: &generated_dir,
                main_group: &main_group,
                generated_group: &generated,
                registry,
            };
            let selected = select_targets(&all, None).unwrap();
            let live = LiveProject::new(&mut root);
            Scheduler::new(inputs, mode).write_targets(&all, &selected, &live);
        }
        (ctx, root)
    }

    #[test]
    fn test_write_targets_headless() {
        let tmp = TempDir::new().unwrap();
        let (ctx, root) = run(SaveMode::Headless, &WriterRegistry::new(), &tmp);

        assert!(!ctx.has_errors(), "{:?}", ctx.errors().snapshot());
        assert!(tmp.path().join("Builds/Make/Makefile").exists());
        assert!(tmp.path().join("Builds/Index/Index.json").exists());

        let cmake = fs::read_to_string(tmp.path().join("Builds/CMake/CMakeLists.txt")).unwrap();
        assert!(cmake.contains("# Make (makefile)"));
        assert!(cmake.contains("# Index (compile-manifest)"));

        assert_eq!(root.targets[0].extra_search_paths, vec!["GeneratedCode".to_string()]);
        assert!(root.targets[1].extra_search_paths.is_empty());
    }

    #[test]
    fn test_panicking_target_does_not_stop_siblings() {
        let tmp = TempDir::new().unwrap();
        let mut registry = WriterRegistry::new();
        registry.register(Box::new(PanickingWriter));

        let (ctx, _) = run(SaveMode::Interactive { jobs: Some(2) }, &registry, &tmp);

        let errors = ctx.errors().snapshot();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "Index: writer panicked: boom");
        assert!(tmp.path().join("Builds/Make/Makefile").exists());
        assert!(tmp.path().join("Builds/CMake/CMakeLists.txt").exists());
    }

    const DONE_FILE: &str = "done.txt";

    /// Takes a while, then leaves a marker in the target folder.
    struct SlowWriter(TargetFormat);

    impl TargetWriter for SlowWriter {
        fn format(&self) -> TargetFormat {
            self.0
        }

        fn description(&self) -> &'static str {
            "sleeps then writes a marker"
        }

        fn write(&self, target: &mut ExportTarget, cx: &WriteContext<'_>) -> Result<Vec<PathBuf>> {
            std::thread::sleep(std::time::Duration::from_millis(50));
            let path = target.folder.join(DONE_FILE);
            cx.write_file(&path, &target.name)?;
            Ok(vec![path])
        }
    }

    /// Fails unless every standard sibling has already finished.
    struct CheckingAggregator {
        expected: usize,
    }

    impl TargetWriter for CheckingAggregator {
        fn format(&self) -> TargetFormat {
            TargetFormat::CMake
        }

        fn description(&self) -> &'static str {
            "checks sibling output"
        }

        fn write(&self, target: &mut ExportTarget, cx: &WriteContext<'_>) -> Result<Vec<PathBuf>> {
            if cx.siblings.len() != self.expected {
                anyhow::bail!("got {} siblings", cx.siblings.len());
            }
            for sibling in cx.siblings {
                if !sibling.folder.join(DONE_FILE).is_file() {
                    anyhow::bail!("{} not finished", sibling.name);
                }
            }
            let path = target.folder.join("summary.txt");
            cx.write_file(&path, "ok")?;
            Ok(vec![path])
        }
    }

    #[test]
    fn test_aggregator_runs_after_standard_targets() {
        let tmp = TempDir::new().unwrap();
        let mut registry = WriterRegistry::new();
        registry.register(Box::new(SlowWriter(TargetFormat::Makefile)));
        registry.register(Box::new(SlowWriter(TargetFormat::CompileManifest)));
        registry.register(Box::new(CheckingAggregator { expected: 6 }));

        let mut targets = vec![TargetConfig::new("CMake", TargetFormat::CMake, "Builds/CMake")];
        for i in 0..3 {
            targets.push(TargetConfig::new(
                format!("Make {}", i),
                TargetFormat::Makefile,
                format!("Builds/Make{}", i),
            ));
            targets.push(TargetConfig::new(
                format!("Index {}", i),
                TargetFormat::CompileManifest,
                format!("Builds/Index{}", i),
            ));
        }

        let (ctx, _) = run_targets(targets, SaveMode::Interactive { jobs: Some(4) }, &registry, &tmp);

        assert!(!ctx.has_errors(), "{:?}", ctx.errors().snapshot());
        assert!(tmp.path().join("Builds/CMake/summary.txt").is_file());
        for i in 0..3 {
            assert!(tmp.path().join(format!("Builds/Make{}/{}", i, DONE_FILE)).is_file());
            assert!(tmp.path().join(format!("Builds/Index{}/{}", i, DONE_FILE)).is_file());
        }
    }

    #[test]
    fn test_unwritable_folder_skips_only_that_target() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("Builds")).unwrap();
        fs::write(tmp.path().join("Builds/Make"), "in the way").unwrap();

        let (ctx, _) = run(SaveMode::Headless, &WriterRegistry::new(), &tmp);

        let errors = ctx.errors().snapshot();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("Can't create folder:"));
        assert!(tmp.path().join("Builds/Index/Index.json").exists());
    }
}
