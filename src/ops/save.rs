//! Implementation of `exportkit save`.
//!
//! A save runs through fixed stages:
//!
//! ```text
//! Init -> ValidateModules -> WriteMainFile -> ComputeRootHash
//!      -> WriteGeneratedArtifacts -> WriteTargets -> RunPostHook
//!      -> RewriteMainFile (only if the root changed) -> Reclaim -> Done
//! ```
//!
//! Module validation and creating the generated-code folder are the only
//! gates that stop a save early. Every other failure is recorded and the
//! save carries on; the result is a failure if anything was recorded.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::core::module::Module;
use crate::core::project::{ProjectDescription, TargetConfig};
use crate::export::context::SaveContext;
use crate::export::error::{SaveError, SaveFailure};
use crate::export::hook::{run_post_export_hook, HOOK_TIMEOUT};
use crate::export::reclaim::reclaim;
use crate::export::scheduler::{select_targets, LiveProject, SaveMode, ScheduleInputs, Scheduler};
use crate::export::writer::WriterRegistry;
use crate::generator::{BinaryDataEmbedder, Synthesizer};
use crate::resolver::resolve_modules;

/// Stages of a full save, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    Init,
    ValidateModules,
    WriteMainFile,
    ComputeRootHash,
    WriteGeneratedArtifacts,
    WriteTargets,
    RunPostHook,
    RewriteMainFile,
    Reclaim,
    Done,
}

impl fmt::Display for SaveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SaveStage::Init => "init",
            SaveStage::ValidateModules => "validate modules",
            SaveStage::WriteMainFile => "write main file",
            SaveStage::ComputeRootHash => "compute root hash",
            SaveStage::WriteGeneratedArtifacts => "write generated artifacts",
            SaveStage::WriteTargets => "write targets",
            SaveStage::RunPostHook => "run post-export hook",
            SaveStage::RewriteMainFile => "rewrite main file",
            SaveStage::Reclaim => "reclaim",
            SaveStage::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(stage: SaveStage) {
    tracing::debug!("save stage: {}", stage);
}

/// Options for the save command.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Pooled or sequential target scheduling
    pub mode: SaveMode,

    /// Only write the named target
    pub target: Option<String>,

    /// Show a progress bar over targets
    pub progress: bool,

    /// Save the project file under a new path
    pub save_as: Option<PathBuf>,
}

/// What a successful save did.
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    /// Every path produced, changed or not
    pub created: BTreeSet<PathBuf>,

    /// Paths whose bytes changed
    pub written: Vec<PathBuf>,

    /// Stale entries deleted from the generated-code folder
    pub reclaimed: Vec<PathBuf>,

    /// Whether target generation changed the project and forced a re-save
    pub main_file_rewritten: bool,
}

impl SaveReport {
    fn from_context(ctx: &SaveContext) -> Self {
        SaveReport {
            created: ctx.created().snapshot(),
            written: ctx.written(),
            ..SaveReport::default()
        }
    }
}

fn finish(ctx: &SaveContext, report: SaveReport) -> Result<SaveReport, SaveFailure> {
    match ctx.errors().to_failure() {
        Some(failure) => Err(failure),
        None => Ok(report),
    }
}

fn fail(ctx: &SaveContext) -> SaveFailure {
    ctx.errors()
        .to_failure()
        .unwrap_or_else(|| SaveError::io("save aborted").into())
}

/// Saves one project: its main file, generated code and every target.
pub struct ProjectSaver<'p> {
    project: &'p mut ProjectDescription,
    registry: WriterRegistry,
}

impl<'p> ProjectSaver<'p> {
    /// A saver using the built-in target writers.
    pub fn new(project: &'p mut ProjectDescription) -> Self {
        Self::with_registry(project, WriterRegistry::new())
    }

    pub fn with_registry(project: &'p mut ProjectDescription, registry: WriterRegistry) -> Self {
        ProjectSaver { project, registry }
    }

    pub fn project(&self) -> &ProjectDescription {
        &*self.project
    }

    /// Run a full save.
    ///
    /// On failure the project points at the file it had before the call.
    pub fn save(&mut self, opts: &SaveOptions) -> Result<SaveReport, SaveFailure> {
        let old_file = self.project.file().to_path_buf();
        if let Some(path) = &opts.save_as {
            self.project.set_file(path.clone());
        }

        let result = self.run(opts);
        if result.is_err() {
            self.project.set_file(old_file);
        }
        result
    }

    fn run(&mut self, opts: &SaveOptions) -> Result<SaveReport, SaveFailure> {
        enter(SaveStage::Init);
        let all_targets: Vec<TargetConfig> = self.project.root().targets.clone();
        let selected = select_targets(&all_targets, opts.target.as_deref())?;
        let ctx = SaveContext::new(self.project.line_ending());

        enter(SaveStage::ValidateModules);
        let modules = self.resolve()?;

        enter(SaveStage::WriteMainFile);
        if !self.write_main_file(&ctx) {
            return Err(fail(&ctx));
        }
        self.project.update_modification_time();

        enter(SaveStage::ComputeRootHash);
        let root_hash = self.root_hash(&ctx);

        enter(SaveStage::WriteGeneratedArtifacts);
        let generated_group = {
            let mut synth = Synthesizer::new(self.project, &modules, &ctx);
            let user_content = synth.load_user_content();
            if !synth.write_all(&user_content) {
                return Err(fail(&ctx));
            }
            synth.into_group()
        };

        enter(SaveStage::WriteTargets);
        let project_folder = self.project.project_folder().to_path_buf();
        let generated_dir = self.project.generated_dir();
        let settings = self.project.settings().clone();
        let main_group = self.project.root().main_group.clone();
        {
            let inputs = ScheduleInputs {
                ctx: &ctx,
                settings: &settings,
                modules: &modules,
                project_folder: &project_folder,
                generated_dir: &generated_dir,
                main_group: &main_group,
                generated_group: &generated_group,
                registry: &self.registry,
            };
            let live = LiveProject::new(self.project.root_mut());
            Scheduler::new(inputs, opts.mode)
                .with_progress(opts.progress)
                .write_targets(&all_targets, &selected, &live);
        }

        enter(SaveStage::RunPostHook);
        if let Some(command) = self.project.post_export_shell_command() {
            let command = command.to_string();
            if let Err(e) = run_post_export_hook(&command, &project_folder, HOOK_TIMEOUT) {
                ctx.add_error(e);
            }
        }

        let mut main_file_rewritten = false;
        if root_hash.is_some() && self.root_hash(&ctx) != root_hash {
            enter(SaveStage::RewriteMainFile);
            tracing::debug!("project changed while writing targets, saving it again");
            self.write_main_file(&ctx);
            self.project.update_modification_time();
            main_file_rewritten = true;
        }

        let mut reclaimed = Vec::new();
        if generated_dir.is_dir() {
            enter(SaveStage::Reclaim);
            Synthesizer::new(self.project, &modules, &ctx).write_readme();
            reclaimed = reclaim(&generated_dir, ctx.created()).removed;
        }

        enter(SaveStage::Done);
        let report = SaveReport {
            reclaimed,
            main_file_rewritten,
            ..SaveReport::from_context(&ctx)
        };
        finish(&ctx, report)
    }

    /// Write only the embedded binary data.
    pub fn save_resources_only(&mut self) -> Result<SaveReport, SaveFailure> {
        let ctx = SaveContext::new(self.project.line_ending());
        let produced = BinaryDataEmbedder::new(self.project, &ctx).write();
        tracing::debug!("binary data: {} files", produced.len());
        finish(&ctx, SaveReport::from_context(&ctx))
    }

    /// Write the generated code a live build needs, and nothing else.
    ///
    /// The main file, targets and the reclaimer are left alone.
    pub fn save_content_for_live_build(&mut self) -> Result<SaveReport, SaveFailure> {
        let ctx = SaveContext::new(self.project.line_ending());
        let modules = self.resolve()?;

        let mut synth = Synthesizer::new(self.project, &modules, &ctx);
        let user_content = synth.load_user_content();
        if !synth.write_all(&user_content) {
            return Err(fail(&ctx));
        }
        finish(&ctx, SaveReport::from_context(&ctx))
    }

    fn resolve(&self) -> Result<Vec<Module>, SaveFailure> {
        let modules = resolve_modules(&self.project.root().modules, self.project.project_folder())
            .map_err(SaveError::from)?;
        tracing::debug!("resolved {} modules", modules.len());
        Ok(modules)
    }

    fn write_main_file(&self, ctx: &SaveContext) -> bool {
        match self.project.serialize() {
            Ok(text) => ctx.replace_file_if_different(self.project.file(), &text),
            Err(e) => {
                tracing::debug!("{:#}", e);
                ctx.add_error(SaveError::io(format!(
                    "Failed to write main project file: {}",
                    self.project.file().display()
                )));
                false
            }
        }
    }

    fn root_hash(&self, ctx: &SaveContext) -> Option<String> {
        match self.project.root_hash() {
            Ok(hash) => Some(hash),
            Err(e) => {
                ctx.add_error(SaveError::io(format!("{:#}", e)));
                None
            }
        }
    }
}

/// Save `project` with `opts` using the built-in writers.
pub fn save(project: &mut ProjectDescription, opts: &SaveOptions) -> Result<SaveReport, SaveFailure> {
    ProjectSaver::new(project).save(opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::group::FileGroup;
    use crate::core::project::{TargetFormat, PROJECT_FILE_NAME};
    use crate::core::target::ExportTarget;
    use crate::export::writer::{TargetWriter, WriteContext};
    use crate::generator::binary_data::parse_unit_arrays;
    use crate::generator::user_section::{BEGIN_MARKER, END_MARKER};
    use crate::test_support::{list_tree, TestProject};
    use anyhow::{Context, Result};
    use std::fs;
    use std::path::Path;

    fn headless() -> SaveOptions {
        SaveOptions {
            mode: SaveMode::Headless,
            ..SaveOptions::default()
        }
    }

    fn interactive() -> SaveOptions {
        SaveOptions {
            mode: SaveMode::Interactive { jobs: Some(4) },
            ..SaveOptions::default()
        }
    }

    fn demo() -> TestProject {
        TestProject::new("Demo")
            .source("Source/Main.cpp", "int main() { return 0; }\n")
            .module("core", &[])
            .module("gui", &["core"])
            .target("Linux", TargetFormat::Makefile)
            .target("Index", TargetFormat::CompileManifest)
            .target("CMake", TargetFormat::CMake)
    }

    #[test]
    fn test_full_save() {
        let (tmp, mut project) = demo().build();

        let report = save(&mut project, &interactive()).unwrap();
        let gen = tmp.path().join("GeneratedCode");

        assert!(tmp.path().join(PROJECT_FILE_NAME).is_file());
        for name in ["AppConfig.h", "ProjectHeader.h", "ReadMe.txt", "include_core.cpp", "include_gui.cpp"] {
            assert!(gen.join(name).is_file(), "missing {}", name);
        }
        assert!(tmp.path().join("Builds/Linux/Makefile").is_file());
        assert!(tmp.path().join("Builds/Index/Index.json").is_file());
        assert!(tmp.path().join("Builds/CMake/CMakeLists.txt").is_file());

        // search path added while writing targets forces one re-save
        assert!(report.main_file_rewritten);
        let saved = ProjectDescription::load(&tmp.path().join(PROJECT_FILE_NAME)).unwrap();
        assert_eq!(saved.root().targets[0].extra_search_paths, vec!["GeneratedCode".to_string()]);
        assert!(saved.root().targets[2].extra_search_paths.is_empty());
    }

    #[test]
    fn test_second_save_rewrites_nothing() {
        let (tmp, mut project) = demo().resource("Resources/logo.png", b"\x89PNG....").build();

        save(&mut project, &interactive()).unwrap();
        let before: Vec<(String, Vec<u8>)> = list_tree(tmp.path())
            .into_iter()
            .map(|f| {
                let bytes = fs::read(tmp.path().join(&f)).unwrap();
                (f, bytes)
            })
            .collect();

        let report = save(&mut project, &headless()).unwrap();
        assert!(report.written.is_empty(), "rewrote {:?}", report.written);
        assert!(!report.main_file_rewritten);

        for (file, bytes) in before {
            assert_eq!(fs::read(tmp.path().join(&file)).unwrap(), bytes, "{} changed", file);
        }
    }

    #[test]
    fn test_user_section_survives_save() {
        let custom = "#define MY_OWN_SETTING 42\n";
        let existing = format!("// header\n{}\n{}{}\n// rest\n", BEGIN_MARKER, custom, END_MARKER);
        let (tmp, mut project) = demo().file("GeneratedCode/AppConfig.h", existing).build();

        save(&mut project, &headless()).unwrap();

        let text = fs::read_to_string(tmp.path().join("GeneratedCode/AppConfig.h")).unwrap();
        let block = format!("{}\n{}{}", BEGIN_MARKER, custom, END_MARKER);
        assert!(text.contains(&block));
        assert!(!text.contains("// header"));
    }

    #[test]
    fn test_stale_files_are_reclaimed() {
        let (tmp, mut project) = demo()
            .file("GeneratedCode/old_module.cpp", "stale")
            .file("GeneratedCode/nested/leftover.h", "stale")
            .file("GeneratedCode/.gitignore", "*.o\n")
            .file("GeneratedCode/BinaryData3.cpp", "stale")
            .build();

        let report = save(&mut project, &headless()).unwrap();
        let gen = tmp.path().join("GeneratedCode");

        assert!(!gen.join("old_module.cpp").exists());
        assert!(!gen.join("nested").exists());
        assert!(!gen.join("BinaryData3.cpp").exists());
        assert!(gen.join(".gitignore").exists());
        assert!(gen.join("AppConfig.h").exists());
        assert!(!report.reclaimed.is_empty());
    }

    #[test]
    fn test_missing_dependency_writes_nothing() {
        let (tmp, mut project) = TestProject::new("Demo")
            .module("A", &["B"])
            .target("Linux", TargetFormat::Makefile)
            .build();

        let err = save(&mut project, &headless()).unwrap_err();

        assert!(matches!(err.first(), SaveError::Validation(_)));
        assert!(err.to_string().contains("B"));
        assert!(!tmp.path().join("GeneratedCode").exists());
        assert!(!tmp.path().join("Builds").exists());
        assert!(!tmp.path().join(PROJECT_FILE_NAME).exists());
    }

    #[test]
    fn test_invalid_module_path_aborts() {
        let (tmp, mut project) = TestProject::new("Demo")
            .missing_module("ghost")
            .target("Linux", TargetFormat::Makefile)
            .build();

        let err = save(&mut project, &headless()).unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert!(!tmp.path().join("GeneratedCode").exists());
    }

    #[test]
    fn test_zero_targets_then_one() {
        let (tmp, mut project) = TestProject::new("Demo").build();

        let err = save(&mut project, &headless()).unwrap_err();
        assert_eq!(err.first(), &SaveError::NoTargets);
        assert!(err.to_string().contains("No targets"));
        assert!(!tmp.path().join(PROJECT_FILE_NAME).exists());

        project.root_mut().targets.push(TargetConfig::new(
            "Linux",
            TargetFormat::Makefile,
            "Builds/Linux",
        ));
        save(&mut project, &headless()).unwrap();
        assert!(tmp.path().join("Builds/Linux/Makefile").is_file());
    }

    /// Adds `X` to its private generated group and lists every file.
    struct MarkingWriter;

    impl TargetWriter for MarkingWriter {
        fn format(&self) -> TargetFormat {
            TargetFormat::Makefile
        }

        fn description(&self) -> &'static str {
            "marks its group"
        }

        fn write(&self, target: &mut ExportTarget, cx: &WriteContext<'_>) -> Result<Vec<PathBuf>> {
            let x = target.project_folder.join("X");
            let group: &mut FileGroup = target.groups.last_mut().context("no generated group")?;
            group.add_file(x, false);

            let listing: Vec<String> = target
                .all_files()
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            let path = target.folder.join("files.txt");
            cx.write_file(&path, &listing.join("\n"))?;
            Ok(vec![path])
        }
    }

    #[test]
    fn test_targets_do_not_share_generated_group() {
        let (tmp, mut project) = TestProject::new("Demo")
            .module("core", &[])
            .target("One", TargetFormat::Makefile)
            .target("Two", TargetFormat::Makefile)
            .target("Three", TargetFormat::Makefile)
            .build();

        let mut registry = WriterRegistry::new();
        registry.register(Box::new(MarkingWriter));
        ProjectSaver::with_registry(&mut project, registry)
            .save(&interactive())
            .unwrap();

        for name in ["One", "Two", "Three"] {
            let listing = fs::read_to_string(tmp.path().join("Builds").join(name).join("files.txt")).unwrap();
            let count = listing.lines().filter(|l| Path::new(l).ends_with("X")).count();
            assert_eq!(count, 1, "{} lists X {} times", name, count);
        }
    }

    #[test]
    fn test_resources_split_across_units() {
        let a: Vec<u8> = (0u8..40).collect();
        let b: Vec<u8> = (100u8..130).collect();
        let c = b"tiny".to_vec();
        let (tmp, mut project) = TestProject::new("Demo")
            .resource("Resources/a.bin", &a)
            .resource("Resources/b.bin", &b)
            .resource("Resources/c.txt", &c)
            .target("Linux", TargetFormat::Makefile)
            .with(|root| root.project.max_binary_file_size = Some(48))
            .build();

        save(&mut project, &headless()).unwrap();

        let gen = tmp.path().join("GeneratedCode");
        let units: Vec<PathBuf> = (1..=20)
            .map(|i| gen.join(format!("BinaryData{}.cpp", i)))
            .filter(|p| p.exists())
            .collect();
        assert!(units.len() > 1);

        let mut arrays: Vec<Vec<u8>> = units
            .iter()
            .flat_map(|u| parse_unit_arrays(&fs::read_to_string(u).unwrap()))
            .collect();
        arrays.sort();
        let mut expected = vec![a, b, c];
        expected.sort();
        assert_eq!(arrays, expected);
    }

    #[test]
    fn test_removing_resources_deletes_binary_data() {
        let (tmp, mut project) = demo().resource("Resources/logo.png", b"png").build();
        save(&mut project, &headless()).unwrap();
        assert!(tmp.path().join("GeneratedCode/BinaryData.h").exists());

        project.root_mut().resources.clear();
        save(&mut project, &headless()).unwrap();
        assert!(!tmp.path().join("GeneratedCode/BinaryData.h").exists());
        assert!(!tmp.path().join("GeneratedCode/BinaryData1.cpp").exists());
    }

    #[test]
    fn test_single_target_selection() {
        let (tmp, mut project) = demo().build();
        let opts = SaveOptions {
            target: Some("Index".to_string()),
            ..headless()
        };

        save(&mut project, &opts).unwrap();
        assert!(tmp.path().join("Builds/Index/Index.json").is_file());
        assert!(!tmp.path().join("Builds/Linux").exists());

        let opts = SaveOptions {
            target: Some("Xcode".to_string()),
            ..headless()
        };
        let err = save(&mut project, &opts).unwrap_err();
        assert!(matches!(err.first(), SaveError::Configuration(_)));
    }

    #[test]
    fn test_failed_save_as_restores_file() {
        let (tmp, mut project) = TestProject::new("Demo")
            .module("A", &["B"])
            .target("Linux", TargetFormat::Makefile)
            .build();
        let original = project.file().to_path_buf();

        let opts = SaveOptions {
            save_as: Some(tmp.path().join("Other.toml")),
            ..headless()
        };
        save(&mut project, &opts).unwrap_err();
        assert_eq!(project.file(), original);
    }

    #[test]
    fn test_save_as_moves_project_file() {
        let (tmp, mut project) = demo().build();
        let target = tmp.path().join("Renamed.toml");
        let opts = SaveOptions {
            save_as: Some(target.clone()),
            ..headless()
        };

        save(&mut project, &opts).unwrap();
        assert_eq!(project.file(), target);
        assert!(target.is_file());
    }

    #[test]
    fn test_generated_dir_failure_stops_before_targets() {
        let (tmp, mut project) = demo().file("GeneratedCode", "not a folder").build();

        let err = save(&mut project, &headless()).unwrap_err();
        assert!(err.to_string().starts_with("Couldn't create folder:"));
        assert!(!tmp.path().join("Builds").exists());
    }

    #[test]
    fn test_failing_target_is_reported_but_siblings_written() {
        let (tmp, mut project) = demo().file("Builds/Index", "in the way").build();

        let err = save(&mut project, &interactive()).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.to_string().starts_with("Can't create folder:"));
        assert!(tmp.path().join("Builds/Linux/Makefile").is_file());
        assert!(tmp.path().join("GeneratedCode/ReadMe.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_post_export_hook() {
        let (tmp, mut project) = demo()
            .with(|root| {
                root.project.post_export_shell_command_posix = Some("touch %%1%%/exported".to_string())
            })
            .build();

        save(&mut project, &headless()).unwrap();
        assert!(tmp.path().join("exported").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_hook_does_not_stop_save() {
        let (tmp, mut project) = demo()
            .with(|root| root.project.post_export_shell_command_posix = Some("exit 3".to_string()))
            .build();

        let err = save(&mut project, &headless()).unwrap_err();
        assert!(matches!(err.first(), SaveError::ExternalTool(_)));
        assert!(err.to_string().ends_with("failed with exit code: 3"));
        assert!(tmp.path().join("GeneratedCode/ReadMe.txt").is_file());
    }

    #[test]
    fn test_save_resources_only() {
        let (tmp, mut project) = demo().resource("Resources/logo.png", b"png").build();

        ProjectSaver::new(&mut project).save_resources_only().unwrap();

        assert_eq!(
            list_tree(&tmp.path().join("GeneratedCode")),
            vec!["BinaryData.h".to_string(), "BinaryData1.cpp".to_string()]
        );
        assert!(!tmp.path().join(PROJECT_FILE_NAME).exists());
    }

    #[test]
    fn test_save_content_for_live_build() {
        let (tmp, mut project) = demo().build();

        ProjectSaver::new(&mut project)
            .save_content_for_live_build()
            .unwrap();

        assert!(tmp.path().join("GeneratedCode/AppConfig.h").is_file());
        assert!(tmp.path().join("GeneratedCode/include_gui.cpp").is_file());
        assert!(!tmp.path().join("Builds").exists());
        assert!(!tmp.path().join(PROJECT_FILE_NAME).exists());
    }
}
