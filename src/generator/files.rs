//! Generated file synthesis.
//!
//! The [`Synthesizer`] writes the project-wide generated artifacts and
//! builds the pristine generated-files group that every target later copies.

use std::fmt::{self, Write};
use std::path::PathBuf;

use crate::core::group::FileGroup;
use crate::core::module::Module;
use crate::core::project::{version_as_hex, ProjectDescription, SplashColour};
use crate::export::context::SaveContext;
use crate::export::error::SaveError;
use crate::generator::binary_data::BinaryDataEmbedder;
use crate::generator::user_section::{self, BEGIN_MARKER, END_MARKER};
use crate::generator::{
    include_statement, quoted_c_string, write_auto_gen_warning, APP_CONFIG_FILE_NAME,
    PLUGIN_DEFINES_FILE_NAME, PROJECT_HEADER_FILE_NAME, README_FILE_NAME, SECTION_RULE,
};
use crate::util::fs::ensure_dir;

/// Name of the generated-files group inside each target.
pub const GENERATED_GROUP_NAME: &str = "Generated Code";

/// Writes the generated-code folder.
pub struct Synthesizer<'a> {
    project: &'a ProjectDescription,
    modules: &'a [Module],
    ctx: &'a SaveContext,
    generated_dir: PathBuf,
    group: FileGroup,
    has_binary_data: bool,
}

impl<'a> Synthesizer<'a> {
    pub fn new(project: &'a ProjectDescription, modules: &'a [Module], ctx: &'a SaveContext) -> Self {
        Synthesizer {
            project,
            modules,
            ctx,
            generated_dir: project.generated_dir(),
            group: FileGroup::new(GENERATED_GROUP_NAME),
            has_binary_data: false,
        }
    }

    /// The pristine generated-files group.
    pub fn group(&self) -> &FileGroup {
        &self.group
    }

    pub fn into_group(self) -> FileGroup {
        self.group
    }

    fn app_config_file(&self) -> PathBuf {
        self.generated_dir.join(APP_CONFIG_FILE_NAME)
    }

    fn plugin_defines_file(&self) -> PathBuf {
        self.generated_dir.join(PLUGIN_DEFINES_FILE_NAME)
    }

    /// The user block of the existing app-configuration header, or the
    /// default placeholder.
    pub fn load_user_content(&self) -> String {
        let existing = std::fs::read_to_string(self.app_config_file()).ok();
        user_section::load_or_default(existing.as_deref())
    }

    /// Write every project-wide artifact.
    ///
    /// Returns `false` when the generated-code folder could not be created;
    /// nothing else is attempted in that case.
    pub fn write_all(&mut self, user_content: &str) -> bool {
        if let Err(e) = ensure_dir(&self.generated_dir) {
            tracing::debug!("{:#}", e);
            self.ctx.add_error(SaveError::io(format!(
                "Couldn't create folder: {}",
                self.generated_dir.display()
            )));
            return false;
        }

        self.write_plugin_defines();
        self.write_app_config(user_content);
        self.write_binary_data();
        self.write_project_header();
        self.write_module_wrappers();
        true
    }

    pub fn write_plugin_defines(&mut self) {
        let content = self.render(Self::render_plugin_defines);
        self.write_or_remove(PLUGIN_DEFINES_FILE_NAME, content);
    }

    pub fn write_app_config(&mut self, user_content: &str) {
        let content = self.render(|s, out| s.render_app_config(out, user_content));
        self.write_or_remove(APP_CONFIG_FILE_NAME, content);
    }

    /// Embed the project's resources and list the produced files.
    pub fn write_binary_data(&mut self) {
        let created = BinaryDataEmbedder::new(self.project, self.ctx).write();
        self.has_binary_data = !created.is_empty();

        for file in created {
            let is_header = file.extension().and_then(|e| e.to_str()) == Some("h");
            self.group.add_file_retaining_sort_order(file, !is_header);
        }
    }

    pub fn write_project_header(&mut self) {
        let content = self.render(Self::render_project_header);
        self.save_generated_file(PROJECT_HEADER_FILE_NAME, &content);
    }

    /// One wrapper unit per module compile unit.
    pub fn write_module_wrappers(&mut self) {
        for module in self.modules {
            for unit in module.compile_units() {
                let content = self.render(|s, out| {
                    write_auto_gen_warning(out)?;
                    writeln!(out, "*/")?;
                    writeln!(out)?;
                    if s.project.settings().use_app_config {
                        writeln!(out, "{}", include_statement(APP_CONFIG_FILE_NAME))?;
                    }
                    if unit.is_r_file() {
                        writeln!(out, "#include <{}>", unit.file_name())
                    } else {
                        writeln!(out, "#include <{}/{}>", module.id(), unit.file_name())
                    }
                });

                self.ctx
                    .produce_file(&self.generated_dir.join(unit.proxy_file_name()), &content);
            }
        }
    }

    /// Write the readme warning against manual edits.
    pub fn write_readme(&self) {
        let content = concat!(
            "\n",
            " Important Note!!\n",
            " ================\n",
            "\n",
            "The purpose of this folder is to contain files that are auto-generated by exportkit,\n",
            "and ALL files in this folder will be mercilessly DELETED and completely re-written whenever\n",
            "exportkit saves your project.\n",
            "\n",
            "Therefore, it's a bad idea to make any manual changes to the files in here, or to\n",
            "put any of your own files in here if you don't want to lose them. (Of course you may choose\n",
            "to add the folder's contents to your version-control system so that you can re-merge your own\n",
            "modifications after exportkit has saved its changes).\n",
        );
        self.ctx
            .replace_file_if_different(&self.generated_dir.join(README_FILE_NAME), content);
    }

    fn render<F>(&self, f: F) -> String
    where
        F: FnOnce(&Self, &mut String) -> fmt::Result,
    {
        let mut out = String::new();
        if f(self, &mut out).is_err() {
            out.clear();
        }
        out
    }

    /// Write `content`, or remove the file when there is nothing to write.
    fn write_or_remove(&mut self, name: &str, content: String) {
        if content.is_empty() {
            self.ctx.remove_unneeded_file(&self.generated_dir.join(name));
        } else {
            self.save_generated_file(name, &content);
        }
    }

    fn save_generated_file(&mut self, name: &str, content: &str) -> Option<PathBuf> {
        let path = self.generated_dir.join(name);
        if !self.ctx.produce_file(&path, content) {
            return None;
        }
        let compile = !name.ends_with(".h");
        self.group.add_file(path.clone(), compile);
        Some(path)
    }

    fn plugin_defines_text(&self) -> String {
        let flags = &self.project.root().plugin;
        if flags.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        out.push_str(SECTION_RULE);
        out.push_str("\n// Plugin settings..\n\n");
        for (key, value) in flags {
            out.push_str(&format!(
                "#ifndef  {}\n #define {:<32}  {}\n#endif\n",
                key, key, value
            ));
        }
        out.trim().to_string()
    }

    fn render_plugin_defines(&self, out: &mut String) -> fmt::Result {
        let defines = self.plugin_defines_text();
        if defines.is_empty() {
            return Ok(());
        }

        write_auto_gen_warning(out)?;
        writeln!(out, "*/")?;
        writeln!(out)?;
        writeln!(out, "#pragma once")?;
        writeln!(out)?;
        writeln!(out, "{}", defines)
    }

    fn render_app_config(&self, out: &mut String, user_content: &str) -> fmt::Result {
        let settings = self.project.settings();
        if !settings.use_app_config {
            return Ok(());
        }

        write_auto_gen_warning(out)?;
        writeln!(out, "    There's a section below where you can add your own custom code safely, and")?;
        writeln!(out, "    exportkit will preserve the contents of that block, but the best way to change")?;
        writeln!(out, "    any of these definitions is by editing the project settings.")?;
        writeln!(out)?;
        writeln!(out, "    Any commented-out settings will assume their default values.")?;
        writeln!(out)?;
        writeln!(out, "*/")?;
        writeln!(out)?;
        writeln!(out, "#pragma once")?;
        writeln!(out)?;
        writeln!(out, "{}", SECTION_RULE)?;
        writeln!(out, "{}", BEGIN_MARKER)?;
        write!(out, "{}", user_content)?;
        writeln!(out, "{}", END_MARKER)?;

        if self.plugin_defines_file().is_file() && !self.project.root().plugin.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", include_statement(PLUGIN_DEFINES_FILE_NAME))?;
        }

        writeln!(out)?;
        writeln!(out, "#ifndef DISPLAY_SPLASH_SCREEN")?;
        writeln!(
            out,
            " #define DISPLAY_SPLASH_SCREEN {}",
            if settings.display_splash_screen { 1 } else { 0 }
        )?;
        writeln!(out, "#endif")?;
        writeln!(out)?;
        writeln!(
            out,
            "#define USE_DARK_SPLASH_SCREEN {}",
            if settings.splash_colour == SplashColour::Dark { 1 } else { 0 }
        )?;
        writeln!(out)?;
        writeln!(
            out,
            "#define EXPORTKIT_VERSION {}",
            version_as_hex(env!("CARGO_PKG_VERSION"))
        )?;
        writeln!(out)?;
        writeln!(out, "{}", SECTION_RULE)?;

        let longest = self.modules.iter().map(|m| m.id().len()).max().unwrap_or(0);
        for module in self.modules {
            writeln!(
                out,
                "#define MODULE_AVAILABLE_{}{} 1",
                module.id(),
                " ".repeat(longest + 5 - module.id().len())
            )?;
        }

        writeln!(out)?;
        writeln!(out, "#define GLOBAL_MODULE_SETTINGS_INCLUDED 1")?;

        for module in self.modules {
            let flags = module.config_flags();
            if flags.is_empty() {
                continue;
            }

            writeln!(out)?;
            writeln!(out, "{}", SECTION_RULE)?;
            writeln!(out, "// {} flags:", module.name())?;

            for flag in flags {
                writeln!(out)?;
                writeln!(out, "#ifndef    {}", flag.symbol)?;
                writeln!(
                    out,
                    "{}{} {}",
                    if flag.is_using_default() { " //#define " } else { " #define   " },
                    flag.symbol,
                    if flag.value() { 1 } else { 0 }
                )?;
                writeln!(out, "#endif")?;
            }
        }

        writeln!(out)?;
        writeln!(out, "{}", SECTION_RULE)?;
        writeln!(out, "#ifndef    STANDALONE_APPLICATION")?;
        writeln!(out, " #if defined(Plugin_Name) && defined(Plugin_Build_Standalone)")?;
        writeln!(out, "  #define  STANDALONE_APPLICATION Plugin_Build_Standalone")?;
        writeln!(out, " #else")?;
        writeln!(
            out,
            "  #define  STANDALONE_APPLICATION {}",
            if settings.project_type.is_standalone_application() { 1 } else { 0 }
        )?;
        writeln!(out, " #endif")?;
        writeln!(out, "#endif")
    }

    fn render_project_header(&self, out: &mut String) -> fmt::Result {
        let settings = self.project.settings();

        write_auto_gen_warning(out)?;
        writeln!(out, "    This is the header file that your files should include in order to get all the")?;
        writeln!(out, "    module headers. You should avoid including the module headers directly in")?;
        writeln!(out, "    your own source files, because that wouldn't pick up the correct configuration")?;
        writeln!(out, "    options for your app.")?;
        writeln!(out)?;
        writeln!(out, "*/")?;
        writeln!(out)?;
        writeln!(out, "#pragma once")?;
        writeln!(out)?;

        if settings.use_app_config && self.app_config_file().is_file() {
            writeln!(out, "{}", include_statement(APP_CONFIG_FILE_NAME))?;
        }

        if !self.modules.is_empty() {
            writeln!(out)?;
            for module in self.modules {
                writeln!(out, "#include <{}>", module.header_include())?;
            }
            writeln!(out)?;
        }

        if self.has_binary_data && settings.include_binary_in_header {
            let header = self.project.binary_data_header_file();
            let name = header
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            writeln!(out, "{}", include_statement(&name))?;
        }

        writeln!(out)?;
        writeln!(out, "#if ! DONT_DECLARE_PROJECTINFO")?;
        writeln!(out, "namespace ProjectInfo")?;
        writeln!(out, "{{")?;
        writeln!(out, "    const char* const  projectName    = {};", quoted_c_string(&settings.name))?;
        writeln!(out, "    const char* const  companyName    = {};", quoted_c_string(&settings.company))?;
        writeln!(out, "    const char* const  versionString  = {};", quoted_c_string(&settings.version))?;
        writeln!(out, "    const int          versionNumber  = {};", self.project.version_as_hex())?;
        writeln!(out, "}}")?;
        writeln!(out, "#endif")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::module::MODULE_MANIFEST_NAME;
    use crate::core::project::{LineEnding, ModuleRef, ProjectRoot, PROJECT_FILE_NAME};
    use std::fs;
    use tempfile::TempDir;

    fn project(tmp: &TempDir) -> ProjectDescription {
        let mut root = ProjectRoot::new("Demo \"Quoted\"");
        root.project.company = "Acme".to_string();
        root.project.version = "1.2.3".to_string();
        ProjectDescription::new(tmp.path().join(PROJECT_FILE_NAME), root)
    }

    #[test]
    fn test_write_all_produces_headers() {
        let tmp = TempDir::new().unwrap();
        let project = project(&tmp);
        let ctx = SaveContext::new(LineEnding::Lf);

        let mut synth = Synthesizer::new(&project, &[], &ctx);
        let user = synth.load_user_content();
        assert!(synth.write_all(&user));
        assert!(!ctx.has_errors());

        let dir = project.generated_dir();
        let config = fs::read_to_string(dir.join(APP_CONFIG_FILE_NAME)).unwrap();
        assert!(config.contains(BEGIN_MARKER));
        assert!(config.contains("exportkit will not overwrite it"));

        let header = fs::read_to_string(dir.join(PROJECT_HEADER_FILE_NAME)).unwrap();
        assert!(header.contains("#include \"AppConfig.h\""));
        assert!(header.contains("projectName    = \"Demo \\\"Quoted\\\"\";"));
        assert!(header.contains("versionNumber  = 0x10203;"));

        assert!(!dir.join(PLUGIN_DEFINES_FILE_NAME).exists());
        assert!(synth.group().contains_file(&dir.join(PROJECT_HEADER_FILE_NAME)));
    }

    #[test]
    fn test_plugin_defines_written_and_removed() {
        let tmp = TempDir::new().unwrap();
        let mut project = project(&tmp);
        project
            .root_mut()
            .plugin
            .insert("Plugin_Name".to_string(), "\"Demo\"".to_string());

        let ctx = SaveContext::new(LineEnding::Lf);
        let mut synth = Synthesizer::new(&project, &[], &ctx);
        let user = synth.load_user_content();
        synth.write_all(&user);

        let path = project.generated_dir().join(PLUGIN_DEFINES_FILE_NAME);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("#ifndef  Plugin_Name"));
        let config = fs::read_to_string(project.generated_dir().join(APP_CONFIG_FILE_NAME)).unwrap();
        assert!(config.contains("#include \"PluginDefines.h\""));

        project.root_mut().plugin.clear();
        let ctx = SaveContext::new(LineEnding::Lf);
        let mut synth = Synthesizer::new(&project, &[], &ctx);
        let user = synth.load_user_content();
        synth.write_all(&user);
        assert!(!path.exists());
    }

    #[test]
    fn test_app_config_disabled_removes_file() {
        let tmp = TempDir::new().unwrap();
        let mut project = project(&tmp);
        let dir = project.generated_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(APP_CONFIG_FILE_NAME), "old").unwrap();

        project.root_mut().project.use_app_config = false;
        let ctx = SaveContext::new(LineEnding::Lf);
        let mut synth = Synthesizer::new(&project, &[], &ctx);
        synth.write_all("");

        assert!(!dir.join(APP_CONFIG_FILE_NAME).exists());
        let header = fs::read_to_string(dir.join(PROJECT_HEADER_FILE_NAME)).unwrap();
        assert!(!header.contains("AppConfig.h"));
    }

    #[test]
    fn test_user_section_survives_regeneration() {
        let tmp = TempDir::new().unwrap();
        let project = project(&tmp);

        let ctx = SaveContext::new(LineEnding::Lf);
        let mut synth = Synthesizer::new(&project, &[], &ctx);
        let user = synth.load_user_content();
        synth.write_all(&user);

        let path = project.generated_dir().join(APP_CONFIG_FILE_NAME);
        let original = fs::read_to_string(&path).unwrap();
        let custom = original.replace(
            user_section::DEFAULT_USER_CONTENT,
            "\n#define MY_CUSTOM_SETTING 42\n\n",
        );
        fs::write(&path, &custom).unwrap();

        let ctx = SaveContext::new(LineEnding::Lf);
        let mut synth = Synthesizer::new(&project, &[], &ctx);
        let user = synth.load_user_content();
        synth.write_all(&user);

        assert_eq!(fs::read_to_string(&path).unwrap(), custom);
        assert!(ctx.written().is_empty());
    }

    #[test]
    fn test_generated_dir_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let project = project(&tmp);
        fs::write(project.generated_dir(), "not a folder").unwrap();

        let ctx = SaveContext::new(LineEnding::Lf);
        let mut synth = Synthesizer::new(&project, &[], &ctx);
        assert!(!synth.write_all(""));
        assert_eq!(ctx.errors().len(), 1);
        assert!(synth.group().is_empty());
    }

    #[test]
    fn test_app_config_labels_flags_with_module_name() {
        let tmp = TempDir::new().unwrap();
        let project = project(&tmp);
        let module_dir = tmp.path().join("modules/core");
        fs::create_dir_all(&module_dir).unwrap();
        fs::write(
            module_dir.join(MODULE_MANIFEST_NAME),
            "id = \"core\"\nname = \"Core Library\"\n\n[[config]]\nsymbol = \"CORE_FAST\"\n",
        )
        .unwrap();
        let module = Module::load(&ModuleRef::new("core", "modules"), tmp.path()).unwrap();

        let ctx = SaveContext::new(LineEnding::Lf);
        let mut synth = Synthesizer::new(&project, std::slice::from_ref(&module), &ctx);
        assert!(synth.write_all(""));

        let config = fs::read_to_string(project.generated_dir().join(APP_CONFIG_FILE_NAME)).unwrap();
        assert!(config.contains("// Core Library flags:"));
        assert!(config.contains("CORE_FAST"));
    }
}
