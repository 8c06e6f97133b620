//! GNU Makefile writer.

use std::collections::HashSet;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::core::project::{ProjectType, TargetFormat};
use crate::core::target::ExportTarget;
use crate::export::writer::{sanitize_name, TargetWriter, WriteContext};

/// Output file name.
pub const MAKEFILE_NAME: &str = "Makefile";

const C_EXTENSIONS: &[&str] = &["c"];
const CXX_EXTENSIONS: &[&str] = &["cpp", "cc", "cxx"];

/// Writes `<folder>/Makefile`.
#[derive(Debug, Default)]
pub struct MakefileWriter;

impl MakefileWriter {
    pub fn new() -> Self {
        MakefileWriter
    }
}

/// One object file and the source it is built from.
struct ObjectRule {
    object: String,
    source: String,
    is_c: bool,
}

impl TargetWriter for MakefileWriter {
    fn format(&self) -> TargetFormat {
        TargetFormat::Makefile
    }

    fn description(&self) -> &'static str {
        "GNU Makefile"
    }

    fn write(&self, target: &mut ExportTarget, cx: &WriteContext<'_>) -> Result<Vec<PathBuf>> {
        let text = render(target, cx).map_err(|_| anyhow!("failed to format Makefile"))?;
        let path = target.folder.join(MAKEFILE_NAME);
        cx.write_file(&path, &text)?;
        Ok(vec![path])
    }
}

fn object_rules(target: &ExportTarget) -> Vec<ObjectRule> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut rules = Vec::new();

    for file in target.compile_files() {
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
        let is_c = C_EXTENSIONS.contains(&ext);
        if !is_c && !CXX_EXTENSIONS.contains(&ext) {
            tracing::debug!("{}: not compiling {}", target.name, file.display());
            continue;
        }

        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        // A renamed object must not land on the stem of another source.
        let mut name = stem.clone();
        let mut n = 1;
        while taken.contains(&name) {
            n += 1;
            name = format!("{}_{}", stem, n);
        }
        taken.insert(name.clone());

        rules.push(ObjectRule {
            object: format!("$(OBJDIR)/{}.o", name),
            source: target.relative_to_folder(&file),
            is_c,
        });
    }
    rules
}

fn link_rule(project_type: ProjectType) -> (&'static str, &'static str) {
    match project_type {
        ProjectType::StaticLib => (".a", "$(AR) rcs $@ $(OBJECTS)"),
        ProjectType::DynamicLib | ProjectType::Plugin => (
            ".so",
            "$(CXX) -shared -o $@ $(OBJECTS) $(LDFLAGS)",
        ),
        ProjectType::GuiApp | ProjectType::ConsoleApp => ("", "$(CXX) -o $@ $(OBJECTS) $(LDFLAGS)"),
    }
}

fn render(target: &ExportTarget, cx: &WriteContext<'_>) -> Result<String, fmt::Error> {
    let settings = cx.settings;
    let (suffix, link) = link_rule(settings.project_type);
    let rules = object_rules(target);

    let mut out = String::new();
    writeln!(out, "# Automatically generated makefile, created by exportkit")?;
    writeln!(out, "# Don't edit this file! Your changes will be overwritten when you re-save the project!")?;
    writeln!(out)?;
    writeln!(out, "TARGET := {}{}", sanitize_name(&settings.name), suffix)?;
    writeln!(out, "OBJDIR := build/intermediate")?;
    writeln!(out, "OUTDIR := build")?;
    writeln!(out)?;
    writeln!(out, "CC ?= cc")?;
    writeln!(out, "CXX ?= c++")?;
    writeln!(out, "AR ?= ar")?;
    writeln!(out)?;

    write!(out, "DEFINES :=")?;
    for (key, value) in &target.defines {
        write!(out, " \\\n  -D{}={}", key, shell_quote(value))?;
    }
    writeln!(out)?;

    write!(out, "INCLUDES :=")?;
    for path in &target.search_paths {
        write!(out, " \\\n  -I{}", shell_quote(&target.relative_to_folder(path)))?;
    }
    writeln!(out)?;
    writeln!(out)?;

    let extra_cflags = target.settings.get("cflags").map(String::as_str).unwrap_or("");
    let cxxflags = target
        .settings
        .get("cxxflags")
        .map(String::as_str)
        .unwrap_or("-std=c++17");
    let ldflags = target.settings.get("ldflags").map(String::as_str).unwrap_or("");

    writeln!(out, "CPPFLAGS += $(DEFINES) $(INCLUDES)")?;
    writeln!(out, "CFLAGS += {}", extra_cflags)?;
    writeln!(out, "CXXFLAGS += {}", cxxflags)?;
    writeln!(out, "LDFLAGS += {}", ldflags)?;
    writeln!(out)?;

    write!(out, "OBJECTS :=")?;
    for rule in &rules {
        write!(out, " \\\n  {}", rule.object)?;
    }
    writeln!(out)?;
    writeln!(out)?;

    writeln!(out, ".PHONY: all clean")?;
    writeln!(out)?;
    writeln!(out, "all: $(OUTDIR)/$(TARGET)")?;
    writeln!(out)?;
    writeln!(out, "$(OUTDIR)/$(TARGET): $(OBJECTS)")?;
    writeln!(out, "\t@mkdir -p $(OUTDIR)")?;
    writeln!(out, "\t{}", link)?;
    writeln!(out)?;

    for rule in &rules {
        writeln!(out, "{}: {}", rule.object, make_escape(&rule.source))?;
        writeln!(out, "\t@mkdir -p $(OBJDIR)")?;
        if rule.is_c {
            writeln!(out, "\t$(CC) $(CPPFLAGS) $(CFLAGS) -o \"$@\" -c \"$<\"")?;
        } else {
            writeln!(out, "\t$(CXX) $(CPPFLAGS) $(CXXFLAGS) -o \"$@\" -c \"$<\"")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "clean:")?;
    writeln!(out, "\trm -rf $(OUTDIR)")?;
    Ok(out)
}

fn shell_quote(value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        format!("'{}'", value.replace('\'', "'\\''"))
    } else {
        value.to_string()
    }
}

fn make_escape(path: &str) -> String {
    path.replace(' ', "\\ ")
}

/// The Makefile path for a target folder.
pub fn makefile_path(folder: &Path) -> PathBuf {
    folder.join(MAKEFILE_NAME)
}
