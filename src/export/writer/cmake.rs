//! CMake aggregator.
//!
//! Writes one `CMakeLists.txt` that exposes every standard target as a
//! custom build target, so the whole export can be driven from CMake-aware
//! tools.

use std::fmt::{self, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::core::project::TargetFormat;
use crate::core::target::ExportTarget;
use crate::export::writer::{sanitize_name, TargetWriter, WriteContext};
use crate::util::fs::{relative_path, to_unix_string};

/// Output file name.
pub const CMAKE_LISTS_NAME: &str = "CMakeLists.txt";

/// Writes `<folder>/CMakeLists.txt`.
#[derive(Debug, Default)]
pub struct CMakeWriter;

impl CMakeWriter {
    pub fn new() -> Self {
        CMakeWriter
    }
}

impl TargetWriter for CMakeWriter {
    fn format(&self) -> TargetFormat {
        TargetFormat::CMake
    }

    fn description(&self) -> &'static str {
        "CMakeLists.txt driving the other targets"
    }

    fn write(&self, target: &mut ExportTarget, cx: &WriteContext<'_>) -> Result<Vec<PathBuf>> {
        let text = render(target, cx).map_err(|_| anyhow!("failed to format {}", CMAKE_LISTS_NAME))?;
        let path = target.folder.join(CMAKE_LISTS_NAME);
        cx.write_file(&path, &text)?;
        Ok(vec![path])
    }
}

fn cmake_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn render(target: &ExportTarget, cx: &WriteContext<'_>) -> Result<String, fmt::Error> {
    let settings = cx.settings;
    let mut out = String::new();

    writeln!(out, "# Automatically generated CMakeLists, created by exportkit")?;
    writeln!(out, "# Don't edit this file! Your changes will be overwritten when you re-save the project!")?;
    writeln!(out)?;
    writeln!(out, "cmake_minimum_required(VERSION 3.15)")?;
    writeln!(out, "project({} LANGUAGES NONE)", cmake_quote(&sanitize_name(&settings.name)))?;
    writeln!(out)?;
    writeln!(out, "set(PROJECT_VERSION_STRING {})", cmake_quote(&settings.version))?;
    writeln!(out)?;

    for sibling in cx.siblings {
        let folder = to_unix_string(&relative_path(&target.folder, &sibling.folder));
        let name = sanitize_name(&sibling.name);

        writeln!(out, "#{}", "-".repeat(78))?;
        writeln!(out, "# {} ({})", sibling.name, sibling.format.as_str())?;
        writeln!(out, "set({}_DIR \"${{CMAKE_CURRENT_SOURCE_DIR}}/{}\")", name, folder)?;

        match sibling.format {
            TargetFormat::Makefile => {
                writeln!(out, "add_custom_target({}", cmake_quote(&format!("build_{}", name)))?;
                writeln!(out, "    COMMAND make -C \"${{{}_DIR}}\"", name)?;
                writeln!(out, "    WORKING_DIRECTORY \"${{{}_DIR}}\"", name)?;
                writeln!(out, "    COMMENT {}", cmake_quote(&format!("Building {}", sibling.name)))?;
                writeln!(out, "    VERBATIM)")?;
            }
            TargetFormat::CompileManifest => {
                writeln!(
                    out,
                    "set({}_MANIFEST \"${{{}_DIR}}/{}.json\")",
                    name, name, name
                )?;
            }
            TargetFormat::CMake => {}
        }
        writeln!(out)?;
    }

    Ok(out)
}
