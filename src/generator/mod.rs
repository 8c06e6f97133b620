//! Generated code.
//!
//! Everything written into the project's generated-code folder: the
//! plugin-properties header, the app-configuration header, embedded binary
//! data, the aggregate project header, per-module wrapper units and the
//! folder's readme.

pub mod binary_data;
pub mod files;
pub mod user_section;

pub use binary_data::BinaryDataEmbedder;
pub use files::Synthesizer;

use std::fmt::{self, Write};

/// App-configuration header.
pub const APP_CONFIG_FILE_NAME: &str = "AppConfig.h";

/// Plugin-properties header.
pub const PLUGIN_DEFINES_FILE_NAME: &str = "PluginDefines.h";

/// Aggregate "include everything" header.
pub const PROJECT_HEADER_FILE_NAME: &str = "ProjectHeader.h";

/// Readme placed in the generated-code folder.
pub const README_FILE_NAME: &str = "ReadMe.txt";

/// Separator comment used between header sections.
pub(crate) const SECTION_RULE: &str =
    "//==============================================================================";

/// Open the warning comment every generated source starts with.
///
/// The comment is left open so callers can append their own paragraph
/// before closing it with `*/`.
pub(crate) fn write_auto_gen_warning(out: &mut String) -> fmt::Result {
    writeln!(out, "/*")?;
    writeln!(out)?;
    writeln!(out, "    IMPORTANT! This file is auto-generated each time you save your")?;
    writeln!(out, "    project - if you alter its contents, your changes may be overwritten!")?;
    writeln!(out)
}

/// `#include "file"`
pub fn include_statement(file: &str) -> String {
    format!("#include \"{}\"", file)
}

/// Escape `s` for use inside a C string literal.
pub fn escape_c_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if (c as u32) < 0x20 => escaped.push_str(&format!("\\x{:02x}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Quote `s` as a C string literal.
pub fn quoted_c_string(s: &str) -> String {
    format!("\"{}\"", escape_c_string(s))
}
