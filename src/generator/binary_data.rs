//! Binary data embedding.
//!
//! Resource files are packed into C++ byte arrays spread across numbered
//! units (`BinaryData1.cpp`, `BinaryData2.cpp`, ...) plus one header that
//! declares them. Units are filled in resource order and a new unit is
//! started whenever the next resource would push the current one past the
//! configured maximum. A single resource larger than the maximum gets a unit
//! to itself, since one array cannot span two translation units.

use std::collections::HashSet;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::project::ProjectDescription;
use crate::export::context::SaveContext;
use crate::export::error::SaveError;
use crate::generator::{quoted_c_string, SECTION_RULE};
use crate::util::fs::{ensure_dir, glob_files, to_unix_string};

/// Highest historical unit index swept when no resources remain.
pub const MAX_HISTORICAL_UNITS: usize = 20;

/// Bytes per line in generated arrays.
const BYTES_PER_LINE: usize = 32;

static INVALID_SYMBOL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// One file to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Absolute source path
    pub path: PathBuf,
    /// C++ identifier holding the data
    pub symbol: String,
    /// Original file name
    pub original_name: String,
    /// File contents
    pub data: Vec<u8>,
}

/// Writes the binary-data header and units for a project.
pub struct BinaryDataEmbedder<'a> {
    project: &'a ProjectDescription,
    ctx: &'a SaveContext,
}

impl<'a> BinaryDataEmbedder<'a> {
    pub fn new(project: &'a ProjectDescription, ctx: &'a SaveContext) -> Self {
        BinaryDataEmbedder { project, ctx }
    }

    /// Files the project wants embedded: glob matches first, then items of
    /// the main group flagged as resources.
    pub fn resource_files(&self) -> Result<Vec<PathBuf>> {
        let root = self.project.root();
        let mut files = glob_files(self.project.project_folder(), &root.resources)?;

        for item in root.main_group.resource_files() {
            files.push(self.project.resolve_path(&item.path));
        }

        let mut seen = HashSet::new();
        files.retain(|f| seen.insert(f.clone()));
        Ok(files)
    }

    /// Write the binary data, or delete stale output when there is none.
    ///
    /// Returns the files produced. Failures are recorded in the save context.
    pub fn write(&self) -> Vec<PathBuf> {
        let files = match self.resource_files() {
            Ok(files) => files,
            Err(e) => {
                self.ctx.add_error(SaveError::io(format!("{:#}", e)));
                return Vec::new();
            }
        };

        if files.is_empty() {
            self.remove_stale_output();
            return Vec::new();
        }

        match self.write_resources(&files) {
            Ok(created) => created,
            Err(e) => {
                self.ctx.add_error(SaveError::io(format!("{:#}", e)));
                Vec::new()
            }
        }
    }

    fn remove_stale_output(&self) {
        for index in (0..MAX_HISTORICAL_UNITS).rev() {
            self.ctx
                .remove_unneeded_file(&self.project.binary_data_cpp_file(index));
        }
        self.ctx
            .remove_unneeded_file(&self.project.binary_data_header_file());
    }

    fn write_resources(&self, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let resources = load_resources(files)?;
        let namespace = self.project.binary_data_namespace();
        let units = split_into_units(&resources, self.project.max_binary_file_size());

        let header_path = self.project.binary_data_header_file();
        let generated_dir = self.project.generated_dir();
        ensure_dir(&generated_dir)
            .with_context(|| format!("Couldn't create folder: {}", generated_dir.display()))?;

        let header_name = header_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut created = Vec::new();
        let header = render_header(&namespace, &resources).context("failed to format binary data header")?;
        if self.ctx.produce_file(&header_path, &header) {
            created.push(header_path.clone());
        }

        let mut next_array = 0;
        for (index, unit) in units.iter().enumerate() {
            let path = self.project.binary_data_cpp_file(index);
            let text = render_unit(
                &namespace,
                &header_name,
                &resources,
                unit,
                next_array,
                index == 0,
            )
            .context("failed to format binary data unit")?;
            next_array += unit.len();

            if self.ctx.produce_file(&path, &text) {
                created.push(path);
            }
        }

        tracing::debug!(
            "embedded {} resources in {} units",
            resources.len(),
            units.len()
        );
        Ok(created)
    }
}

fn load_resources(files: &[PathBuf]) -> Result<Vec<Resource>> {
    let mut used = HashSet::new();
    files
        .iter()
        .map(|path| {
            let data = std::fs::read(path)
                .with_context(|| format!("failed to read resource: {}", path.display()))?;
            let original_name = file_name_of(path);
            let symbol = unique_symbol(&make_symbol(&original_name), &mut used);
            Ok(Resource {
                path: path.clone(),
                symbol,
                original_name,
                data,
            })
        })
        .collect()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| to_unix_string(path))
}

/// Turn a file name into a valid C++ identifier.
pub fn make_symbol(file_name: &str) -> String {
    let mut symbol = INVALID_SYMBOL_CHARS.replace_all(file_name, "_").into_owned();
    if symbol.is_empty() || symbol.starts_with(|c: char| c.is_ascii_digit()) {
        symbol.insert(0, '_');
    }
    symbol
}

fn unique_symbol(base: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut suffix = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}{}", base, suffix);
        suffix += 1;
    }
    candidate
}

/// Group resource indices into units no bigger than `max_size` bytes.
///
/// The limit counts raw resource bytes, not the rendered source text,
/// which is several times larger. A resource above the limit gets a unit
/// of its own.
pub fn split_into_units(resources: &[Resource], max_size: u64) -> Vec<Vec<usize>> {
    let mut units: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_size: u64 = 0;

    for (index, resource) in resources.iter().enumerate() {
        let size = resource.data.len() as u64;
        if !current.is_empty() && current_size + size > max_size {
            units.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current.push(index);
        current_size += size;
    }

    if !current.is_empty() {
        units.push(current);
    }
    units
}

fn write_banner(out: &mut String) -> fmt::Result {
    writeln!(out, "/* {}", "=".repeat(74))?;
    writeln!(out)?;
    writeln!(out, "   This is an auto-generated file: Any edits you make may be overwritten!")?;
    writeln!(out)?;
    writeln!(out, "{} */", "=".repeat(77))?;
    writeln!(out)
}

fn render_header(namespace: &str, resources: &[Resource]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_banner(&mut out)?;
    writeln!(out, "#pragma once")?;
    writeln!(out)?;
    writeln!(out, "namespace {}", namespace)?;
    writeln!(out, "{{")?;

    for resource in resources {
        writeln!(out, "    extern const char*   {};", resource.symbol)?;
        writeln!(
            out,
            "    const int            {}Size = {};",
            resource.symbol,
            resource.data.len()
        )?;
        writeln!(out)?;
    }

    writeln!(out, "    // Number of elements in the namedResourceList and originalFileNames arrays.")?;
    writeln!(out, "    const int namedResourceListSize = {};", resources.len())?;
    writeln!(out)?;
    writeln!(out, "    // Points to the start of a list of resource names.")?;
    writeln!(out, "    extern const char* namedResourceList[];")?;
    writeln!(out)?;
    writeln!(out, "    // Points to the start of a list of resource filenames.")?;
    writeln!(out, "    extern const char* originalFilenames[];")?;
    writeln!(out)?;
    writeln!(out, "    // If you provide the name of one of the binary resource variables above, this function will")?;
    writeln!(out, "    // return the corresponding data and its size (or a null pointer if the name isn't found).")?;
    writeln!(out, "    const char* getNamedResource (const char* resourceNameUTF8, int& dataSizeInBytes);")?;
    writeln!(out, "}}")?;
    Ok(out)
}

fn render_unit(
    namespace: &str,
    header_name: &str,
    resources: &[Resource],
    unit: &[usize],
    first_array: usize,
    with_lookup: bool,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_banner(&mut out)?;
    writeln!(out, "#include <cstring>")?;
    writeln!(out, "#include \"{}\"", header_name)?;
    writeln!(out)?;
    writeln!(out, "namespace {}", namespace)?;
    writeln!(out, "{{")?;
    writeln!(out)?;

    for (offset, &index) in unit.iter().enumerate() {
        let resource = &resources[index];
        let array = first_array + offset;

        writeln!(
            out,
            "//================== {} ==================",
            resource.original_name
        )?;
        writeln!(out, "static const unsigned char temp_binary_data_{}[] =", array)?;
        write_byte_literal(&mut out, &resource.data)?;
        writeln!(out)?;
        writeln!(
            out,
            "const char* {} = (const char*) temp_binary_data_{};",
            resource.symbol, array
        )?;
        writeln!(out)?;
    }

    if with_lookup {
        write_lookup(&mut out, resources)?;
    }

    writeln!(out, "}}")?;
    Ok(out)
}

/// Emit `{ b0,b1,...,0 };` with a trailing NUL so empty files still form a
/// valid array.
fn write_byte_literal(out: &mut String, data: &[u8]) -> fmt::Result {
    write!(out, "{{ ")?;
    for (i, byte) in data.iter().enumerate() {
        write!(out, "{},", byte)?;
        if (i + 1) % BYTES_PER_LINE == 0 {
            writeln!(out)?;
        }
    }
    writeln!(out, "0 }};")
}

fn write_string_table(out: &mut String, name: &str, values: &[String]) -> fmt::Result {
    writeln!(out, "const char* {}[] =", name)?;
    writeln!(out, "{{")?;
    for value in values {
        writeln!(out, "    {},", quoted_c_string(value))?;
    }
    writeln!(out, "    nullptr")?;
    writeln!(out, "}};")?;
    writeln!(out)
}

fn write_lookup(out: &mut String, resources: &[Resource]) -> fmt::Result {
    let symbols: Vec<String> = resources.iter().map(|r| r.symbol.clone()).collect();
    let names: Vec<String> = resources.iter().map(|r| r.original_name.clone()).collect();

    writeln!(out, "{}", SECTION_RULE)?;
    write_string_table(out, "namedResourceList", &symbols)?;
    write_string_table(out, "originalFilenames", &names)?;

    writeln!(out, "const char* getNamedResource (const char* resourceNameUTF8, int& numBytes)")?;
    writeln!(out, "{{")?;
    writeln!(out, "    static const char* const* data[] =")?;
    writeln!(out, "    {{")?;
    for symbol in &symbols {
        writeln!(out, "        &{},", symbol)?;
    }
    writeln!(out, "        nullptr")?;
    writeln!(out, "    }};")?;
    writeln!(out)?;
    writeln!(out, "    static const int sizes[] =")?;
    writeln!(out, "    {{")?;
    for symbol in &symbols {
        writeln!(out, "        {}Size,", symbol)?;
    }
    writeln!(out, "        0")?;
    writeln!(out, "    }};")?;
    writeln!(out)?;
    writeln!(out, "    for (int i = 0; i < namedResourceListSize; ++i)")?;
    writeln!(out, "    {{")?;
    writeln!(out, "        if (std::strcmp (namedResourceList[i], resourceNameUTF8) == 0)")?;
    writeln!(out, "        {{")?;
    writeln!(out, "            numBytes = sizes[i];")?;
    writeln!(out, "            return *data[i];")?;
    writeln!(out, "        }}")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    numBytes = 0;")?;
    writeln!(out, "    return nullptr;")?;
    writeln!(out, "}}")?;
    writeln!(out)
}

/// Recover the bytes of every array in a generated unit, in order.
#[cfg(test)]
pub(crate) fn parse_unit_arrays(text: &str) -> Vec<Vec<u8>> {
    let mut arrays = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("static const unsigned char temp_binary_data_") {
        rest = &rest[start..];
        let open = rest.find('{').unwrap();
        let close = rest.find('}').unwrap();
        let mut bytes: Vec<u8> = rest[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().unwrap())
            .collect();
        bytes.pop();
        arrays.push(bytes);
        rest = &rest[close..];
    }
    arrays
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str, size: usize) -> Resource {
        Resource {
            path: PathBuf::from(name),
            symbol: make_symbol(name),
            original_name: name.to_string(),
            data: vec![7; size],
        }
    }

    #[test]
    fn test_make_symbol() {
        assert_eq!(make_symbol("logo.png"), "logo_png");
        assert_eq!(make_symbol("my icon-2.svg"), "my_icon_2_svg");
        assert_eq!(make_symbol("3d.obj"), "_3d_obj");
    }

    #[test]
    fn test_unique_symbol() {
        let mut used = HashSet::new();
        assert_eq!(unique_symbol("a_png", &mut used), "a_png");
        assert_eq!(unique_symbol("a_png", &mut used), "a_png2");
        assert_eq!(unique_symbol("a_png", &mut used), "a_png3");
    }

    #[test]
    fn test_split_into_units() {
        let resources = vec![
            resource("a", 40),
            resource("b", 40),
            resource("c", 40),
            resource("d", 250),
            resource("e", 10),
        ];

        let units = split_into_units(&resources, 100);
        assert_eq!(units, vec![vec![0, 1], vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn test_split_fits_in_one_unit() {
        let resources = vec![resource("a", 10), resource("b", 10)];
        assert_eq!(split_into_units(&resources, 1024), vec![vec![0, 1]]);
        assert!(split_into_units(&[], 1024).is_empty());
    }

    #[test]
    fn test_render_unit_round_trips_bytes() {
        let mut res = resource("data.bin", 0);
        res.data = (0..=255u8).collect();
        let empty = resource("empty.txt", 0);
        let resources = vec![res.clone(), empty];

        let text = render_unit("BinaryData", "BinaryData.h", &resources, &[0, 1], 0, true).unwrap();
        let arrays = parse_unit_arrays(&text);

        assert_eq!(arrays.len(), 2);
        assert_eq!(arrays[0], res.data);
        assert!(arrays[1].is_empty());
        assert!(text.contains("const char* data_bin = (const char*) temp_binary_data_0;"));
        assert!(text.contains("getNamedResource"));
    }

    #[test]
    fn test_render_header_declares_sizes() {
        let resources = vec![resource("logo.png", 12)];
        let text = render_header("Assets", &resources).unwrap();

        assert!(text.contains("namespace Assets"));
        assert!(text.contains("extern const char*   logo_png;"));
        assert!(text.contains("logo_pngSize = 12;"));
        assert!(text.contains("namedResourceListSize = 1;"));
    }
}
