//! File groups - the virtual tree of files a target project lists.
//!
//! The generated-files group is built once per save as a pristine template
//! and then deep-copied into every target, so edits made while writing one
//! target never leak into another.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A named group of files and nested groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGroup {
    /// Display name of the group
    pub name: String,

    /// Files directly in this group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileItem>,

    /// Nested groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<FileGroup>,
}

/// A single file entry in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    /// Path of the file (relative to the project folder, or absolute)
    pub path: PathBuf,

    /// Whether target projects should compile this file
    #[serde(default = "default_true")]
    pub compile: bool,

    /// Whether the file is embedded as binary data
    #[serde(default, skip_serializing_if = "is_false")]
    pub resource: bool,
}

fn default_true() -> bool {
    true
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl FileItem {
    /// Create a new file item.
    pub fn new(path: impl Into<PathBuf>, compile: bool) -> Self {
        FileItem {
            path: path.into(),
            compile,
            resource: false,
        }
    }

    /// The file name used for ordering and display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl FileGroup {
    /// Create a new empty group.
    pub fn new(name: impl Into<String>) -> Self {
        FileGroup {
            name: name.into(),
            files: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Find the item for `path` anywhere in this group.
    pub fn find_file(&self, path: &Path) -> Option<&FileItem> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .or_else(|| self.groups.iter().find_map(|g| g.find_file(path)))
    }

    /// Check if `path` is listed anywhere in this group.
    pub fn contains_file(&self, path: &Path) -> bool {
        self.find_file(path).is_some()
    }

    /// Append a file to this group.
    ///
    /// Returns `false` if the file was already listed.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, compile: bool) -> bool {
        let path = path.into();
        if self.contains_file(&path) {
            return false;
        }
        self.files.push(FileItem::new(path, compile));
        true
    }

    /// Insert a file keeping the direct children in natural order.
    ///
    /// Returns `false` if the file was already listed.
    pub fn add_file_retaining_sort_order(&mut self, path: impl Into<PathBuf>, compile: bool) -> bool {
        let path = path.into();
        if self.contains_file(&path) {
            return false;
        }
        let item = FileItem::new(path, compile);
        let name = item.file_name();
        let index = self
            .files
            .iter()
            .position(|f| natural_cmp(&f.file_name(), &name) == Ordering::Greater)
            .unwrap_or(self.files.len());
        self.files.insert(index, item);
        true
    }

    /// Get a nested group by name, creating it if missing.
    pub fn group_mut(&mut self, name: &str) -> &mut FileGroup {
        match self.groups.iter().position(|g| g.name == name) {
            Some(index) => &mut self.groups[index],
            None => {
                self.groups.push(FileGroup::new(name));
                let last = self.groups.len() - 1;
                &mut self.groups[last]
            }
        }
    }

    /// Sort files and groups by name, recursively.
    ///
    /// Runs of digits compare numerically, so indexed units such as
    /// `BinaryData2.cpp` sort before `BinaryData10.cpp`.
    pub fn sort_alphabetically(&mut self) {
        self.files.sort_by(|a, b| {
            natural_cmp(&a.file_name(), &b.file_name()).then_with(|| a.path.cmp(&b.path))
        });
        self.groups.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        for group in &mut self.groups {
            group.sort_alphabetically();
        }
    }

    /// All files in this group, depth first.
    pub fn all_files(&self) -> Vec<&FileItem> {
        let mut out: Vec<&FileItem> = self.files.iter().collect();
        for group in &self.groups {
            out.extend(group.all_files());
        }
        out
    }

    /// Files that target projects should compile.
    pub fn compile_files(&self) -> Vec<&FileItem> {
        self.all_files().into_iter().filter(|f| f.compile).collect()
    }

    /// Files flagged for embedding as binary data.
    pub fn resource_files(&self) -> Vec<&FileItem> {
        self.all_files().into_iter().filter(|f| f.resource).collect()
    }

    /// Total number of files in this group.
    pub fn len(&self) -> usize {
        self.files.len() + self.groups.iter().map(FileGroup::len).sum::<usize>()
    }

    /// Check if the group lists no files.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Case-insensitive comparison where runs of ASCII digits compare by value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let xn = take_digits(&mut ai);
                let yn = take_digits(&mut bi);
                let ord = cmp_digit_runs(&xn, &yn);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
