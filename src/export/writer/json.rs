//! Compile-manifest writer: a JSON listing of what to build and how.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::project::TargetFormat;
use crate::core::target::ExportTarget;
use crate::export::writer::{sanitize_name, TargetWriter, WriteContext};

/// Writes `<folder>/<name>.json`.
#[derive(Debug, Default)]
pub struct CompileManifestWriter;

impl CompileManifestWriter {
    pub fn new() -> Self {
        CompileManifestWriter
    }
}

#[derive(Debug, Serialize)]
struct CompileManifest<'a> {
    name: &'a str,
    project: &'a str,
    version: &'a str,
    project_type: &'a str,
    defines: &'a BTreeMap<String, String>,
    include_paths: Vec<String>,
    sources: Vec<String>,
    files: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    settings: &'a BTreeMap<String, String>,
}

impl TargetWriter for CompileManifestWriter {
    fn format(&self) -> TargetFormat {
        TargetFormat::CompileManifest
    }

    fn description(&self) -> &'static str {
        "JSON compile manifest"
    }

    fn write(&self, target: &mut ExportTarget, cx: &WriteContext<'_>) -> Result<Vec<PathBuf>> {
        let manifest = CompileManifest {
            name: &target.name,
            project: &cx.settings.name,
            version: &cx.settings.version,
            project_type: cx.settings.project_type.as_str(),
            defines: &target.defines,
            include_paths: target
                .search_paths
                .iter()
                .map(|p| target.relative_to_folder(p))
                .collect(),
            sources: target
                .compile_files()
                .iter()
                .map(|p| target.relative_to_folder(p))
                .collect(),
            files: target
                .all_files()
                .iter()
                .map(|p| target.relative_to_folder(p))
                .collect(),
            settings: &target.settings,
        };

        let mut text = serde_json::to_string_pretty(&manifest)
            .with_context(|| format!("failed to serialize compile manifest for {}", target.name))?;
        text.push('\n');

        let path = target
            .folder
            .join(format!("{}.json", sanitize_name(&target.name)));
        cx.write_file(&path, &text)?;
        Ok(vec![path])
    }
}
