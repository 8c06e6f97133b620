//! Writer registry.
//!
//! Construction never fails: every built-in writer is registered up front
//! and callers may swap in their own for any format.

use std::collections::HashMap;

use crate::core::project::TargetFormat;
use crate::export::writer::cmake::CMakeWriter;
use crate::export::writer::json::CompileManifestWriter;
use crate::export::writer::makefile::MakefileWriter;
use crate::export::writer::TargetWriter;

/// Registry of target writers keyed by format.
pub struct WriterRegistry {
    writers: HashMap<TargetFormat, Box<dyn TargetWriter>>,
}

impl WriterRegistry {
    /// Create a registry with all built-in writers.
    pub fn new() -> Self {
        let mut registry = WriterRegistry {
            writers: HashMap::new(),
        };

        registry.register(Box::new(MakefileWriter::new()));
        registry.register(Box::new(CompileManifestWriter::new()));
        registry.register(Box::new(CMakeWriter::new()));

        registry
    }

    /// Register a writer, replacing any writer for the same format.
    pub fn register(&mut self, writer: Box<dyn TargetWriter>) {
        self.writers.insert(writer.format(), writer);
    }

    /// Get the writer for a format.
    pub fn get(&self, format: TargetFormat) -> Option<&dyn TargetWriter> {
        self.writers.get(&format).map(|w| w.as_ref())
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl Default for WriterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
