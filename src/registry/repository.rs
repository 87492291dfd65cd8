use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use walkdir::WalkDir;

use crate::config::ArtifactDefinition;
use crate::errors::ParseError;

/// The base registry, populated at start-up and shared read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct Repository {
    definitions: IndexMap<String, Arc<ArtifactDefinition>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition, replacing any earlier one with the same name.
    pub fn add(&mut self, definition: ArtifactDefinition) -> Arc<ArtifactDefinition> {
        let definition = Arc::new(definition);
        if self
            .definitions
            .insert(definition.name.clone(), definition.clone())
            .is_some()
        {
            debug!("Replaced artifact definition {}", definition.name);
        }
        definition
    }

    /// Parses a YAML stream of one or more definitions and adds them all.
    /// Nothing is added when any document is malformed.
    pub fn load_definitions(&mut self, text: &str) -> Result<Vec<Arc<ArtifactDefinition>>, ParseError> {
        let parsed = ArtifactDefinition::parse_many(text)?;
        Ok(parsed.into_iter().map(|d| self.add(d)).collect())
    }

    /// Loads every definition in a YAML file.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let text = fs::read_to_string(path)
            .context(format!("Failed to read artifact definitions: {}", path.display()))?;
        let loaded = self
            .load_definitions(&text)
            .context(format!("Invalid artifact definitions in {}", path.display()))?;
        debug!("Loaded {} definitions from {}", loaded.len(), path.display());
        Ok(loaded.len())
    }

    /// Loads every `*.yaml` / `*.yml` file below `dir`, in path order.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.context(format!("Failed to walk {}", dir.display()))?;
            let is_yaml = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if entry.file_type().is_file() && is_yaml {
                files.push(entry.into_path());
            }
        }

        let mut total = 0;
        for file in &files {
            total += self.load_file(file)?;
        }
        info!(
            "Loaded {} artifact definitions from {} files in {}",
            total,
            files.len(),
            dir.display()
        );
        Ok(total)
    }

    /// Loads a definitions file, or every definition file below a directory.
    pub fn load_path(&mut self, path: &Path) -> Result<usize> {
        if path.is_dir() {
            self.load_directory(path)
        } else {
            self.load_file(path)
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ArtifactDefinition>> {
        self.definitions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
