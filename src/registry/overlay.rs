use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info};

use crate::config::ArtifactDefinition;
use crate::errors::{CollectorError, ParseError};
use crate::registry::Repository;

/// Definitions registered for a single collection.
///
/// Lookups check the inline definitions first and fall back to the base
/// repository, which is never modified. The overlay is dropped with the
/// collection that created it.
#[derive(Debug)]
pub struct RequestOverlay<'a> {
    base: &'a Repository,
    inline: IndexMap<String, Arc<ArtifactDefinition>>,
}

impl<'a> RequestOverlay<'a> {
    pub fn new(base: &'a Repository) -> Self {
        Self {
            base,
            inline: IndexMap::new(),
        }
    }

    /// Parses one definition into the overlay. A later inline definition
    /// with the same name replaces the earlier one.
    pub fn register_inline(&mut self, text: &str) -> Result<Arc<ArtifactDefinition>, ParseError> {
        let definition = Arc::new(ArtifactDefinition::parse(text)?);
        if self.base.get(&definition.name).is_some() {
            info!("Inline definition overrides artifact {}", definition.name);
        } else {
            debug!("Registered inline artifact {}", definition.name);
        }
        self.inline
            .insert(definition.name.clone(), definition.clone());
        Ok(definition)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ArtifactDefinition>> {
        self.inline
            .get(name)
            .cloned()
            .or_else(|| self.base.get(name))
    }

    /// Resolves requested names in order. Repeated names resolve once, at
    /// their first position; any unknown name fails the whole request.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<ArtifactDefinition>>, CollectorError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !seen.insert(name) {
                debug!("Artifact {} requested more than once", name);
                continue;
            }
            let definition = self
                .get(name)
                .ok_or_else(|| CollectorError::UnknownArtifact(name.to_string()))?;
            resolved.push(definition);
        }
        Ok(resolved)
    }

    pub fn inline_names(&self) -> impl Iterator<Item = &str> {
        self.inline.keys().map(String::as_str)
    }
}
