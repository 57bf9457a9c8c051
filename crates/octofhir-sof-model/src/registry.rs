//! View registry
//!
//! ViewDefinitions are loaded once at startup and are immutable thereafter;
//! an edited definition is registered under a new name/version by reloading.

use crate::ViewDefinition;
use octofhir_sof_diagnostics::{Result, SOF0100, SOF0104, SOF0403, SofError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Immutable, name-addressed collection of view definitions
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: HashMap<String, Arc<ViewDefinition>>,
}

impl ViewRegistry {
    /// Build a registry from a collection of definitions
    ///
    /// Duplicate names are rejected; versioned definitions must carry the
    /// version in the name.
    pub fn new(views: impl IntoIterator<Item = ViewDefinition>) -> Result<Self> {
        let mut map = HashMap::new();
        for view in views {
            let name = view.name.clone();
            if map.insert(name.clone(), Arc::new(view)).is_some() {
                return Err(SofError::compile_in(
                    SOF0100,
                    format!("duplicate view definition '{name}'"),
                    name,
                ));
            }
        }
        Ok(Self { views: map })
    }

    /// Load every `*.json` ViewDefinition from a directory
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            SofError::system(SOF0403, format!("cannot read view directory {dir:?}: {e}"))
        })?;

        let mut definitions = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| SofError::system(SOF0403, format!("cannot read directory entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| SofError::system(SOF0403, format!("cannot read {path:?}: {e}")))?;
            let view = ViewDefinition::from_json(&raw)?;
            log::info!("loaded view definition '{}' from {path:?}", view.name);
            definitions.push(view);
        }
        Self::new(definitions)
    }

    /// Look up a view by name
    pub fn get(&self, name: &str) -> Result<Arc<ViewDefinition>> {
        self.views
            .get(name)
            .cloned()
            .ok_or_else(|| SofError::compile(SOF0104, format!("unknown view '{name}'")))
    }

    /// Registered view names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.views.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All registered definitions
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ViewDefinition>> {
        self.views.values()
    }

    /// Number of registered views
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
