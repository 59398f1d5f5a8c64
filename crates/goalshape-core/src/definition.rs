//! Per-type object definitions and instance-name parsing

use std::collections::HashMap;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::articulation::ArticulationRange;
use crate::error::{GoalError, Result};

/// Geometry recorded for one named site of an object type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteDefinition {
    /// Body (local name, without the instance prefix) the site hangs off
    #[serde(default)]
    pub body: Option<String>,
    /// Offsets of the geometries that make up the site, relative to their body
    #[serde(default)]
    pub geom_offsets: Vec<Vector3<f64>>,
}

/// Everything recorded about one object type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    /// Joint ranges, for articulated types only
    #[serde(default)]
    pub articulation: Option<ArticulationRange>,
    /// Sites keyed by local name (e.g. `top_region`)
    #[serde(default)]
    pub sites: HashMap<String, SiteDefinition>,
}

impl ObjectDefinition {
    /// Whether instances of this type have usable open/close ranges
    #[must_use]
    pub fn is_articulated(&self) -> bool {
        self.articulation.is_some()
    }
}

/// Definitions keyed by object type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionCatalog {
    definitions: HashMap<String, ObjectDefinition>,
}

impl DefinitionCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the definition of an object type
    pub fn insert(&mut self, object_type: impl Into<String>, definition: ObjectDefinition) {
        self.definitions.insert(object_type.into(), definition);
    }

    /// Parse a catalog from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a catalog from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Definition of an object type
    pub fn get(&self, object_type: &str) -> Result<&ObjectDefinition> {
        self.definitions
            .get(object_type)
            .ok_or_else(|| GoalError::UnknownDefinition(object_type.to_string()))
    }

    /// Definition of the type an instance name belongs to
    pub fn for_instance(&self, instance: &str) -> Result<&ObjectDefinition> {
        let (object_type, _) = split_object_name(instance)?;
        self.get(object_type)
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no types are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Split an instance name such as `wooden_cabinet_1` into its type and index.
///
/// The type must start with a letter and contain only letters and
/// underscores; the index is the trailing integer.
pub fn split_object_name(name: &str) -> Result<(&str, u32)> {
    let malformed = || GoalError::MalformedName(name.to_string());
    let (prefix, index) = name.rsplit_once('_').ok_or_else(malformed)?;

    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let starts_alpha = prefix.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_alpha || !prefix.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        return Err(malformed());
    }
    let index = index.parse().map_err(|_| malformed())?;
    Ok((prefix, index))
}

/// Local name of a site relative to its parent instance
/// (`wooden_cabinet_1_top_region` -> `top_region`)
#[must_use]
pub fn site_local_name<'a>(site: &'a str, parent: &str) -> &'a str {
    site.strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(site)
}
