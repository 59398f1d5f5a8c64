//! Object-state handles and their resolution against the simulator
//!
//! A goal refers to targets by name. Each name resolves once, at setup, to
//! an [`ObjectState`]: either a rigid object with its own body and contact
//! geometries, or a site carved out of a parent object's geometry. Both
//! kinds answer the same [`ObjectStateQueryable`] queries, so predicates
//! and shaping never branch on the kind themselves.

use std::collections::HashMap;

use nalgebra::{Point3, Rotation3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::articulation::ArticulationRange;
use crate::definition::{site_local_name, split_object_name, DefinitionCatalog};
use crate::error::{GoalError, Result};
use crate::geometry::GeomSet;
use crate::sim::Simulator;

/// Which representation a target uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// A rigid object with its own body
    Rigid,
    /// A named sub-region of a parent object
    Site,
}

/// Identifies one addressable target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectStateHandle {
    /// Instance name of the object or site
    pub object_name: String,
    /// Owning object, for sites
    pub parent_name: Option<String>,
    /// Representation
    pub state_kind: StateKind,
}

impl ObjectStateHandle {
    /// Handle for a rigid object
    pub fn rigid(name: impl Into<String>) -> Self {
        Self {
            object_name: name.into(),
            parent_name: None,
            state_kind: StateKind::Rigid,
        }
    }

    /// Handle for a site of `parent`
    pub fn site(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            object_name: name.into(),
            parent_name: Some(parent.into()),
            state_kind: StateKind::Site,
        }
    }

    /// The object whose definition governs this target
    #[must_use]
    pub fn definition_owner(&self) -> &str {
        self.parent_name.as_deref().unwrap_or(&self.object_name)
    }
}

/// A rigid object as registered by the task loader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigidObjectSpec {
    /// Instance name
    pub name: String,
    /// Names of the object's collision geometries
    #[serde(default)]
    pub contact_geoms: Vec<String>,
    /// Names of the object's joints
    #[serde(default)]
    pub joints: Vec<String>,
    /// Main body name, defaults to `<name>_main`
    #[serde(default)]
    pub main_body: Option<String>,
}

/// A site as registered by the task loader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSpec {
    /// Site name
    pub name: String,
    /// Owning object instance
    pub parent: String,
    /// Joints moving the site (e.g. a drawer slide)
    #[serde(default)]
    pub joints: Vec<String>,
}

/// Every target the task loader knows about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectManifest {
    /// Rigid objects
    #[serde(default)]
    pub objects: Vec<RigidObjectSpec>,
    /// Sites
    #[serde(default)]
    pub sites: Vec<SiteSpec>,
}

impl ObjectManifest {
    fn rigid(&self, name: &str) -> Option<&RigidObjectSpec> {
        self.objects.iter().find(|o| o.name == name)
    }

    fn site(&self, name: &str) -> Option<&SiteSpec> {
        self.sites.iter().find(|s| s.name == name)
    }
}

/// Queries shared by every kind of target
pub trait ObjectStateQueryable {
    /// The handle this state was resolved from
    fn handle(&self) -> &ObjectStateHandle;

    /// Representative world position
    fn position(&self, sim: &dyn Simulator) -> Result<Point3<f64>>;

    /// World orientation
    fn orientation(&self, sim: &dyn Simulator) -> Result<Rotation3<f64>>;

    /// Body whose pose stands for the target
    fn body(&self) -> &str;

    /// Collision geometries making up the target; may be empty
    fn geoms(&self) -> &GeomSet;

    /// Joints whose positions encode open/closed state
    fn joints(&self) -> &[String];

    /// Open/closed ranges of the owning object, if it is articulated
    fn articulation(&self) -> Option<&ArticulationRange>;
}

/// A resolved rigid object
#[derive(Debug, Clone)]
pub struct RigidObjectState {
    handle: ObjectStateHandle,
    body: String,
    geoms: GeomSet,
    joints: Vec<String>,
    articulation: Option<ArticulationRange>,
}

impl RigidObjectState {
    /// Resolve a registered rigid object
    pub fn resolve(spec: &RigidObjectSpec, sim: &dyn Simulator, catalog: &DefinitionCatalog) -> Self {
        let geoms = spec
            .contact_geoms
            .iter()
            .filter_map(|name| {
                let id = sim.geom_id(name);
                if id.is_none() {
                    debug!(object = %spec.name, geom = %name, "contact geom not found in simulator");
                }
                id
            })
            .collect();

        // fixtures like `kitchen_table` have no indexed name and no definition
        let articulation = catalog
            .for_instance(&spec.name)
            .ok()
            .and_then(|d| d.articulation.clone());

        Self {
            handle: ObjectStateHandle::rigid(&spec.name),
            body: spec
                .main_body
                .clone()
                .unwrap_or_else(|| format!("{}_main", spec.name)),
            geoms,
            joints: spec.joints.clone(),
            articulation,
        }
    }
}

impl ObjectStateQueryable for RigidObjectState {
    fn handle(&self) -> &ObjectStateHandle {
        &self.handle
    }

    fn position(&self, sim: &dyn Simulator) -> Result<Point3<f64>> {
        sim.body_position(&self.body)
            .ok_or_else(|| GoalError::missing("body", &self.body))
    }

    fn orientation(&self, sim: &dyn Simulator) -> Result<Rotation3<f64>> {
        sim.body_orientation(&self.body)
            .map(|q| q.to_rotation_matrix())
            .ok_or_else(|| GoalError::missing("body", &self.body))
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn geoms(&self) -> &GeomSet {
        &self.geoms
    }

    fn joints(&self) -> &[String] {
        &self.joints
    }

    fn articulation(&self) -> Option<&ArticulationRange> {
        self.articulation.as_ref()
    }
}

/// A resolved site
#[derive(Debug, Clone)]
pub struct SiteObjectState {
    handle: ObjectStateHandle,
    body: String,
    geoms: GeomSet,
    joints: Vec<String>,
    articulation: Option<ArticulationRange>,
}

impl SiteObjectState {
    /// Resolve a site by matching the parent's geometries against the
    /// offsets recorded in the parent type's definition.
    ///
    /// Fails if the parent name is not `<type>_<index>` or the type has no
    /// definition. A site with no matching geometry resolves to an empty set.
    pub fn resolve(
        spec: &SiteSpec,
        parent: Option<&RigidObjectSpec>,
        sim: &dyn Simulator,
        catalog: &DefinitionCatalog,
    ) -> Result<Self> {
        let (parent_type, _) = split_object_name(&spec.parent)?;
        let definition = catalog.get(parent_type)?;
        let local = site_local_name(&spec.name, &spec.parent);
        let site_def = definition.sites.get(local);

        let body = site_def
            .and_then(|d| d.body.as_deref())
            .map_or_else(|| format!("{}_main", spec.parent), |b| format!("{}_{b}", spec.parent));

        let mut geoms = GeomSet::new();
        if let Some(site_def) = site_def {
            let candidates = parent
                .into_iter()
                .flat_map(|p| p.contact_geoms.iter())
                .filter_map(|name| sim.geom_id(name))
                .chain(sim.body_geoms(&body));
            for geom in candidates {
                let Some(offset) = sim.geom_local_offset(geom) else {
                    continue;
                };
                if site_def.geom_offsets.iter().any(|recorded| *recorded == offset) {
                    geoms.insert(geom);
                }
            }
        }

        if geoms.is_empty() {
            warn!(site = %spec.name, parent = %spec.parent, "no geometry matches site definition");
        } else {
            debug!(site = %spec.name, count = geoms.len(), "resolved site geometry");
        }

        Ok(Self {
            handle: ObjectStateHandle::site(&spec.name, &spec.parent),
            body,
            geoms,
            joints: spec.joints.clone(),
            articulation: definition.articulation.clone(),
        })
    }
}

impl ObjectStateQueryable for SiteObjectState {
    fn handle(&self) -> &ObjectStateHandle {
        &self.handle
    }

    fn position(&self, sim: &dyn Simulator) -> Result<Point3<f64>> {
        let name = &self.handle.object_name;
        sim.site_position(name)
            .ok_or_else(|| GoalError::missing("site", name))
    }

    fn orientation(&self, sim: &dyn Simulator) -> Result<Rotation3<f64>> {
        let name = &self.handle.object_name;
        sim.site_orientation(name)
            .ok_or_else(|| GoalError::missing("site", name))
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn geoms(&self) -> &GeomSet {
        &self.geoms
    }

    fn joints(&self) -> &[String] {
        &self.joints
    }

    fn articulation(&self) -> Option<&ArticulationRange> {
        self.articulation.as_ref()
    }
}

/// A resolved target of either kind
#[derive(Debug, Clone)]
pub enum ObjectState {
    /// Rigid object
    Rigid(RigidObjectState),
    /// Site
    Site(SiteObjectState),
}

macro_rules! dispatch {
    ($self:ident, $state:ident => $body:expr) => {
        match $self {
            ObjectState::Rigid($state) => $body,
            ObjectState::Site($state) => $body,
        }
    };
}

impl ObjectStateQueryable for ObjectState {
    fn handle(&self) -> &ObjectStateHandle {
        dispatch!(self, s => s.handle())
    }

    fn position(&self, sim: &dyn Simulator) -> Result<Point3<f64>> {
        dispatch!(self, s => s.position(sim))
    }

    fn orientation(&self, sim: &dyn Simulator) -> Result<Rotation3<f64>> {
        dispatch!(self, s => s.orientation(sim))
    }

    fn body(&self) -> &str {
        dispatch!(self, s => s.body())
    }

    fn geoms(&self) -> &GeomSet {
        dispatch!(self, s => s.geoms())
    }

    fn joints(&self) -> &[String] {
        dispatch!(self, s => s.joints())
    }

    fn articulation(&self) -> Option<&ArticulationRange> {
        dispatch!(self, s => s.articulation())
    }
}

impl ObjectState {
    /// Instance name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.handle().object_name
    }

    /// Representation
    #[must_use]
    pub fn kind(&self) -> StateKind {
        self.handle().state_kind
    }
}

/// Resolved targets by name, populated at environment reset
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    states: HashMap<String, ObjectState>,
}

impl ObjectRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every name in `names` against the manifest.
    ///
    /// Names already resolved are skipped.
    pub fn resolve<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
        manifest: &ObjectManifest,
        sim: &dyn Simulator,
        catalog: &DefinitionCatalog,
    ) -> Result<()> {
        for name in names {
            if self.states.contains_key(name) {
                continue;
            }
            let state = if let Some(spec) = manifest.rigid(name) {
                ObjectState::Rigid(RigidObjectState::resolve(spec, sim, catalog))
            } else if let Some(spec) = manifest.site(name) {
                let parent = manifest.rigid(&spec.parent);
                ObjectState::Site(SiteObjectState::resolve(spec, parent, sim, catalog)?)
            } else {
                return Err(GoalError::UnknownObject(name.to_string()));
            };
            self.states.insert(name.to_string(), state);
        }
        Ok(())
    }

    /// Insert an already-resolved state
    pub fn insert(&mut self, state: ObjectState) {
        self.states.insert(state.name().to_string(), state);
    }

    /// Look up a resolved target
    pub fn get(&self, name: &str) -> Result<&ObjectState> {
        self.states
            .get(name)
            .ok_or_else(|| GoalError::UnknownObject(name.to_string()))
    }

    /// Number of resolved targets
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether nothing has been resolved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
