//! Canonical Model
//!
//! The format-independent robot representation shared by the importers and
//! the export bridges. Importers build it from URDF or USD and serialise it
//! back into spec modules with [`RobotModel::to_modules`]; bridges rebuild
//! it from a compiled machine twin with [`RobotModel::from_unified`].
//!
//! Each entity keeps its parameter layers apart: `overrides` is the
//! application layer from the actuation topology, `physical` the actuation
//! dynamics entry and `hardware` the driver mapping. Effective parameters
//! are computed on demand by the profile resolver and never stored.

use crate::compiler::UnifiedDocument;
use crate::config::{KERNEL_ID, KERNEL_META_GROUP, KERNEL_MODULE_LIST, STANDARD_VERSION};
use crate::error::{RgdError, RgdResult};
use crate::output::GeneratedFile;
use crate::profile::{deep_merge, Params, ProfileSet, PROFILE_USE_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// === Module identifiers ===

pub const DESCRIPTION: &str = "description";
pub const ACTUATION_DYNAMICS: &str = "actuation_dynamics";
pub const ACTUATION_TOPOLOGY: &str = "actuation_topology";
pub const HAL_MAPPING: &str = "hal_mapping";

/// Position bounds used when a joint declares none, in radians.
#[allow(clippy::approx_constant)]
pub const DEFAULT_RANGE_RAD: (f64, f64) = (-3.14, 3.14);

// === Field names ===

pub const PROFILES_MAP: &str = "control_profiles_map";
const INSTANCES_MAP: &str = "joint_actuator_mapping_map";
const DRIVERS_MAP: &str = "actuator_drivers_map";
const JOINT_DYNAMICS_MAP: &str = "joint_dynamics_map";
const ACTUATORS: &str = "actuators";
const TARGET_JOINT: &str = "target_joint_ref_str";
const LOGICAL_ACTUATOR: &str = "logical_actuator_ref_str";
const LEGACY_OVERRIDES: &str = "overrides";
const IGNORED_KEYS: &[&str] = &["meta_group", "__doc__"];

/// Joint kinds the engine distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointKind {
    Revolute,
    Continuous,
    Prismatic,
    Fixed,
}

impl JointKind {
    /// Lenient parse: anything unrecognised is `Fixed`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "revolute" => JointKind::Revolute,
            "continuous" => JointKind::Continuous,
            "prismatic" => JointKind::Prismatic,
            _ => JointKind::Fixed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JointKind::Revolute => "revolute",
            JointKind::Continuous => "continuous",
            JointKind::Prismatic => "prismatic",
            JointKind::Fixed => "fixed",
        }
    }

    pub fn is_actuated(&self) -> bool {
        !matches!(self, JointKind::Fixed)
    }
}

impl fmt::Display for JointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelSource {
    #[default]
    Spec,
    Urdf,
    Usd,
}

impl ModelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSource::Spec => "RGD",
            ModelSource::Urdf => "URDF",
            ModelSource::Usd => "USD",
        }
    }
}

/// An addressable joint/actuator
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub kind: JointKind,
    pub profile: Option<String>,
    /// Application layer (actuation topology instance)
    pub overrides: Params,
    /// Physical layer (actuation dynamics entry)
    pub physical: Params,
    /// Hardware layer (driver mapping)
    pub hardware: Params,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: JointKind) -> Self {
        Self {
            id: id.into(),
            kind,
            profile: None,
            overrides: Params::new(),
            physical: Params::new(),
            hardware: Params::new(),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_physical(mut self, physical: Params) -> Self {
        self.physical = physical;
        self
    }

    pub fn with_overrides(mut self, overrides: Params) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_hardware(mut self, hardware: Params) -> Self {
        self.hardware = hardware;
        self
    }

    fn has_application_layer(&self) -> bool {
        self.profile.is_some() || !self.overrides.is_empty()
    }
}

/// The resolved robot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RobotModel {
    pub name: String,
    pub kernel_id: Option<String>,
    pub links: Vec<String>,
    pub entities: BTreeMap<String, Entity>,
    pub profiles: ProfileSet,
    pub source: ModelSource,
}

impl RobotModel {
    pub fn new(name: impl Into<String>, source: ModelSource) -> Self {
        Self {
            name: name.into(),
            source,
            ..Self::default()
        }
    }

    /// Add an entity; a second entity with the same id is a reference error.
    pub fn insert(&mut self, origin: &str, entity: Entity) -> RgdResult<()> {
        if self.entities.contains_key(&entity.id) {
            return Err(RgdError::reference(
                origin,
                "joint",
                entity.id,
                "duplicate identifier",
            ));
        }
        self.entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn actuated(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.kind.is_actuated())
    }

    /// Application-layer parameters of one entity with its profile chain
    /// folded in.
    pub fn effective(&self, entity: &Entity) -> RgdResult<Params> {
        self.profiles
            .resolve(&entity.id, entity.profile.as_deref(), &entity.overrides)
    }

    /// Identity used in the kernel: the stored kernel id or `did:rgd:<name>`.
    pub fn identity(&self) -> String {
        self.kernel_id
            .clone()
            .unwrap_or_else(|| format!("did:rgd:{}", self.name))
    }

    /// Serialise the model as a spec tree rooted at `spec/`.
    pub fn to_modules(&self) -> RgdResult<Vec<GeneratedFile>> {
        let mut modules: Vec<(&str, &str, Value)> = vec![
            ("01_foundation", DESCRIPTION, self.description_content()),
            ("01_foundation", ACTUATION_DYNAMICS, self.dynamics_content()),
        ];
        if !self.profiles.is_empty() || self.entities.values().any(Entity::has_application_layer) {
            modules.push(("01_foundation", ACTUATION_TOPOLOGY, self.topology_content()));
        }
        if self.entities.values().any(|e| !e.hardware.is_empty()) {
            modules.push(("01_foundation", HAL_MAPPING, self.hal_content()));
        }

        let listed: Vec<Value> = modules
            .iter()
            .map(|(domain, id, _)| Value::String(format!("{}/{}.jsonc", domain, id)))
            .collect();
        let kernel = json!({
            KERNEL_META_GROUP: {
                "id": self.identity(),
                "schema_version": STANDARD_VERSION,
            },
            KERNEL_MODULE_LIST: listed,
        });

        let mut files = vec![module_file(
            "00_core",
            KERNEL_ID,
            &format!("IMPORTED KERNEL ({})", self.source.as_str()),
            &kernel,
        )?];
        for (domain, id, content) in &modules {
            let banner = format!("IMPORTED FROM {}: {}", self.source.as_str(), id);
            files.push(module_file(domain, id, &banner, content)?);
        }
        Ok(files)
    }

    fn description_content(&self) -> Value {
        json!({
            "hardware_id": self.name,
            "source_format": self.source.as_str(),
            "kinematic_chain": self.links,
        })
    }

    fn dynamics_content(&self) -> Value {
        let actuators: Map<String, Value> = self
            .entities
            .values()
            .map(|e| {
                let mut entry = Map::new();
                entry.insert("type".to_string(), Value::String(e.kind.as_str().to_string()));
                entry.extend(e.physical.clone());
                (e.id.clone(), Value::Object(entry))
            })
            .collect();
        json!({ ACTUATORS: actuators })
    }

    fn topology_content(&self) -> Value {
        let profiles: Map<String, Value> = self
            .profiles
            .iter()
            .map(|p| (p.name.clone(), p.to_value()))
            .collect();
        let instances: Map<String, Value> = self
            .entities
            .values()
            .filter(|e| e.has_application_layer())
            .map(|e| {
                let mut entry = e.overrides.clone();
                if let Some(profile) = &e.profile {
                    entry.insert(PROFILE_USE_FIELD.to_string(), Value::String(profile.clone()));
                }
                (e.id.clone(), Value::Object(entry))
            })
            .collect();
        json!({ PROFILES_MAP: profiles, INSTANCES_MAP: instances })
    }

    fn hal_content(&self) -> Value {
        let drivers: Map<String, Value> = self
            .entities
            .values()
            .filter(|e| !e.hardware.is_empty())
            .map(|e| (e.id.clone(), Value::Object(e.hardware.clone())))
            .collect();
        json!({ DRIVERS_MAP: drivers })
    }

    /// Rebuild the model from a machine twin. `actuation_dynamics` is
    /// required; topology, driver mapping, description and kernel are
    /// optional. Profile chains are validated before anything is resolved.
    pub fn from_unified(doc: &UnifiedDocument) -> RgdResult<Self> {
        let dynamics = doc
            .module(ACTUATION_DYNAMICS)
            .ok_or_else(|| RgdError::missing_prerequisite("canonical-model", ACTUATION_DYNAMICS))?;

        let empty = Map::new();
        let topology = doc.module(ACTUATION_TOPOLOGY).and_then(Value::as_object);
        let profiles = topology
            .and_then(|t| t.get(PROFILES_MAP))
            .and_then(Value::as_object)
            .map(ProfileSet::from_map)
            .unwrap_or_default();
        profiles.validate()?;

        let instances = topology
            .and_then(|t| t.get(INSTANCES_MAP))
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let drivers = doc
            .module(HAL_MAPPING)
            .and_then(|h| h.get(DRIVERS_MAP))
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let physics = joints_of(dynamics);

        let description = doc.module(DESCRIPTION);
        let kernel_id = doc
            .module(KERNEL_ID)
            .and_then(|k| k.get(KERNEL_META_GROUP))
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let name = description
            .and_then(|d| d.get("hardware_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| kernel_id.clone())
            .unwrap_or_else(|| "robot".to_string());
        let links = description
            .and_then(|d| d.get(crate::graph::KINEMATIC_CHAIN_FIELD))
            .and_then(Value::as_array)
            .map(|l| l.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        let mut model = RobotModel {
            name,
            kernel_id,
            links,
            entities: BTreeMap::new(),
            profiles,
            source: ModelSource::Spec,
        };

        let keys: BTreeSet<&String> = physics
            .keys()
            .chain(instances.keys())
            .chain(drivers.keys())
            .filter(|k| !IGNORED_KEYS.contains(&k.as_str()))
            .collect();

        for key in keys {
            let p = physics.get(key.as_str()).and_then(Value::as_object).unwrap_or(&empty);
            let t = instances.get(key.as_str()).and_then(Value::as_object).unwrap_or(&empty);
            let h = drivers.get(key.as_str()).and_then(Value::as_object).unwrap_or(&empty);

            let joint = [(t, TARGET_JOINT), (p, TARGET_JOINT), (h, LOGICAL_ACTUATOR)]
                .iter()
                .find_map(|(layer, field)| layer.get(*field).and_then(Value::as_str))
                .unwrap_or(key.as_str())
                .to_string();

            let kind = p
                .get("type")
                .and_then(Value::as_str)
                .map(JointKind::from_name)
                .unwrap_or(JointKind::Revolute);
            let profile = t
                .get(PROFILE_USE_FIELD)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            let mut overrides = without(t, &[PROFILE_USE_FIELD, TARGET_JOINT, LEGACY_OVERRIDES]);
            if let Some(legacy) = t.get(LEGACY_OVERRIDES).and_then(Value::as_object) {
                deep_merge(&mut overrides, legacy);
            }
            let physical = without(p, &["type", TARGET_JOINT]);
            let hardware = without(h, &[LOGICAL_ACTUATOR]);

            match model.entities.get_mut(&joint) {
                Some(existing) => {
                    log::debug!("merging '{}' into joint '{}'", key, joint);
                    deep_merge(&mut existing.overrides, &overrides);
                    deep_merge(&mut existing.physical, &physical);
                    deep_merge(&mut existing.hardware, &hardware);
                    if existing.profile.is_none() {
                        existing.profile = profile;
                    }
                    if p.contains_key("type") {
                        existing.kind = kind;
                    }
                }
                None => {
                    let mut entity = Entity::new(joint.clone(), kind)
                        .with_overrides(overrides)
                        .with_physical(physical)
                        .with_hardware(hardware);
                    entity.profile = profile;
                    model.entities.insert(joint, entity);
                }
            }
        }

        for entity in model.entities.values() {
            if let Some(profile) = &entity.profile {
                if !model.profiles.contains(profile) {
                    return Err(RgdError::reference(
                        entity.id.clone(),
                        PROFILE_USE_FIELD,
                        profile.clone(),
                        "unknown profile",
                    ));
                }
            }
        }

        log::debug!(
            "canonical model '{}' with {} entities and {} profiles",
            model.name,
            model.entities.len(),
            model.profiles.len()
        );
        Ok(model)
    }
}

/// Joint entries of an actuation dynamics module.
fn joints_of(content: &Value) -> Map<String, Value> {
    for container in [JOINT_DYNAMICS_MAP, ACTUATORS] {
        if let Some(map) = content.get(container).and_then(Value::as_object) {
            return map.clone();
        }
    }
    content
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(k, v)| v.is_object() && !IGNORED_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn without(map: &Map<String, Value>, keys: &[&str]) -> Params {
    map.iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn module_file(domain: &str, id: &str, banner: &str, content: &Value) -> RgdResult<GeneratedFile> {
    let body = serde_json::to_string_pretty(content)?;
    Ok(GeneratedFile::new(
        format!("spec/{}/{}.jsonc", domain, id),
        format!("/** {} */\n{}\n", banner, body),
    ))
}
