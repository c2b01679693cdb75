//! Resolution Rule Table ("hierarchy of truth")
//!
//! For every parameter a bridge emits there is an ordered list of sources
//! and a documented default. The first source holding a usable value wins.
//! When none does, the default is used and a warning is recorded, so a
//! value is never silently missing.

use crate::error::RgdResult;
use crate::model::{Entity, JointKind, RobotModel, DEFAULT_RANGE_RAD};
use crate::profile::Params;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Containers searched after the top level of a layer.
pub const SUB_CONTAINERS: &[&str] = &[
    "limits",
    "application_limits",
    "joint_limits",
    "control_defaults",
    "position_mode_gains",
    "velocity_mode_gains",
    "advanced_impedance_model",
    "transmission_config",
];

/// Default ros2_control hardware plugin.
pub const DEFAULT_DRIVER_PLUGIN: &str = "rgd_ros2_control/GenericSystem";

const DRIVER_PLUGIN_KEYS: &[&str] = &["driver_plugin_str"];

/// Which entity layer a source reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Topology instance with its profile chain resolved
    Application,
    /// Actuation dynamics entry
    Physical,
    /// Driver mapping entry
    Hardware,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Application => write!(f, "application"),
            Layer::Physical => write!(f, "physical"),
            Layer::Hardware => write!(f, "hardware"),
        }
    }
}

/// One candidate source of a rule
#[derive(Debug, Clone, Copy)]
pub enum Source {
    /// First of `keys` present in the layer
    Field(Layer, &'static [&'static str]),
    /// Element `index` of a `[min, max]` list found under `keys`
    RangeBound(Layer, &'static [&'static str], usize),
}

/// Default used when every source is empty
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    Number(f64),
    Integer(i64),
    Text(&'static str),
}

impl Fallback {
    fn value(&self) -> Value {
        match self {
            Fallback::Number(n) => Value::from(*n),
            Fallback::Integer(i) => Value::from(*i),
            Fallback::Text(s) => Value::from(*s),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Fallback::Number(_) | Fallback::Integer(_) => value.is_number(),
            Fallback::Text(_) => value.is_string() || value.is_number(),
        }
    }
}

/// Parameters bridges consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Param {
    Effort,
    Velocity,
    Lower,
    Upper,
    Damping,
    Friction,
    Kp,
    Ki,
    Kd,
    CanId,
    Bus,
}

impl Param {
    pub const ALL: [Param; 11] = [
        Param::Effort,
        Param::Velocity,
        Param::Lower,
        Param::Upper,
        Param::Damping,
        Param::Friction,
        Param::Kp,
        Param::Ki,
        Param::Kd,
        Param::CanId,
        Param::Bus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Param::Effort => "effort",
            Param::Velocity => "velocity",
            Param::Lower => "lower",
            Param::Upper => "upper",
            Param::Damping => "damping",
            Param::Friction => "friction",
            Param::Kp => "kp",
            Param::Ki => "ki",
            Param::Kd => "kd",
            Param::CanId => "can_id",
            Param::Bus => "bus",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordered sources plus default for one parameter
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub param: Param,
    pub sources: &'static [Source],
    pub default: Fallback,
}

use Layer::{Application as App, Hardware as Hw, Physical as Phys};

const RANGE_KEYS: &[&str] = &["soft_position_limits_rad", "range_rad", "range"];

const EFFORT: &[Source] = &[
    Source::Field(App, &["torque_limit_peak_nm_float", "effort"]),
    Source::Field(Phys, &["max_torque_nm_float", "torque_nm", "effort"]),
];
const VELOCITY: &[Source] = &[
    Source::Field(App, &["velocity_limit_rad_s_float", "velocity"]),
    Source::Field(Phys, &["max_velocity_rad_s_float", "velocity_rads", "velocity"]),
];
const LOWER: &[Source] = &[
    Source::Field(App, &["soft_min_position_rad_float"]),
    Source::RangeBound(Phys, RANGE_KEYS, 0),
    Source::Field(Phys, &["soft_min_position_rad_float", "lower"]),
];
const UPPER: &[Source] = &[
    Source::Field(App, &["soft_max_position_rad_float"]),
    Source::RangeBound(Phys, RANGE_KEYS, 1),
    Source::Field(Phys, &["soft_max_position_rad_float", "upper"]),
];
const DAMPING: &[Source] = &[Source::Field(
    Phys,
    &["viscous_friction_nm_s_per_rad_float", "damping"],
)];
const FRICTION: &[Source] = &[Source::Field(Phys, &["coulomb_friction_nm_float", "friction"])];
const KP: &[Source] = &[
    Source::Field(App, &["kp_position_float", "kp"]),
    Source::Field(App, &["stiffness_nm_rad_float", "stiffness"]),
    Source::Field(Phys, &["stiffness_nm_rad_float", "stiffness"]),
];
const KI: &[Source] = &[Source::Field(App, &["ki_position_float", "ki"])];
const KD: &[Source] = &[
    Source::Field(App, &["kd_position_float", "kd"]),
    Source::Field(App, &["damping_nms_rad_float"]),
    Source::Field(Phys, &["damping_nms_rad_float"]),
];
const CAN_ID: &[Source] = &[Source::Field(Hw, &["device_node_id_int", "can_id", "id"])];
const BUS: &[Source] = &[Source::Field(Hw, &["bus_interface_str", "bus"])];

/// The rule for `param`.
pub fn rule(param: Param) -> Rule {
    let (sources, default) = match param {
        Param::Effort => (EFFORT, Fallback::Number(0.0)),
        Param::Velocity => (VELOCITY, Fallback::Number(0.0)),
        Param::Lower => (LOWER, Fallback::Number(DEFAULT_RANGE_RAD.0)),
        Param::Upper => (UPPER, Fallback::Number(DEFAULT_RANGE_RAD.1)),
        Param::Damping => (DAMPING, Fallback::Number(0.0)),
        Param::Friction => (FRICTION, Fallback::Number(0.0)),
        Param::Kp => (KP, Fallback::Number(0.0)),
        Param::Ki => (KI, Fallback::Number(0.0)),
        Param::Kd => (KD, Fallback::Number(0.0)),
        Param::CanId => (CAN_ID, Fallback::Integer(0)),
        Param::Bus => (BUS, Fallback::Text("can0")),
    };
    Rule {
        param,
        sources,
        default,
    }
}

/// Look `keys` up at the top level of `data`, then inside each of the
/// [`SUB_CONTAINERS`].
pub fn extract<'a>(data: &'a Params, keys: &[&str]) -> Option<&'a Value> {
    if let Some(v) = keys.iter().find_map(|k| data.get(*k)) {
        return Some(v);
    }
    SUB_CONTAINERS
        .iter()
        .filter_map(|c| data.get(*c).and_then(Value::as_object))
        .find_map(|sub| keys.iter().find_map(|k| sub.get(*k)))
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Layer(Layer),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub origin: Origin,
}

/// One entity with every parameter of the rule table resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJoint {
    pub name: String,
    pub kind: JointKind,
    pub profile: Option<String>,
    pub values: BTreeMap<Param, Resolved>,
}

impl ResolvedJoint {
    pub fn get(&self, param: Param) -> Option<&Resolved> {
        self.values.get(&param)
    }

    pub fn number(&self, param: Param) -> f64 {
        self.values
            .get(&param)
            .and_then(|r| r.value.as_f64())
            .unwrap_or(0.0)
    }

    /// Textual form for templated output: integers stay integers, other
    /// numbers keep a decimal point.
    pub fn text(&self, param: Param) -> String {
        match self.values.get(&param).map(|r| &r.value) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            Some(Value::Number(n)) => format_float(n.as_f64().unwrap_or(0.0)),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

pub fn format_float(v: f64) -> String {
    format!("{:?}", v)
}

/// Resolve every parameter of `entity`. Warnings are appended for each
/// fall-through to a default and for values of the wrong type.
pub fn resolve_joint(
    model: &RobotModel,
    entity: &Entity,
    warnings: &mut Vec<String>,
) -> RgdResult<ResolvedJoint> {
    let application = model.effective(entity)?;
    let layer = |l: Layer| layer_of(l, &application, entity);

    let mut values = BTreeMap::new();
    for param in Param::ALL {
        let rule = rule(param);
        let mut found = None;

        for source in rule.sources {
            let candidate = match *source {
                Source::Field(l, keys) => extract(layer(l), keys).map(|v| (l, v.clone())),
                Source::RangeBound(l, keys, idx) => extract(layer(l), keys)
                    .and_then(Value::as_array)
                    .and_then(|range| range.get(idx))
                    .map(|v| (l, v.clone())),
            };
            let Some((l, value)) = candidate else { continue };
            if value.is_null() {
                continue;
            }
            if !rule.default.accepts(&value) {
                warn(
                    warnings,
                    format!(
                        "joint '{}': {} value {} in {} layer has the wrong type, skipped",
                        entity.id, param, value, l
                    ),
                );
                continue;
            }
            found = Some(Resolved {
                value,
                origin: Origin::Layer(l),
            });
            break;
        }

        let resolved = found.unwrap_or_else(|| {
            let value = rule.default.value();
            warn(
                warnings,
                format!(
                    "joint '{}': no value for {}, using default {}",
                    entity.id, param, value
                ),
            );
            Resolved {
                value,
                origin: Origin::Default,
            }
        });
        values.insert(param, resolved);
    }

    Ok(ResolvedJoint {
        name: entity.id.clone(),
        kind: entity.kind,
        profile: entity.profile.clone(),
        values,
    })
}

fn layer_of<'a>(layer: Layer, application: &'a Params, entity: &'a Entity) -> &'a Params {
    match layer {
        Layer::Application => application,
        Layer::Physical => &entity.physical,
        Layer::Hardware => &entity.hardware,
    }
}

/// Hardware plugin: the first `driver_plugin_str` found on any entity.
pub fn driver_plugin(model: &RobotModel, warnings: &mut Vec<String>) -> String {
    let found = model
        .entities
        .values()
        .find_map(|e| extract(&e.hardware, DRIVER_PLUGIN_KEYS).and_then(Value::as_str));
    match found {
        Some(plugin) => plugin.to_string(),
        None => {
            warn(
                warnings,
                format!("no driver plugin declared, using default {}", DEFAULT_DRIVER_PLUGIN),
            );
            DEFAULT_DRIVER_PLUGIN.to_string()
        }
    }
}

fn warn(warnings: &mut Vec<String>, message: String) {
    log::warn!("{}", message);
    warnings.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelSource;
    use crate::profile::Profile;
    use serde_json::json;

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    fn model_with(entity: Entity) -> RobotModel {
        let mut model = RobotModel::new("bot", ModelSource::Spec);
        model.insert("test", entity).unwrap();
        model
    }

    fn effort_of(entity: Entity) -> (Resolved, Vec<String>) {
        let model = model_with(entity.clone());
        let mut warnings = Vec::new();
        let joint = resolve_joint(&model, &entity, &mut warnings).unwrap();
        (joint.get(Param::Effort).cloned().unwrap(), warnings)
    }

    #[test]
    fn test_application_beats_physical_beats_default() {
        let both = Entity::new("elbow", JointKind::Revolute)
            .with_overrides(params(json!({"torque_limit_peak_nm_float": 50})))
            .with_physical(params(json!({"limits": {"max_torque_nm_float": 80}})));
        let (r, _) = effort_of(both);
        assert_eq!(r.value, json!(50));
        assert_eq!(r.origin, Origin::Layer(Layer::Application));

        let physical_only = Entity::new("elbow", JointKind::Revolute)
            .with_physical(params(json!({"limits": {"max_torque_nm_float": 80}})));
        let (r, _) = effort_of(physical_only);
        assert_eq!(r.value, json!(80));

        let neither = Entity::new("elbow", JointKind::Revolute);
        let (r, warnings) = effort_of(neither);
        assert_eq!(r.value, json!(0.0));
        assert_eq!(r.origin, Origin::Default);
        assert!(warnings.iter().any(|w| w.contains("elbow") && w.contains("effort")));
    }

    #[test]
    fn test_range_list_feeds_bounds() {
        let entity = Entity::new("j", JointKind::Revolute)
            .with_physical(params(json!({"limits": {"range_rad": [-1.0, 2.0]}})));
        let model = model_with(entity.clone());
        let mut warnings = Vec::new();
        let joint = resolve_joint(&model, &entity, &mut warnings).unwrap();
        assert_eq!(joint.number(Param::Lower), -1.0);
        assert_eq!(joint.number(Param::Upper), 2.0);
    }

    #[test]
    fn test_profile_is_resolved_before_lookup() {
        let entity = Entity::new("j", JointKind::Revolute).with_profile("fast");
        let mut model = model_with(entity.clone());
        model
            .profiles
            .insert(Profile::new("fast", params(json!({"position_mode_gains": {"kp_position_float": 42.5}}))));
        let mut warnings = Vec::new();
        let joint = resolve_joint(&model, &entity, &mut warnings).unwrap();
        assert_eq!(joint.number(Param::Kp), 42.5);
        assert_eq!(joint.text(Param::Kp), "42.5");
    }

    #[test]
    fn test_wrong_type_falls_through() {
        let entity = Entity::new("j", JointKind::Revolute)
            .with_overrides(params(json!({"effort": "lots"})))
            .with_physical(params(json!({"torque_nm": 3})));
        let (r, warnings) = effort_of(entity);
        assert_eq!(r.value, json!(3));
        assert!(warnings.iter().any(|w| w.contains("wrong type")));
    }

    #[test]
    fn test_hardware_defaults() {
        let entity = Entity::new("j", JointKind::Revolute)
            .with_hardware(params(json!({"device_node_id_int": 12})));
        let model = model_with(entity.clone());
        let mut warnings = Vec::new();
        let joint = resolve_joint(&model, &entity, &mut warnings).unwrap();
        assert_eq!(joint.text(Param::CanId), "12");
        assert_eq!(joint.text(Param::Bus), "can0");
        assert_eq!(driver_plugin(&model, &mut warnings), DEFAULT_DRIVER_PLUGIN);
    }

    #[test]
    fn test_float_formatting_keeps_decimal_point() {
        assert_eq!(format_float(10.0), "10.0");
        assert_eq!(format_float(-3.14), "-3.14");
    }
}
