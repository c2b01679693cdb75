//! Export Bridges
//!
//! A bridge is a pure function from a canonical model to generated files.
//! Both bridges share the same front half: rebuild the model from the
//! machine twin, fold profiles into each entity, then resolve every
//! parameter through the rule table in [`rules`]. Only the rendering
//! differs.

pub mod isaac;
pub mod ros2;
pub mod rules;

use crate::compiler::UnifiedDocument;
use crate::error::{RgdError, RgdResult};
use crate::model::{RobotModel, ACTUATION_DYNAMICS};
use crate::output::GeneratedFile;
use rules::ResolvedJoint;
use std::fmt;

/// Registered export targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeTarget {
    /// ros2_control controller, limits and hardware description
    Ros2,
    /// Isaac Lab actuator groups
    Isaac,
}

impl BridgeTarget {
    pub fn all() -> &'static [BridgeTarget] {
        &[BridgeTarget::Ros2, BridgeTarget::Isaac]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BridgeTarget::Ros2 => "ros2",
            BridgeTarget::Isaac => "isaac",
        }
    }

    pub fn from_name(name: &str) -> RgdResult<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|t| t.name() == wanted || (wanted == "ros" && *t == BridgeTarget::Ros2))
            .ok_or_else(|| RgdError::UnsupportedFormat {
                format: name.to_string(),
                guidance: format!(
                    "known bridge targets: {}",
                    Self::all().iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
                ),
            })
    }

    /// Names of the files this bridge writes.
    pub fn file_names(&self) -> &'static [&'static str] {
        match self {
            BridgeTarget::Ros2 => &[ros2::CONTROL_FILE, ros2::LIMITS_FILE, ros2::HARDWARE_FILE],
            BridgeTarget::Isaac => &[isaac::ACTUATORS_FILE],
        }
    }
}

impl fmt::Display for BridgeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Files generated by one bridge run
#[derive(Debug, Clone, Default)]
pub struct BridgeOutput {
    pub files: Vec<GeneratedFile>,
    /// Default fall-throughs and skipped values
    pub warnings: Vec<String>,
}

/// Canonical model with every actuated joint resolved
#[derive(Debug, Clone)]
pub struct BridgeInput {
    pub model: RobotModel,
    pub joints: Vec<ResolvedJoint>,
}

impl BridgeInput {
    /// Rebuild and resolve the model of `doc` for `target`.
    pub fn prepare(
        target: BridgeTarget,
        doc: &UnifiedDocument,
        warnings: &mut Vec<String>,
    ) -> RgdResult<Self> {
        if doc.module(ACTUATION_DYNAMICS).is_none() {
            return Err(RgdError::missing_prerequisite(target.name(), ACTUATION_DYNAMICS));
        }
        let model = RobotModel::from_unified(doc)?;

        let joints = model
            .actuated()
            .map(|entity| rules::resolve_joint(&model, entity, warnings))
            .collect::<RgdResult<Vec<_>>>()?;

        if joints.is_empty() {
            let message = format!("{}: no actuated joints in {}", target, ACTUATION_DYNAMICS);
            log::warn!("{}", message);
            warnings.push(message);
        }
        Ok(Self { model, joints })
    }
}

/// Run `target` on a compiled document.
pub fn export(target: BridgeTarget, doc: &UnifiedDocument) -> RgdResult<BridgeOutput> {
    let mut output = BridgeOutput::default();
    let input = BridgeInput::prepare(target, doc, &mut output.warnings)?;

    output.files = match target {
        BridgeTarget::Ros2 => ros2::generate(&input, &mut output.warnings)?,
        BridgeTarget::Isaac => isaac::generate(&input)?,
    };

    log::info!(
        "{} bridge: {} file(s), {} joint(s), {} warning(s)",
        target,
        output.files.len(),
        input.joints.len(),
        output.warnings.len()
    );
    Ok(output)
}

/// Run `target` on machine twin text.
pub fn export_json(target: BridgeTarget, machine: &str) -> RgdResult<BridgeOutput> {
    let doc = UnifiedDocument::from_json(machine)?;
    export(target, &doc)
}

/// Escape text for use inside an XML attribute.
pub(crate) fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compiler::{DocumentMeta, UnifiedRecord};
    use crate::model::{ACTUATION_TOPOLOGY, DESCRIPTION, HAL_MAPPING};
    use serde_json::{json, Value};

    pub(crate) fn doc(modules: Vec<(&str, Value)>) -> UnifiedDocument {
        UnifiedDocument {
            meta: DocumentMeta::new(modules.len()),
            files: modules
                .into_iter()
                .map(|(id, content)| UnifiedRecord {
                    path: format!("spec/01_foundation/{}.jsonc", id),
                    id: id.to_string(),
                    domain: "01_foundation".to_string(),
                    content,
                })
                .collect(),
        }
    }

    /// Two joints on one profile plus a third standing alone.
    pub(crate) fn arm() -> UnifiedDocument {
        doc(vec![
            (DESCRIPTION, json!({"hardware_id": "arm"})),
            (
                ACTUATION_DYNAMICS,
                json!({"actuators": {
                    "shoulder": {"type": "revolute", "limits": {"max_torque_nm_float": 80, "range_rad": [-1.5, 1.5]}},
                    "elbow": {"type": "revolute", "limits": {"max_torque_nm_float": 80, "range_rad": [-1.5, 1.5]}},
                    "wrist": {"type": "continuous", "limits": {"max_torque_nm_float": 10}}
                }}),
            ),
            (
                ACTUATION_TOPOLOGY,
                json!({
                    "control_profiles_map": {
                        "heavy": {"position_mode_gains": {"kp_position_float": 100, "kd_position_float": 5}}
                    },
                    "joint_actuator_mapping_map": {
                        "shoulder": {"use_profile_ref_str": "heavy"},
                        "elbow": {"use_profile_ref_str": "heavy"}
                    }
                }),
            ),
            (
                HAL_MAPPING,
                json!({"actuator_drivers_map": {
                    "shoulder": {"device_node_id_int": 1, "bus_interface_str": "can1", "driver_plugin_str": "acme/ArmSystem"}
                }}),
            ),
        ])
    }

    fn limits_of(output: &BridgeOutput) -> &str {
        &output
            .files
            .iter()
            .find(|f| f.path == ros2::LIMITS_FILE)
            .unwrap()
            .contents
    }

    fn with_torques(application: Option<f64>, physical: Option<f64>) -> UnifiedDocument {
        let mut limits = json!({});
        if let Some(t) = physical {
            limits["max_torque_nm_float"] = json!(t);
        }
        let mut instance = json!({});
        if let Some(t) = application {
            instance["torque_limit_peak_nm_float"] = json!(t);
        }
        doc(vec![
            (
                ACTUATION_DYNAMICS,
                json!({"actuators": {"elbow": {"type": "revolute", "limits": limits}}}),
            ),
            (
                ACTUATION_TOPOLOGY,
                json!({"joint_actuator_mapping_map": {"elbow": instance}}),
            ),
        ])
    }

    #[test]
    fn test_hierarchy_of_truth() {
        let both = export(BridgeTarget::Ros2, &with_torques(Some(50.0), Some(80.0))).unwrap();
        assert!(limits_of(&both).contains(r#"name="elbow_effort" value="50.0""#));

        let physical = export(BridgeTarget::Ros2, &with_torques(None, Some(80.0))).unwrap();
        assert!(limits_of(&physical).contains(r#"name="elbow_effort" value="80.0""#));

        let neither = export(BridgeTarget::Ros2, &with_torques(None, None)).unwrap();
        assert!(limits_of(&neither).contains(r#"name="elbow_effort" value="0.0""#));
        assert!(neither
            .warnings
            .iter()
            .any(|w| w.contains("elbow") && w.contains("effort")));
    }

    #[test]
    fn test_missing_dynamics_is_prerequisite_error() {
        let d = doc(vec![(DESCRIPTION, json!({"hardware_id": "arm"}))]);
        for target in BridgeTarget::all() {
            match export(*target, &d) {
                Err(RgdError::MissingPrerequisite { bridge, module }) => {
                    assert_eq!(bridge, target.name());
                    assert_eq!(module, ACTUATION_DYNAMICS);
                }
                other => panic!("expected missing prerequisite, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_dynamics_emits_defaults_with_warning() {
        let d = doc(vec![(ACTUATION_DYNAMICS, json!({"actuators": {}}))]);
        let output = export(BridgeTarget::Ros2, &d).unwrap();
        assert_eq!(output.files.len(), 3);
        assert!(output.warnings.iter().any(|w| w.contains("no actuated joints")));
    }

    #[test]
    fn test_export_is_deterministic() {
        let a = export(BridgeTarget::Isaac, &arm()).unwrap();
        let b = export(BridgeTarget::Isaac, &arm()).unwrap();
        assert_eq!(a.files, b.files);
    }

    #[test]
    fn test_export_json_reads_machine_twin() {
        let machine = arm().to_json().unwrap();
        let output = export_json(BridgeTarget::Ros2, &machine).unwrap();
        let names: Vec<&str> = output.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, BridgeTarget::Ros2.file_names());
    }

    #[test]
    fn test_target_names() {
        assert_eq!(BridgeTarget::from_name("ROS2").unwrap(), BridgeTarget::Ros2);
        assert_eq!(BridgeTarget::from_name("isaac").unwrap(), BridgeTarget::Isaac);
        assert!(matches!(
            BridgeTarget::from_name("gazebo"),
            Err(RgdError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape(r#"a<b>&"c""#), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
