//! Isaac bridge
//!
//! Emits Isaac Lab implicit actuator groups. Joints are grouped by profile
//! so shared settings appear once; a joint whose resolved values differ
//! from the rest of its profile gets its own group, so grouping never
//! changes a value.

use super::rules::Param;
use super::BridgeInput;
use crate::error::RgdResult;
use crate::output::GeneratedFile;
use serde::Serialize;
use std::collections::BTreeMap;

pub const ACTUATORS_FILE: &str = "isaac_actuators.yaml";

const ACTUATOR_CLASS: &str = "ImplicitActuatorCfg";

#[derive(Serialize)]
struct ActuatorsFile {
    robot: String,
    identity: String,
    actuators: BTreeMap<String, ActuatorGroup>,
}

#[derive(Debug, Clone, Serialize)]
struct ActuatorGroup {
    class_type: &'static str,
    joint_names_expr: Vec<String>,
    #[serde(flatten)]
    settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Settings {
    effort_limit: f64,
    velocity_limit: f64,
    stiffness: f64,
    damping: f64,
    friction: f64,
}

pub fn generate(input: &BridgeInput) -> RgdResult<Vec<GeneratedFile>> {
    let file = ActuatorsFile {
        robot: input.model.name.clone(),
        identity: input.model.identity(),
        actuators: group(input),
    };
    let contents = format!(
        "# GENERATED BY RGD ISAAC BRIDGE: {}\n{}",
        file.identity,
        serde_yaml::to_string(&file)?
    );
    Ok(vec![GeneratedFile::new(ACTUATORS_FILE, contents)])
}

fn group(input: &BridgeInput) -> BTreeMap<String, ActuatorGroup> {
    // (base name, group name, group)
    let mut groups: Vec<(String, String, ActuatorGroup)> = Vec::new();

    for joint in &input.joints {
        let settings = Settings {
            effort_limit: joint.number(Param::Effort),
            velocity_limit: joint.number(Param::Velocity),
            stiffness: joint.number(Param::Kp),
            damping: joint.number(Param::Kd),
            friction: joint.number(Param::Friction),
        };
        let base = joint.profile.clone().unwrap_or_else(|| joint.name.clone());

        if let Some((_, _, existing)) = groups
            .iter_mut()
            .find(|(b, _, g)| *b == base && g.settings == settings)
        {
            existing.joint_names_expr.push(joint.name.clone());
            continue;
        }

        let mut name = base.clone();
        let mut n = 2;
        while groups.iter().any(|(_, taken, _)| *taken == name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        if name != base {
            log::debug!("joint '{}' diverges from group '{}', emitted as '{}'", joint.name, base, name);
        }
        groups.push((
            base,
            name,
            ActuatorGroup {
                class_type: ACTUATOR_CLASS,
                joint_names_expr: vec![joint.name.clone()],
                settings,
            },
        ));
    }

    groups.into_iter().map(|(_, name, g)| (name, g)).collect()
}

#[cfg(test)]
mod tests {
    use super::super::tests::{arm, doc};
    use super::super::{export, BridgeTarget};
    use super::*;
    use crate::model::{ACTUATION_DYNAMICS, ACTUATION_TOPOLOGY};
    use serde_json::json;

    fn actuators(output: &super::super::BridgeOutput) -> serde_yaml::Value {
        let text = &output.files[0].contents;
        assert!(text.starts_with("# GENERATED BY RGD ISAAC BRIDGE"));
        let yaml: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
        yaml["actuators"].clone()
    }

    fn names(group: &serde_yaml::Value) -> Vec<String> {
        group["joint_names_expr"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_profile_members_share_one_group() {
        let output = export(BridgeTarget::Isaac, &arm()).unwrap();
        assert_eq!(output.files[0].path, ACTUATORS_FILE);

        let groups = actuators(&output);
        assert_eq!(names(&groups["heavy"]), vec!["elbow", "shoulder"]);
        assert_eq!(groups["heavy"]["stiffness"].as_f64(), Some(100.0));
        assert_eq!(groups["heavy"]["effort_limit"].as_f64(), Some(80.0));
        assert_eq!(names(&groups["wrist"]), vec!["wrist"]);
        assert_eq!(groups["wrist"]["class_type"].as_str(), Some(ACTUATOR_CLASS));
    }

    #[test]
    fn test_divergent_member_is_split_out() {
        let d = doc(vec![
            (
                ACTUATION_DYNAMICS,
                json!({"actuators": {
                    "a": {"limits": {"max_torque_nm_float": 10}},
                    "b": {"limits": {"max_torque_nm_float": 10}},
                    "c": {"limits": {"max_torque_nm_float": 99}}
                }}),
            ),
            (
                ACTUATION_TOPOLOGY,
                json!({
                    "control_profiles_map": {"std": {"kp_position_float": 20}},
                    "joint_actuator_mapping_map": {
                        "a": {"use_profile_ref_str": "std"},
                        "b": {"use_profile_ref_str": "std"},
                        "c": {"use_profile_ref_str": "std"}
                    }
                }),
            ),
        ]);
        let groups = actuators(&export(BridgeTarget::Isaac, &d).unwrap());
        assert_eq!(names(&groups["std"]), vec!["a", "b"]);
        assert_eq!(names(&groups["std_2"]), vec!["c"]);
        assert_eq!(groups["std_2"]["effort_limit"].as_f64(), Some(99.0));
        assert_eq!(groups["std_2"]["stiffness"].as_f64(), Some(20.0));
    }
}
