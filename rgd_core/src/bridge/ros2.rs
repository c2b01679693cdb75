//! ROS 2 bridge
//!
//! Emits a `ros2_control` controller configuration, a xacro file of joint
//! limit properties and a xacro `<ros2_control>` hardware block.

use super::rules::{driver_plugin, format_float, Param};
use super::{xml_escape, BridgeInput};
use crate::error::RgdResult;
use crate::output::GeneratedFile;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const CONTROL_FILE: &str = "ros2_control.yaml";
pub const LIMITS_FILE: &str = "rgd_limits.xacro";
pub const HARDWARE_FILE: &str = "rgd_hardware.xacro";

const UPDATE_RATE_HZ: u32 = 100;
const BROADCASTER: &str = "joint_state_broadcaster/JointStateBroadcaster";
const POSITION_CONTROLLER: &str = "position_controllers/JointGroupPositionController";
const XACRO_NS: &str = "http://www.ros.org/wiki/xacro";

#[derive(Serialize)]
struct ControlFile {
    controller_manager: Node<ManagerParams>,
    forward_position_controller: Node<ForwardParams>,
}

#[derive(Serialize)]
struct Node<T> {
    #[serde(rename = "ros__parameters")]
    parameters: T,
}

#[derive(Serialize)]
struct ManagerParams {
    update_rate: u32,
    joint_state_broadcaster: ControllerType,
    forward_position_controller: ControllerType,
}

#[derive(Serialize)]
struct ControllerType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ForwardParams {
    joints: Vec<String>,
    gains: BTreeMap<String, Gains>,
}

#[derive(Serialize)]
struct Gains {
    p: f64,
    i: f64,
    d: f64,
}

pub fn generate(input: &BridgeInput, warnings: &mut Vec<String>) -> RgdResult<Vec<GeneratedFile>> {
    Ok(vec![
        GeneratedFile::new(CONTROL_FILE, control_yaml(input)?),
        GeneratedFile::new(LIMITS_FILE, limits_xacro(input)),
        GeneratedFile::new(HARDWARE_FILE, hardware_xacro(input, warnings)),
    ])
}

fn control_yaml(input: &BridgeInput) -> RgdResult<String> {
    let gains = input
        .joints
        .iter()
        .map(|j| {
            let g = Gains {
                p: j.number(Param::Kp),
                i: j.number(Param::Ki),
                d: j.number(Param::Kd),
            };
            (j.name.clone(), g)
        })
        .filter(|(_, g)| g.p != 0.0 || g.i != 0.0 || g.d != 0.0)
        .collect();

    let file = ControlFile {
        controller_manager: Node {
            parameters: ManagerParams {
                update_rate: UPDATE_RATE_HZ,
                joint_state_broadcaster: ControllerType { kind: BROADCASTER },
                forward_position_controller: ControllerType {
                    kind: POSITION_CONTROLLER,
                },
            },
        },
        forward_position_controller: Node {
            parameters: ForwardParams {
                joints: input.joints.iter().map(|j| j.name.clone()).collect(),
                gains,
            },
        },
    };

    Ok(format!(
        "# GENERATED BY RGD ROS2 BRIDGE: {}\n{}",
        input.model.identity(),
        serde_yaml::to_string(&file)?
    ))
}

fn limits_xacro(input: &BridgeInput) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<?xml version=\"1.0\"?>");
    let _ = writeln!(out, "<!-- GENERATED BY RGD ROS2 BRIDGE: {} -->", xml_escape(&input.model.identity()));
    let _ = writeln!(out, "<robot xmlns:xacro=\"{}\">", XACRO_NS);

    for joint in &input.joints {
        let name = xml_escape(&joint.name);
        for param in [
            Param::Effort,
            Param::Velocity,
            Param::Lower,
            Param::Upper,
            Param::Damping,
            Param::Friction,
        ] {
            let _ = writeln!(
                out,
                "  <xacro:property name=\"{}_{}\" value=\"{}\" />",
                name,
                param,
                format_float(joint.number(param))
            );
        }
        out.push('\n');
    }
    out.push_str("</robot>\n");
    out
}

fn hardware_xacro(input: &BridgeInput, warnings: &mut Vec<String>) -> String {
    let plugin = driver_plugin(&input.model, warnings);

    let mut out = String::new();
    let _ = writeln!(out, "<?xml version=\"1.0\"?>");
    let _ = writeln!(out, "<robot xmlns:xacro=\"{}\">", XACRO_NS);
    let _ = writeln!(
        out,
        "  <ros2_control name=\"{}\" type=\"system\">",
        xml_escape(&input.model.name)
    );
    let _ = writeln!(out, "    <hardware>");
    let _ = writeln!(out, "      <plugin>{}</plugin>", xml_escape(&plugin));
    let _ = writeln!(out, "    </hardware>");

    for joint in &input.joints {
        let _ = writeln!(out, "    <joint name=\"{}\">", xml_escape(&joint.name));
        let _ = writeln!(out, "      <param name=\"can_id\">{}</param>", xml_escape(&joint.text(Param::CanId)));
        let _ = writeln!(out, "      <param name=\"bus\">{}</param>", xml_escape(&joint.text(Param::Bus)));
        let _ = writeln!(out, "      <command_interface name=\"position\"/>");
        let _ = writeln!(out, "      <state_interface name=\"position\"/>");
        let _ = writeln!(out, "      <state_interface name=\"velocity\"/>");
        let _ = writeln!(out, "      <state_interface name=\"effort\"/>");
        let _ = writeln!(out, "    </joint>");
    }
    out.push_str("  </ros2_control>\n</robot>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::super::tests::arm;
    use super::super::{export, BridgeTarget};
    use super::*;

    fn file<'a>(files: &'a [GeneratedFile], name: &str) -> &'a str {
        &files.iter().find(|f| f.path == name).unwrap().contents
    }

    #[test]
    fn test_control_yaml_lists_joints_and_profile_gains() {
        let output = export(BridgeTarget::Ros2, &arm()).unwrap();
        let text = file(&output.files, CONTROL_FILE);
        assert!(text.starts_with("# GENERATED BY RGD ROS2 BRIDGE"));

        let yaml: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
        let forward = &yaml["forward_position_controller"]["ros__parameters"];
        let joints: Vec<&str> = forward["joints"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(joints, vec!["elbow", "shoulder", "wrist"]);

        assert_eq!(forward["gains"]["elbow"]["p"].as_f64(), Some(100.0));
        assert_eq!(forward["gains"]["shoulder"]["d"].as_f64(), Some(5.0));
        assert!(forward["gains"].get("wrist").is_none());
        assert_eq!(
            yaml["controller_manager"]["ros__parameters"]["update_rate"].as_u64(),
            Some(100)
        );
    }

    #[test]
    fn test_limits_use_range_and_defaults() {
        let output = export(BridgeTarget::Ros2, &arm()).unwrap();
        let text = file(&output.files, LIMITS_FILE);
        assert!(text.contains(r#"name="shoulder_effort" value="80.0""#));
        assert!(text.contains(r#"name="shoulder_lower" value="-1.5""#));
        assert!(text.contains(r#"name="wrist_upper" value="3.14""#));
        assert!(text.contains(r#"name="wrist_friction" value="0.0""#));
    }

    #[test]
    fn test_hardware_block_carries_plugin_and_bus() {
        let output = export(BridgeTarget::Ros2, &arm()).unwrap();
        let text = file(&output.files, HARDWARE_FILE);
        assert!(text.contains("<plugin>acme/ArmSystem</plugin>"));
        assert!(text.contains(r#"<ros2_control name="arm" type="system">"#));

        let shoulder = text.split("<joint name=\"shoulder\">").nth(1).unwrap();
        assert!(shoulder.contains("<param name=\"can_id\">1</param>"));
        assert!(shoulder.contains("<param name=\"bus\">can1</param>"));

        let elbow = text.split("<joint name=\"elbow\">").nth(1).unwrap();
        assert!(elbow.contains("<param name=\"bus\">can0</param>"));
        assert!(output.warnings.iter().any(|w| w.contains("elbow") && w.contains("bus")));
    }

    #[test]
    fn test_every_joint_exposes_position_velocity_and_effort_state() {
        let output = export(BridgeTarget::Ros2, &arm()).unwrap();
        let text = file(&output.files, HARDWARE_FILE);

        let joints = text.matches("<joint name=").count();
        assert_eq!(joints, 3);
        for interface in ["position", "velocity", "effort"] {
            let tag = format!("<state_interface name=\"{}\"/>", interface);
            assert_eq!(text.matches(&tag).count(), joints, "{}", interface);
        }
        assert_eq!(text.matches("<command_interface name=\"position\"/>").count(), joints);
    }
}
