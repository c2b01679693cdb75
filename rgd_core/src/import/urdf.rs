//! URDF importer
//!
//! Reads `<link>` and `<joint>` elements under `<robot>`. Fixed joints are
//! skipped; every other joint becomes an entity whose `<limit>` attributes
//! land in the physical layer as `torque_nm`, `velocity_rads` and
//! `range_rad`.

use super::{normalise_name, Imported};
use crate::error::{RgdError, RgdResult};
use crate::model::{Entity, JointKind, ModelSource, RobotModel, DEFAULT_RANGE_RAD};
use crate::profile::Params;
use serde_json::json;
use std::collections::HashSet;

const DEFAULT_EFFORT: f64 = 0.0;
const DEFAULT_VELOCITY: f64 = 0.0;
const DEFAULT_LOWER: f64 = DEFAULT_RANGE_RAD.0;
const DEFAULT_UPPER: f64 = DEFAULT_RANGE_RAD.1;

const KNOWN_KINDS: &[&str] = &["revolute", "continuous", "prismatic", "fixed"];

pub fn import(source_name: &str, bytes: &[u8]) -> RgdResult<Imported> {
    let text = std::str::from_utf8(bytes).map_err(|e| RgdError::StructuralParse {
        source_name: source_name.to_string(),
        line: None,
        column: None,
        message: format!("not valid UTF-8: {}", e),
    })?;
    parse_string(source_name, text)
}

/// Parse URDF text.
pub fn parse_string(source_name: &str, xml: &str) -> RgdResult<Imported> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| {
        let pos = e.pos();
        RgdError::StructuralParse {
            source_name: source_name.to_string(),
            line: Some(pos.row as usize),
            column: Some(pos.col as usize),
            message: e.to_string(),
        }
    })?;

    let root = doc.root_element();
    if !root.has_tag_name("robot") {
        return Err(RgdError::StructuralParse {
            source_name: source_name.to_string(),
            line: Some(doc.text_pos_at(root.range().start).row as usize),
            column: None,
            message: format!(
                "root element must be <robot>, found <{}>",
                root.tag_name().name()
            ),
        });
    }

    let name = root
        .attribute("name")
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| normalise_name(source_name));

    let mut imported = Imported::new(RobotModel::new(name, ModelSource::Urdf));
    let mut seen: HashSet<String> = HashSet::new();
    let mut fixed = 0usize;

    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "link" => {
                if let Some(link) = child.attribute("name") {
                    imported.model.links.push(link.to_string());
                }
            }
            "joint" => {
                let Some(joint) = child.attribute("name") else {
                    imported.warn(format!(
                        "{}: joint without a name attribute skipped",
                        source_name
                    ));
                    continue;
                };
                if !seen.insert(joint.to_string()) {
                    return Err(RgdError::reference(
                        source_name,
                        "joint",
                        joint,
                        "duplicate joint name",
                    ));
                }

                let raw_kind = child.attribute("type").unwrap_or("fixed");
                if !KNOWN_KINDS.contains(&raw_kind.to_ascii_lowercase().as_str()) {
                    imported.warn(format!(
                        "joint '{}' has unsupported type '{}', treated as fixed",
                        joint, raw_kind
                    ));
                }
                let kind = JointKind::from_name(raw_kind);
                if !kind.is_actuated() {
                    fixed += 1;
                    continue;
                }

                let limit = child
                    .children()
                    .find(|n| n.is_element() && n.has_tag_name("limit"));
                let mut read = |attr: &str, default: f64| -> f64 {
                    let Some(raw) = limit.and_then(|l| l.attribute(attr)) else {
                        return default;
                    };
                    match raw.trim().parse::<f64>() {
                        Ok(v) => v,
                        Err(_) => {
                            imported.warn(format!(
                                "joint '{}': limit {}='{}' is not a number, using {}",
                                joint, attr, raw, default
                            ));
                            default
                        }
                    }
                };
                let effort = read("effort", DEFAULT_EFFORT);
                let velocity = read("velocity", DEFAULT_VELOCITY);
                let lower = read("lower", DEFAULT_LOWER);
                let upper = read("upper", DEFAULT_UPPER);

                let physical = physical_limits(effort, velocity, lower, upper);
                imported
                    .model
                    .insert(source_name, Entity::new(joint, kind).with_physical(physical))?;
            }
            other => log::debug!("ignoring URDF element <{}>", other),
        }
    }

    if imported.model.entities.is_empty() {
        imported.warn(format!(
            "no joints found in {} ({} fixed joint(s) skipped); actuation set is empty",
            source_name, fixed
        ));
    }

    log::info!(
        "URDF '{}': {} link(s), {} actuated joint(s), {} fixed",
        imported.model.name,
        imported.model.links.len(),
        imported.model.entities.len(),
        fixed
    );
    Ok(imported)
}

fn physical_limits(effort: f64, velocity: f64, lower: f64, upper: f64) -> Params {
    let value = json!({
        "limits": {
            "torque_nm": effort,
            "velocity_rads": velocity,
            "range_rad": [lower, upper],
        }
    });
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TWO_REVOLUTE: &str = r#"<?xml version="1.0"?>
<robot name="two_dof">
  <link name="base"/>
  <link name="upper"/>
  <link name="lower"/>
  <joint name="shoulder" type="revolute">
    <parent link="base"/><child link="upper"/>
    <limit effort="10" velocity="2" lower="-1" upper="1"/>
  </joint>
  <joint name="elbow" type="revolute">
    <parent link="upper"/><child link="lower"/>
    <limit effort="10" velocity="2" lower="-1" upper="1"/>
  </joint>
</robot>"#;

    #[test]
    fn test_two_revolute_joints() {
        let imported = parse_string("two_dof.urdf", TWO_REVOLUTE).unwrap();
        let model = &imported.model;

        assert_eq!(model.name, "two_dof");
        assert_eq!(model.links, vec!["base", "upper", "lower"]);
        assert_eq!(model.entities.len(), 2);
        assert!(imported.warnings.is_empty());

        for id in ["shoulder", "elbow"] {
            let e = model.entity(id).unwrap();
            assert_eq!(e.kind, JointKind::Revolute);
            let limits = &e.physical["limits"];
            assert_eq!(limits["torque_nm"], json!(10.0));
            assert_eq!(limits["velocity_rads"], json!(2.0));
            assert_eq!(limits["range_rad"], json!([-1.0, 1.0]));
        }
    }

    #[test]
    fn test_fixed_only_yields_empty_set_with_warning() {
        let xml = r#"<robot name="statue">
  <link name="a"/><link name="b"/>
  <joint name="weld" type="fixed"><parent link="a"/><child link="b"/></joint>
</robot>"#;
        let imported = parse_string("statue.urdf", xml).unwrap();
        assert!(imported.model.entities.is_empty());
        assert_eq!(imported.warnings.len(), 1);
        assert!(imported.warnings[0].contains("no joints found"));
    }

    #[test]
    fn test_unknown_kind_passes_through_as_fixed() {
        let xml = r#"<robot name="r"><joint name="free" type="floating"/></robot>"#;
        let imported = parse_string("r.urdf", xml).unwrap();
        assert!(imported.model.entities.is_empty());
        assert!(imported.warnings.iter().any(|w| w.contains("floating")));
    }

    #[test]
    fn test_missing_and_bad_limits_use_defaults() {
        let xml = r#"<robot name="r">
  <joint name="wheel" type="continuous"><limit effort="abc" velocity="4"/></joint>
</robot>"#;
        let imported = parse_string("r.urdf", xml).unwrap();
        let limits = &imported.model.entity("wheel").unwrap().physical["limits"];
        assert_eq!(limits["torque_nm"], json!(0.0));
        assert_eq!(limits["velocity_rads"], json!(4.0));
        assert_eq!(limits["range_rad"], json!([-3.14, 3.14]));
        assert_eq!(imported.warnings.len(), 1);
    }

    #[test]
    fn test_duplicate_joint_name_is_reference_error() {
        let xml = r#"<robot name="r">
  <joint name="j" type="revolute"/>
  <joint name="j" type="prismatic"/>
</robot>"#;
        match parse_string("r.urdf", xml) {
            Err(RgdError::Reference { target, .. }) => assert_eq!(target, "j"),
            other => panic!("expected reference error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_xml_reports_position() {
        let xml = "<robot name=\"r\">\n  <joint name=\"j\">\n</robot>";
        match parse_string("r.urdf", xml) {
            Err(RgdError::StructuralParse { line, .. }) => assert!(line.is_some()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_name_falls_back_to_file_stem() {
        let xml = r#"<robot><joint name="j" type="prismatic"/></robot>"#;
        let imported = parse_string("Big Arm.urdf", xml).unwrap();
        assert_eq!(imported.model.name, "big_arm");
    }

    #[test]
    fn test_wrong_root_element() {
        assert!(matches!(
            parse_string("x.xml", "<scene/>"),
            Err(RgdError::StructuralParse { .. })
        ));
    }
}
