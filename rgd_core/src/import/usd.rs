//! USD importer
//!
//! Only the text encoding (`.usda`) is understood. Binary crate files are
//! refused up front, before any text parsing. Archives (`.usdz` zip, or a
//! gzip'd tar) must hold exactly one `.usda`/`.usd` entry, which is then
//! treated like a plain file.
//!
//! Parsing is pattern extraction, not a scene graph: the default prim names
//! the robot, each `def PhysicsRevoluteJoint`/`def PhysicsPrismaticJoint`
//! block becomes an entity, and the drive attributes inside the block map
//! onto the physical layer.

use super::{normalise_name, Imported};
use crate::error::{RgdError, RgdResult};
use crate::model::{Entity, JointKind, ModelSource, RobotModel, DEFAULT_RANGE_RAD};
use crate::profile::Params;
use flate2::read::GzDecoder;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::{Cursor, Read};

/// Magic header of binary crate files.
pub const USDC_MAGIC: &[u8] = b"PXR-USDC";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

const DEFAULT_LOWER: f64 = DEFAULT_RANGE_RAD.0;
const DEFAULT_UPPER: f64 = DEFAULT_RANGE_RAD.1;

const NUMBER: &str = r"([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)";

/// Whether `bytes` is a binary USD payload.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.starts_with(USDC_MAGIC)
}

pub fn import(source_name: &str, bytes: &[u8]) -> RgdResult<Imported> {
    let (payload_name, payload) = extract_payload(source_name, bytes)?;

    if is_binary(&payload) {
        return Err(binary_error(&payload_name));
    }
    let text = String::from_utf8(payload).map_err(|_| RgdError::UnsupportedFormat {
        format: "non-UTF-8 USD".to_string(),
        guidance: format!(
            "'{}' is not text; export it as .usda (usdcat {} -o model.usda)",
            payload_name, payload_name
        ),
    })?;

    parse_text(source_name, &text)
}

fn binary_error(name: &str) -> RgdError {
    RgdError::UnsupportedFormat {
        format: "USDC (binary USD)".to_string(),
        guidance: format!("convert to text first: usdcat {} -o model.usda", name),
    }
}

/// Unwrap archives; plain files pass through unchanged.
fn extract_payload(source_name: &str, bytes: &[u8]) -> RgdResult<(String, Vec<u8>)> {
    let mut candidates = if bytes.starts_with(ZIP_MAGIC) {
        zip_candidates(source_name, bytes)?
    } else if bytes.starts_with(GZIP_MAGIC) {
        tar_candidates(source_name, bytes)?
    } else {
        return Ok((source_name.to_string(), bytes.to_vec()));
    };

    if candidates.len() != 1 {
        return Err(RgdError::ArchiveResolution {
            archive: source_name.to_string(),
            candidates: candidates.into_iter().map(|(name, _)| name).collect(),
        });
    }
    let (name, data) = candidates.remove(0);
    log::debug!("extracted '{}' from archive {}", name, source_name);
    Ok((name, data))
}

fn is_candidate(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let file = lower.rsplit('/').next().unwrap_or(&lower);
    !file.starts_with('.') && (file.ends_with(".usda") || file.ends_with(".usd"))
}

fn archive_error(source_name: &str, err: impl std::fmt::Display) -> RgdError {
    RgdError::StructuralParse {
        source_name: source_name.to_string(),
        line: None,
        column: None,
        message: format!("unreadable archive: {}", err),
    }
}

fn zip_candidates(source_name: &str, bytes: &[u8]) -> RgdResult<Vec<(String, Vec<u8>)>> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| archive_error(source_name, e))?;
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| archive_error(source_name, e))?;
        if entry.is_dir() || !is_candidate(entry.name()) {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        out.push((name, data));
    }
    Ok(out)
}

fn tar_candidates(source_name: &str, bytes: &[u8]) -> RgdResult<Vec<(String, Vec<u8>)>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut out = Vec::new();
    let entries = archive
        .entries()
        .map_err(|e| archive_error(source_name, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(source_name, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map_err(|e| archive_error(source_name, e))?
            .to_string_lossy()
            .into_owned();
        if !is_candidate(&name) {
            continue;
        }
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| archive_error(source_name, e))?;
        out.push((name, data));
    }
    Ok(out)
}

fn pattern(re: &str) -> RgdResult<Regex> {
    Regex::new(re).map_err(|e| RgdError::invalid_input(format!("bad pattern {}: {}", re, e)))
}

/// Attribute patterns, compiled once per import
struct Patterns {
    default_prim: Regex,
    joint: Regex,
    lower: Regex,
    upper: Regex,
    stiffness: Regex,
    damping: Regex,
    max_force: Regex,
}

impl Patterns {
    fn new() -> RgdResult<Self> {
        let drive = |attr: &str| pattern(&format!(r"drive:(?:angular|linear):physics:{}\s*=\s*{}", attr, NUMBER));
        Ok(Self {
            default_prim: pattern(r#"defaultPrim\s*=\s*"([^"]+)""#)?,
            joint: pattern(r#"def\s+Physics(Revolute|Prismatic)Joint\s+"([^"]+)""#)?,
            lower: pattern(&format!(r"physics:lowerLimit\s*=\s*{}", NUMBER))?,
            upper: pattern(&format!(r"physics:upperLimit\s*=\s*{}", NUMBER))?,
            stiffness: drive("stiffness")?,
            damping: drive("damping")?,
            max_force: drive("maxForce")?,
        })
    }
}

fn capture_f64(re: &Regex, block: &str) -> Option<f64> {
    re.captures(block)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse USDA text.
pub fn parse_text(source_name: &str, text: &str) -> RgdResult<Imported> {
    let patterns = Patterns::new()?;

    let name = patterns
        .default_prim
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| normalise_name(source_name));

    let mut imported = Imported::new(RobotModel::new(name, ModelSource::Usd));
    let mut seen: HashSet<String> = HashSet::new();

    for caps in patterns.joint.captures_iter(text) {
        let (Some(whole), Some(kind), Some(joint)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let joint = joint.as_str();
        if !seen.insert(joint.to_string()) {
            return Err(RgdError::reference(
                source_name,
                "joint",
                joint,
                "duplicate joint name",
            ));
        }

        let start = whole.end();
        let end = text[start..]
            .find("def ")
            .map(|offset| start + offset)
            .unwrap_or(text.len());
        let block = &text[start..end];

        let lower = capture_f64(&patterns.lower, block).unwrap_or(DEFAULT_LOWER);
        let upper = capture_f64(&patterns.upper, block).unwrap_or(DEFAULT_UPPER);

        let mut limits = json!({ "range_rad": [lower, upper] });
        match capture_f64(&patterns.max_force, block) {
            Some(force) => limits["torque_nm"] = json!(force),
            None => imported.warn(format!(
                "joint '{}' has no drive maxForce; torque left to the bridge default",
                joint
            )),
        }

        let mut physical = Params::new();
        physical.insert("limits".to_string(), limits);

        let mut impedance = Params::new();
        if let Some(stiffness) = capture_f64(&patterns.stiffness, block) {
            impedance.insert("stiffness_nm_rad_float".to_string(), json!(stiffness));
        }
        if let Some(damping) = capture_f64(&patterns.damping, block) {
            impedance.insert("damping_nms_rad_float".to_string(), json!(damping));
        }
        if !impedance.is_empty() {
            physical.insert("advanced_impedance_model".to_string(), Value::Object(impedance));
        }

        let kind = JointKind::from_name(kind.as_str());
        imported
            .model
            .insert(source_name, Entity::new(joint, kind).with_physical(physical))?;
    }

    if imported.model.entities.is_empty() {
        imported.warn(format!(
            "no physics joints found in {}; actuation set is empty",
            source_name
        ));
    }

    log::info!(
        "USD '{}': {} physics joint(s)",
        imported.model.name,
        imported.model.entities.len()
    );
    Ok(imported)
}
