use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to get the CLI command
fn rgd_cmd() -> Command {
    Command::cargo_bin("rgd").unwrap()
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A small valid project: kernel, description, dynamics and topology.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "spec/00_core/kernel.jsonc",
        r#"{
  // identity
  "meta_group": { "id": "did:rgd:cli_bot" },
  "module_loading_order_list": [
    "01_foundation/description.jsonc",
    "01_foundation/actuation_dynamics.jsonc",
    "01_foundation/actuation_topology.jsonc"
  ]
}"#,
    );
    write(
        root,
        "spec/01_foundation/description.jsonc",
        r#"{ "hardware_id": "cli_bot" }"#,
    );
    write(
        root,
        "spec/01_foundation/actuation_dynamics.jsonc",
        r#"{
  "actuators": {
    "elbow": { "type": "revolute", "limits": { "max_torque_nm_float": 80 } }
  }
}"#,
    );
    write(
        root,
        "spec/01_foundation/actuation_topology.jsonc",
        r#"{
  "control_profiles_map": { "soft": { "kp_position_float": 12 } },
  "joint_actuator_mapping_map": {
    "elbow": { "use_profile_ref_str": "soft", "torque_limit_peak_nm_float": 50 }
  }
}"#,
    );
    dir
}

// ============================================================================
// Help and formats
// ============================================================================

#[test]
fn test_help_shows_subcommands() {
    rgd_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("integrity"));
}

#[test]
fn test_formats_lists_importers_and_bridges() {
    rgd_cmd()
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("urdf"))
        .stdout(predicate::str::contains("usdz"))
        .stdout(predicate::str::contains("ros2_control.yaml"))
        .stdout(predicate::str::contains("isaac_actuators.yaml"));
}

// ============================================================================
// check
// ============================================================================

#[test]
fn test_check_valid_project() {
    let dir = project();
    rgd_cmd()
        .arg("check")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("01_foundation"))
        .stdout(predicate::str::contains("4 module(s) valid"));
}

#[test]
fn test_check_names_configured_project() {
    let dir = project();
    write(dir.path(), "rgd.yaml", "name: cli_bot_project\n");
    rgd_cmd()
        .arg("check")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("cli_bot_project"));
}

#[test]
fn test_check_reports_profile_cycle() {
    let dir = project();
    write(
        dir.path(),
        "spec/01_foundation/actuation_topology.jsonc",
        r#"{
  "control_profiles_map": {
    "soft": { "extends_profile_ref_str": "firm" },
    "firm": { "extends_profile_ref_str": "soft" }
  },
  "joint_actuator_mapping_map": { "elbow": { "use_profile_ref_str": "soft" } }
}"#,
    );
    rgd_cmd()
        .arg("check")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("profile inheritance loops"));
}

#[test]
fn test_check_reports_every_dangling_reference() {
    let dir = project();
    write(
        dir.path(),
        "spec/01_foundation/sensors.jsonc",
        r#"{ "mount_ref_str": "nowhere", "frame_ref_str": "also_missing" }"#,
    );
    rgd_cmd()
        .arg("check")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"))
        .stderr(predicate::str::contains("also_missing"))
        .stderr(predicate::str::contains("validation failed"));
}

#[test]
fn test_check_missing_root_fails() {
    rgd_cmd()
        .args(["check", "/definitely/not/here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// ============================================================================
// compile / integrity
// ============================================================================

#[test]
fn test_compile_writes_equivalent_twins() {
    let dir = project();
    rgd_cmd().arg("compile").arg(dir.path()).assert().success();

    let spec = dir.path().join("spec");
    let human = fs::read_to_string(spec.join("openrgd_unified_spec.jsonc")).unwrap();
    let machine = fs::read_to_string(spec.join("openrgd_unified_spec.json")).unwrap();

    assert!(human.contains("// identity"));
    let doc: Value = serde_json::from_str(&machine).unwrap();
    assert_eq!(doc["meta"]["module_count"], 4);
    assert_eq!(doc["files"][0]["id"], "kernel");
}

#[test]
fn test_compile_domain_bundle_and_mirror() {
    let dir = project();
    rgd_cmd()
        .arg("compile")
        .arg(dir.path())
        .args(["--domain", "foundation", "--mirror"])
        .assert()
        .success();

    assert!(dir.path().join("spec/01_spec.jsonc").exists());
    assert!(dir.path().join("spec/01_spec.json").exists());
    assert!(dir
        .path()
        .join("standard/01_foundation/description.json")
        .exists());
}

#[test]
fn test_compile_under_custom_name_keeps_project_loadable() {
    let dir = project();
    rgd_cmd()
        .arg("compile")
        .arg(dir.path())
        .args(["--name", "robot_twins"])
        .assert()
        .success();
    assert!(dir.path().join("spec/robot_twins.json").exists());

    rgd_cmd()
        .arg("check")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("4 module(s) valid"));
}

#[test]
fn test_integrity_passes_after_compile_and_fails_after_edit() {
    let dir = project();
    rgd_cmd()
        .arg("integrity")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));

    rgd_cmd().arg("compile").arg(dir.path()).assert().success();
    rgd_cmd()
        .arg("integrity")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    write(
        dir.path(),
        "spec/01_foundation/description.jsonc",
        r#"{ "hardware_id": "renamed" }"#,
    );
    rgd_cmd()
        .arg("integrity")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of date"));
}

// ============================================================================
// export
// ============================================================================

#[test]
fn test_export_ros2_applies_hierarchy_of_truth() {
    let dir = project();
    let out = dir.path().join("out");
    rgd_cmd()
        .args(["export", "ros2"])
        .arg(dir.path())
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let limits = fs::read_to_string(out.join("rgd_limits.xacro")).unwrap();
    assert!(limits.contains(r#"name="elbow_effort" value="50.0""#));
    assert!(out.join("ros2_control.yaml").exists());
    assert!(out.join("rgd_hardware.xacro").exists());
}

#[test]
fn test_export_isaac_defaults_to_export_dir() {
    let dir = project();
    rgd_cmd()
        .args(["export", "isaac"])
        .arg(dir.path())
        .assert()
        .success();
    let yaml = fs::read_to_string(dir.path().join("export/isaac_actuators.yaml")).unwrap();
    assert!(yaml.contains("soft"));
}

#[test]
fn test_export_without_dynamics_is_missing_prerequisite() {
    let dir = project();
    fs::remove_file(dir.path().join("spec/01_foundation/actuation_dynamics.jsonc")).unwrap();
    rgd_cmd()
        .args(["-q", "export", "ros2"])
        .arg(dir.path())
        .env("RGD_KERNEL_SEVERITY", "warning")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing prerequisite"));
}

#[test]
fn test_export_unknown_target() {
    let dir = project();
    rgd_cmd()
        .args(["export", "gazebo"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("gazebo"));
}

// ============================================================================
// import
// ============================================================================

#[test]
fn test_import_urdf_then_check() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "arm.urdf",
        r#"<robot name="arm">
  <link name="base"/><link name="tip"/>
  <joint name="j1" type="revolute"><limit effort="10" velocity="2" lower="-1" upper="1"/></joint>
</robot>"#,
    );
    let out = dir.path().join("RGD-arm");
    rgd_cmd()
        .arg("import")
        .arg(dir.path().join("arm.urdf"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 joint(s)"));

    assert!(out.join("spec/00_core/kernel.jsonc").exists());
    rgd_cmd().arg("check").arg(&out).assert().success();
}

#[test]
fn test_import_binary_usd_is_refused() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("scene.usd"), b"PXR-USDC\x00\x01binary").unwrap();
    rgd_cmd()
        .arg("import")
        .arg(dir.path().join("scene.usd"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("usdcat"));
}

#[test]
fn test_import_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("model.stl"), b"solid").unwrap();
    rgd_cmd()
        .arg("import")
        .arg(dir.path().join("model.stl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("stl"));
}
