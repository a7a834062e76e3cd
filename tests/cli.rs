use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn site_command() -> Command {
    let mut cmd = Command::cargo_bin("vatra-site").expect("binary exists");
    cmd.env_remove("VATRA_MAP_URL").env_remove("PL3XMAP_URL");
    cmd
}

#[test]
fn summary_uses_the_shipped_scene() {
    let assets = TempDir::new().expect("temp dir");
    let mut cmd = site_command();
    cmd.arg("--assets").arg(assets.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 6 objects (2 lights)"))
        .stdout(contains(" - chunk (model)"))
        .stdout(contains(" - fireplace (sprite)"))
        .stdout(contains(
            "Map URL: /pl3xmap/?world=world&renderer=vintage_story&zoom=1&x=-66&z=-171",
        ))
        .stdout(contains(
            " - /pl3xmap -> http://134.249.64.192:8123 (strip prefix)",
        ))
        .stdout(contains(" - /tiles -> http://134.249.64.192:8123 (keep prefix)"));
}

#[test]
fn scene_override_is_read_from_the_asset_directory() {
    let assets = TempDir::new().expect("temp dir");
    let scene = r#"<scene>
  <object>
    <name>Camera</name>
    <type>camera</type>
  </object>
  <object>
    <name>Sun</name>
    <type>sun</type>
  </object>
  <object>
    <name>chunk</name>
    <type>model</type>
  </object>
</scene>
"#;
    fs::write(assets.path().join("scene.xml"), scene).expect("write scene");

    let mut cmd = site_command();
    cmd.arg("--assets").arg(assets.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 3 objects (1 lights)"))
        .stdout(contains(" - Camera (camera)"));
}

#[test]
fn insecure_map_url_is_proxied_on_secure_pages() {
    let mut cmd = site_command();
    cmd.args([
        "--summary-only",
        "--secure",
        "--map-url",
        "http://203.0.113.7:8123/?world=world",
    ]);
    // An explicit URL always wins, even over the mixed-content rewrite.
    cmd.assert()
        .success()
        .stdout(contains("Assets: memory (0 files)"))
        .stdout(contains("Map URL: http://203.0.113.7:8123/?world=world"));

    let mut cmd = site_command();
    cmd.env("VATRA_MAP_URL", "http://203.0.113.7:8123/?world=world")
        .args(["--summary-only", "--secure"]);
    cmd.assert()
        .success()
        .stdout(contains("Map URL: /pl3xmap/?world=world"));
}

#[test]
fn print_config_emits_json() {
    let mut cmd = site_command();
    let output = cmd.arg("--print-config").output().expect("run binary");
    assert!(output.status.success());
    let config: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("config is JSON");
    assert_eq!(config["server"]["port"], 25565);
    assert_eq!(config["status"]["poll_interval_secs"], 60);
    assert_eq!(config["status"]["offline_policy"], "retain_counts");
    assert_eq!(config["nav"]["container_selector"], ".app");
}

#[test]
fn unknown_arguments_fail() {
    let mut cmd = site_command();
    cmd.arg("--bogus");
    cmd.assert().failure().stderr(contains("Unknown argument: --bogus"));
}
