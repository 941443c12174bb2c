use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

#[cfg(unix)]
use mbuild::test_utils::ProjectFixture;

fn mbuild() -> Command {
    let mut cmd = Command::cargo_bin("mbuild").unwrap();
    cmd.env_remove("MBUILD_CONFIG").env_remove("MBUILD_ROBOT");
    cmd
}

#[test]
fn test_cli_help() {
    mbuild()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("train"));
}

#[test]
fn test_cli_version() {
    mbuild()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_latest_without_artifacts_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("mbuild.toml");
    std::fs::write(&config, "").unwrap();

    mbuild()
        .current_dir(dir.path())
        .args(["--config-file"])
        .arg(&config)
        .args(["latest", "models"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no artifacts"));
}

#[test]
fn test_robot_error_is_json() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("mbuild.toml");
    std::fs::write(&config, "").unwrap();

    let output = mbuild()
        .current_dir(dir.path())
        .args(["-q", "--robot", "--config-file"])
        .arg(&config)
        .args(["inspect", "missing.zip"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"]["error"]["code"], "not_found");
}

#[test]
fn test_missing_explicit_config_is_error() {
    let dir = tempdir().unwrap();
    mbuild()
        .current_dir(dir.path())
        .args(["--config-file", "nope.toml", "latest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

/// Project config with shell trainers that copy their data into the output.
#[cfg(unix)]
fn write_shell_config(fixture: &ProjectFixture) -> std::path::PathBuf {
    fixture.write(
        "mbuild.toml",
        r#"
[trainer]
core_command = ["sh", "-c", "cp -R \"$0\" \"$1/stories\"", "{stories}", "{out}"]
nlu_command = ["sh", "-c", "cp -R \"$0\" \"$1/nlu\"", "{nlu}", "{out}"]
"#,
    )
}

#[cfg(unix)]
#[test]
fn test_train_then_reuse_then_partial() {
    let fixture = ProjectFixture::new();
    let config = write_shell_config(&fixture);

    let run = |extra: &[&str]| -> Value {
        let output = mbuild()
            .current_dir(fixture.root())
            .args(["-q", "--robot", "--config-file"])
            .arg(&config)
            .arg("train")
            .args(extra)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "train failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    };

    let first = run(&[]);
    assert_eq!(first["data"]["changed"], Value::Bool(true));
    assert_eq!(first["data"]["trained"], serde_json::json!(["core", "nlu"]));

    let second = run(&[]);
    assert_eq!(second["data"]["changed"], Value::Bool(false));
    assert_eq!(second["data"]["path"], first["data"]["path"]);

    fixture.write("data/nlu.md", "## intent:greet\n- good morning\n");
    let third = run(&[]);
    assert_eq!(third["data"]["trained"], serde_json::json!(["nlu"]));
    assert_eq!(third["data"]["reused"], serde_json::json!(["core"]));

    mbuild()
        .current_dir(fixture.root())
        .args(["--config-file"])
        .arg(&config)
        .arg("latest")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            third["data"]["path"].as_str().unwrap(),
        ));
}

#[cfg(unix)]
#[test]
fn test_train_with_explicit_paths() {
    let fixture = ProjectFixture::new();
    let config = write_shell_config(&fixture);
    fixture.write("bot/domain.yml", mbuild::test_utils::fixtures::DOMAIN_YML);
    fixture.write("bot/config.yml", mbuild::test_utils::fixtures::CONFIG_YML);
    fixture.write("bot/stories.md", mbuild::test_utils::fixtures::STORIES_MD);
    fixture.write("bot/nlu.md", mbuild::test_utils::fixtures::NLU_MD);

    let train = || {
        mbuild()
            .current_dir(fixture.root())
            .args(["-q", "--robot", "--config-file"])
            .arg(&config)
            .args([
                "train",
                "--domain",
                "bot/domain.yml",
                "--config",
                "bot/config.yml",
                "--data",
                "bot/stories.md",
                "bot/nlu.md",
                "--out",
                "out",
            ])
            .output()
            .unwrap()
    };

    let output = train();
    assert!(
        output.status.success(),
        "train failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let first: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(first["data"]["trained"], serde_json::json!(["core", "nlu"]));
    let path = first["data"]["path"].as_str().unwrap();
    assert!(std::path::Path::new(path).starts_with(fixture.path("out")));
    assert!(fixture.artifacts().is_empty());

    let second: Value = serde_json::from_slice(&train().stdout).unwrap();
    assert_eq!(second["data"]["changed"], Value::Bool(false));

    // Without --config-file the project mbuild.toml is picked up.
    mbuild()
        .current_dir(fixture.root())
        .args(["-q", "train", "--config", "bot/config.yml", "--out", "out"])
        .assert()
        .success();
}

#[cfg(unix)]
#[test]
fn test_failing_trainer_exits_nonzero() {
    let fixture = ProjectFixture::new();
    let config = fixture.write(
        "mbuild.toml",
        "[trainer]\ncore_command = [\"false\"]\nnlu_command = [\"true\"]\n",
    );

    mbuild()
        .current_dir(fixture.root())
        .args(["-q", "--config-file"])
        .arg(&config)
        .arg("train")
        .assert()
        .failure()
        .stderr(predicate::str::contains("core"));
    assert!(fixture.artifacts().is_empty());
}

#[cfg(unix)]
#[test]
fn test_inspect_lists_every_artifact() {
    let fixture = ProjectFixture::new();
    let config = write_shell_config(&fixture);

    mbuild()
        .current_dir(fixture.root())
        .args(["-q", "--config-file"])
        .arg(&config)
        .args(["train", "--only", "nlu"])
        .assert()
        .success();

    let output = mbuild()
        .current_dir(fixture.root())
        .args(["-q", "--robot", "--config-file"])
        .arg(&config)
        .arg("inspect")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = json["data"].as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["sub_models"], serde_json::json!(["nlu"]));
    assert!(reports[0]["fingerprint"]["nlu_data_hash"].is_string());
}
