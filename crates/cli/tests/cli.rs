use std::io::Write;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use tempfile::NamedTempFile;

fn workspace_file(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Run the binary with short timings so rehearsals finish in a few seconds
async fn walnut(args: &[&str]) -> Output {
    walnut_with(args, &[]).await
}

async fn walnut_with(args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut command = tokio::process::Command::new(env!("CARGO_BIN_EXE_walnut"));
    command
        .args(args)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .env("WALNUT_TIMING__POLL_INTERVAL_MS", "100")
        .env("WALNUT_TIMING__PRIMARY_POLL_INTERVAL_MS", "100")
        .env("WALNUT_TIMING__ACTION_DELAY_MS", "50")
        .env("WALNUT_TIMING__PRIMARY_TIMEOUT_MS", "3000")
        .env("WALNUT_TIMING__STAGE_TIMEOUT_MS", "3000")
        .env("WALNUT_TIMING__RETRY_DELAY_MS", "50")
        .env("WALNUT_ESCAPE__SETTLE_DELAY_MS", "50")
        .envs(envs.iter().copied())
        .kill_on_drop(true);

    tokio::time::timeout(Duration::from_secs(60), command.output())
        .await
        .expect("Command timed out")
        .expect("Failed to run walnut")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[tokio::test]
async fn test_check_example_config() {
    let config = workspace_file("config.example.toml");
    let output = walnut(&["check", "--config", config.to_str().unwrap()]).await;

    assert!(output.status.success());
    let summary = stdout_json(&output);
    assert_eq!(summary["task"], "walnut");
    assert_eq!(summary["alternative"], "lizbeth");
    assert_eq!(summary["branch_policy"], "continue");
    assert_eq!(summary["config_hash"].as_str().unwrap().len(), 16);
}

#[tokio::test]
async fn test_check_rejects_unmapped_alternative() {
    let example = std::fs::read_to_string(workspace_file("config.example.toml")).unwrap();
    let broken = example.replace("alternative = \"lizbeth\"", "alternative = \"nobody\"");
    let config = temp_file(&broken);

    let output = walnut(&["check", "--config", config.path().to_str().unwrap()]).await;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[tokio::test]
async fn test_check_missing_file() {
    let output = walnut(&["check", "--config", "/nonexistent/walnut.toml"]).await;
    assert_eq!(output.status.code(), Some(1));
}

#[tokio::test]
async fn test_run_rehearses_rounds() {
    let config = workspace_file("config.example.toml");
    let scene = workspace_file("scenes/walnut.toml");
    let metrics = NamedTempFile::new().unwrap();

    let output = walnut(&[
        "run",
        "--config",
        config.to_str().unwrap(),
        "--scene",
        scene.to_str().unwrap(),
        "--rounds",
        "1",
        "--metrics-out",
        metrics.path().to_str().unwrap(),
    ])
    .await;

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["rounds_completed"], 1);
    assert_eq!(report["terminal"]["terminal"], "exhausted_limit");

    let text = std::fs::read_to_string(metrics.path()).unwrap();
    assert!(text.contains("walnut_rounds_completed_total 1"));
}

#[tokio::test]
async fn test_run_rehearses_dispel_rounds() {
    let config = workspace_file("config.example.toml");
    let scene = workspace_file("scenes/dispel.toml");

    let output = walnut_with(
        &[
            "run",
            "--config",
            config.to_str().unwrap(),
            "--scene",
            scene.to_str().unwrap(),
            "--rounds",
            "2",
        ],
        &[
            ("WALNUT_SESSION__TASK", "dispel"),
            ("WALNUT_DISPEL__PREPARE_MS", "100"),
            ("WALNUT_DISPEL__MAP_SETTLE_MS", "100"),
            ("WALNUT_DISPEL__SKILL_INTERVAL_MS", "50"),
            ("WALNUT_DISPEL__REPLAY_POLL_INTERVAL_MS", "100"),
        ],
    )
    .await;

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["rounds_completed"], 2);
    assert_eq!(report["terminal"]["terminal"], "exhausted_limit");
}

#[tokio::test]
async fn test_run_empty_scene_aborts() {
    let config = workspace_file("config.example.toml");
    let scene = temp_file("");

    let output = walnut(&[
        "--json",
        "run",
        "--config",
        config.to_str().unwrap(),
        "--scene",
        scene.path().to_str().unwrap(),
    ])
    .await;

    assert_eq!(output.status.code(), Some(2));
    let report = stdout_json(&output);
    assert_eq!(report["rounds_completed"], 0);
    assert_eq!(report["terminal"]["terminal"], "aborted");
    assert_eq!(report["terminal"]["stage"], "round-start");
    assert_eq!(report["terminal"]["detail"], "primary signal timeout");
}
