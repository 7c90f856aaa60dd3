use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "holdout-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_holdout-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("smoke"));
    assert!(content.contains("hard-difficulty"));
}

#[test]
fn cli_runs_smoke_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_holdout-tester");
    let output_path = temp_path("run");
    let status = Command::new(exe)
        .args([
            "--report",
            "json",
            "--scenarios",
            "smoke,idle-player",
            "--iterations",
            "2",
            "--seeds",
            "1,0x2A",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let rows = report.as_array().expect("array");
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| row["passed"] == serde_json::json!(true)));
}

#[test]
fn cli_rejects_missing_config_file() {
    let exe = env!("CARGO_BIN_EXE_holdout-tester");
    let output = Command::new(exe)
        .args(["--iterations", "1", "--config"])
        .arg(temp_path("missing-config"))
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read"));
}

#[test]
fn cli_accepts_a_config_file() {
    let exe = env!("CARGO_BIN_EXE_holdout-tester");
    let config_path = temp_path("config");
    std::fs::write(
        &config_path,
        r#"{ "session": { "duration_seconds": 20.0 } }"#,
    )
    .expect("write config");
    let output_path = temp_path("config-report");
    let status = Command::new(exe)
        .args([
            "--report",
            "markdown",
            "--scenarios",
            "short-session",
            "--iterations",
            "1",
            "--config",
        ])
        .arg(&config_path)
        .arg("--output")
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Short Session"));
}
