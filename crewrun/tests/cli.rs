//! CLI tests for the `crewrun` binary.
//!
//! Spawns the binary and verifies exit codes and printed routing tables.

use std::process::Command;

use crewrun::exit_codes;
use crewrun::io::config::{CONFIG_FILE, EngineConfig, write_config};
use crewrun::test_support::{TWO_TASK_DOC, TestProject};

fn crewrun(project: &TestProject) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_crewrun"));
    cmd.current_dir(project.root()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn init_then_validate_succeeds() {
    let project = TestProject::new();

    let status = crewrun(&project).arg("init").status().expect("crewrun init");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert!(project.path("crew.toml").is_file());

    let output = crewrun(&project)
        .arg("validate")
        .output()
        .expect("crewrun validate");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Report Crew: 2 workers, 2 tasks, linear architecture"));
    assert!(stdout.contains("-> notes.md (explicit)"));
    assert!(stdout.contains("-> Task_Result.md (result bucket)"));
}

#[test]
fn validate_invalid_definition_exits_invalid() {
    let project = TestProject::with_crew("## Agents\n");

    let output = crewrun(&project)
        .arg("validate")
        .output()
        .expect("crewrun validate");
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("structural error"), "{stderr}");
}

#[cfg(unix)]
#[test]
fn run_with_failing_provider_exits_failed() {
    let project = TestProject::with_crew(TWO_TASK_DOC);
    let mut config = EngineConfig::default();
    config.provider.command = vec!["sh".to_string(), "-c".to_string(), "exit 7".to_string()];
    write_config(&project.path(CONFIG_FILE), &config).expect("write config");

    let output = crewrun(&project).arg("run").output().expect("crewrun run");
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("task `Collect Data`"), "{stderr}");
}

#[cfg(unix)]
#[test]
fn run_with_shell_provider_writes_outputs() {
    let project = TestProject::with_crew(TWO_TASK_DOC);
    project.write("Task.md", "tides");
    let mut config = EngineConfig::default();
    config.provider.command = vec![
        "sh".to_string(),
        "-c".to_string(),
        "echo \"[$0]\"; cat >/dev/null".to_string(),
        "{model}".to_string(),
    ];
    write_config(&project.path(CONFIG_FILE), &config).expect("write config");

    let output = crewrun(&project)
        .args(["run", "--model", "ollama/phi3"])
        .output()
        .expect("crewrun run");
    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(project.read("output/data.md"), "[phi3]");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("done    Collect Data"));
    assert!(project.path(".crewrun/runs").is_dir());
}
