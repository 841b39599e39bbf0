use std::fs;
use tempfile::TempDir;
use filemon::{EngineState, MonitorEngine, RefreshOutcome};

fn config_text(dir: &std::path::Path) -> String {
    format!(
        r#"
[file_monitor]
check_interval = 60
max_files_per_check = 100

[[file_monitor.targets]]
path = "{}"
is_directory = true
pattern = "test_?.log"
delete = false
"#,
        dir.display()
    )
}

#[test]
fn test_load_config_file_and_scan() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    for i in 1..=3 {
        fs::write(temp_dir.path().join(format!("test_{i}.log")), format!("Log content {i}"))
            .expect("Failed to write test file");
    }
    fs::write(temp_dir.path().join("test_10.log"), "no").expect("Failed to write test file");

    let config_path = temp_dir.path().join("filemon.toml");
    fs::write(&config_path, config_text(temp_dir.path())).expect("Failed to write config");

    let engine = MonitorEngine::new();
    engine.load_config_file(&config_path).expect("Failed to load config");
    assert_eq!(engine.state(), EngineState::Ready);

    let result = match engine.refresh() {
        RefreshOutcome::Completed(result) => result,
        other => panic!("Expected a completed pass, got {:?}", other),
    };
    assert_eq!(result.files_found(), 3);
    assert_eq!(result.files_deleted(), 0);

    let report = engine.make_body();
    assert!(report.starts_with("<<<file_monitor>>>\nCheckInterval: 60 seconds\nTargets: 1\n"));
    assert!(report.contains("|found|keep"));
    for i in 1..=3 {
        assert!(report.contains(&format!("test_{i}.log|message=found")));
        assert!(temp_dir.path().join(format!("test_{i}.log")).exists());
    }
    assert!(!report.contains("test_10.log"));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let engine = MonitorEngine::new();

    assert!(engine
        .load_config_file(temp_dir.path().join("absent.toml"))
        .is_err());
    assert_eq!(engine.state(), EngineState::Uninitialized);
    assert!(engine
        .notifications()
        .iter()
        .any(|line| line.contains("[ERROR]")));
}

#[test]
fn test_config_without_section_monitors_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("filemon.toml");
    fs::write(&config_path, "[something_else]\nenabled = true\n").expect("Failed to write config");

    let engine = MonitorEngine::new();
    engine.load_config_file(&config_path).expect("Section absence is not fatal");

    let result = engine.refresh().result().cloned().unwrap();
    assert!(result.targets.is_empty());
    assert!(engine.current_report().contains("Targets: 0"));
}
