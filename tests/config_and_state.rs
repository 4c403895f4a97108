//! Configuration loading and store persistence, exercised through real
//! files in temporary directories.

use std::fs;

use jobsight::config::{load_config, Config};
use jobsight::crossval::DisabledCrossValidator;
use jobsight::state::{load_snapshot, save_snapshot};
use jobsight::{AnalyzeOptions, Harness};
use jobsight_core::learning::{PatternStore, SNAPSHOT_VERSION};
use jobsight_core::{Correction, Field, Tuning};
use tempfile::TempDir;

// ─── Configuration ──────────────────────────────────────────────────

#[test]
fn missing_config_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = load_config(&tmp.path().join("absent.toml")).unwrap();
    assert_eq!(config.tuning, Tuning::default());
    assert_eq!(config.cross_validation.provider, "disabled");
}

#[test]
fn config_file_overrides_selected_values() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("jobsight.toml");
    fs::write(
        &path,
        r#"
[tuning.learning]
reinforcement_step = 0.1

[tuning.quality]
min_overall = 0.5

[fetch]
timeout_secs = 5
user_agent = "test-agent"

[state]
path = "state/store.json"
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.tuning.learning.reinforcement_step, 0.1);
    assert_eq!(config.tuning.learning.confidence_cap, 0.95);
    assert_eq!(config.tuning.quality.min_overall, 0.5);
    assert_eq!(config.tuning.quality.min_title, 0.7);
    assert_eq!(config.fetch.timeout_secs, 5);
    assert_eq!(config.fetch.user_agent, "test-agent");
    assert_eq!(
        config.state.path.as_deref(),
        Some(std::path::Path::new("state/store.json"))
    );
}

#[test]
fn malformed_toml_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.toml");
    fs::write(&path, "[fetch\ntimeout_secs = ").unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn out_of_range_values_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");
    fs::write(&path, "[tuning.learning]\napplication_threshold = 1.5\n").unwrap();
    assert!(load_config(&path).is_err());
}

// ─── Snapshots ──────────────────────────────────────────────────────

fn store_with_corrections() -> PatternStore {
    let store = PatternStore::new(&Tuning::default());
    store
        .record_correction(Correction::human(
            "https://apply.deloitte.com/careers/JobDetail/1",
            Field::Company,
            Some("- 309308"),
            "Deloitte",
        ))
        .unwrap();
    store
        .record_correction(Correction::human(
            "https://globex.example/jobs/3",
            Field::Title,
            Some("Sr Eng"),
            "Senior Engineer",
        ))
        .unwrap();
    store
}

#[test]
fn snapshot_round_trips_through_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("store.json");
    let store = store_with_corrections();

    save_snapshot(&path, &store.snapshot()).unwrap();
    let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    let snapshot = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.corrections.len(), 2);

    let restored = PatternStore::restore(snapshot, &Tuning::default());
    assert_eq!(restored.learned_patterns(), store.learned_patterns());
}

#[test]
fn missing_snapshot_is_none() {
    let tmp = TempDir::new().unwrap();
    assert!(load_snapshot(&tmp.path().join("store.json")).unwrap().is_none());
}

#[test]
fn newer_snapshot_version_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.json");
    let mut snapshot = store_with_corrections().snapshot();
    snapshot.version = SNAPSHOT_VERSION + 1;
    fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

    let err = load_snapshot(&path).unwrap_err();
    assert!(err.to_string().contains("version"));
}

// ─── Harness persistence ────────────────────────────────────────────

#[test]
fn learning_survives_a_restart() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.state.path = Some(tmp.path().join("store.json"));

    let first =
        Harness::with_collaborators(config.clone(), None, Box::new(DisabledCrossValidator))
            .unwrap();
    first
        .record_correction(Correction::human(
            "https://apply.deloitte.com/careers/JobDetail/1",
            Field::Company,
            Some("- 309308"),
            "Deloitte",
        ))
        .unwrap();
    assert!(first.save_state().unwrap());

    let second =
        Harness::with_collaborators(config, None, Box::new(DisabledCrossValidator)).unwrap();
    assert_eq!(second.learning_stats().total_corrections, 1);
    assert_eq!(
        second
            .store()
            .patterns_for_domain("apply.deloitte.com")
            .len(),
        1
    );

    let result = second
        .analyze(
            "https://apply.deloitte.com/careers/JobDetail/2",
            Some("<html><body><h1>Tax Manager</h1><p>Company: - 309308</p></body></html>"),
            &AnalyzeOptions::default(),
        )
        .unwrap();
    assert_eq!(result.value(Field::Company), Some("Deloitte"));
}

#[test]
fn harness_without_state_path_does_not_save() {
    let harness =
        Harness::with_collaborators(Config::default(), None, Box::new(DisabledCrossValidator))
            .unwrap();
    assert!(!harness.save_state().unwrap());
}
