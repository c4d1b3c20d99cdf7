//! Config Validation Tests
//!
//! Typo detection and physical range validation for the machine config,
//! plus loading a custom machine from disk and running a job on it.

use pnp_machine::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use pnp_machine::config::{ConfigError, MachineConfig};
use pnp_machine::types::Point;
use pnp_machine::worklist::{check_feeders, parse_work_order, WorklistError};
use pnp_machine::Bench;
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_timing_key_warns_with_suggestion() {
    let toml_str = r#"
[timing]
nozle_lower_secs = 0.2
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("nozle_lower_secs"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("timing.nozzle_lower_secs"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn unknown_section_has_no_close_match() {
    let warnings = validate_unknown_keys("[conveyor]\nbelt_speed = 3.0\n");
    assert!(!warnings.is_empty());
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn feeder_entries_are_known_keys() {
    let toml_str = r#"
[[feeders.positions]]
x = 50.0
y = -100.0

[[feeders.positions]]
x = 150.0
y = -100.0
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn misspelt_feeder_coordinate_is_caught() {
    let toml_str = r#"
[[feeders.positions]]
xx = 50.0
y = -100.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("feeders.positions.x"));
}

#[test]
fn suggestion_respects_edit_distance() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("polling.controler_hz", &known).as_deref(),
        Some("polling.controller_hz")
    );
    assert!(suggest_correction("polling.frequency", &known).is_none());
}

// ============================================================================
// Physical Range Validation
// ============================================================================

#[test]
fn stock_machine_is_valid() {
    let (errors, warnings) = validate_physical_ranges(&MachineConfig::default());
    assert!(errors.is_empty(), "{errors:?}");
    assert!(warnings.is_empty(), "{warnings:?}");
}

#[test]
fn inverted_workspace_is_fatal() {
    let mut config = MachineConfig::default();
    config.workspace.min_y = 2000.0;
    let (errors, _) = validate_physical_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("workspace.min_y")), "{errors:?}");
}

#[test]
fn feeder_outside_workspace_is_fatal() {
    let mut config = MachineConfig::default();
    config.feeders.positions[3] = Point::new(5000.0, -100.0);
    let (errors, _) = validate_physical_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("feeder 3")), "{errors:?}");
}

#[test]
fn feeder_too_close_to_the_edge_for_the_left_nozzle_fails_to_load() {
    let file = write_config(
        r#"
[[feeders.positions]]
x = 990.0
y = -100.0
"#,
    );
    let err = MachineConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
    assert!(err.to_string().contains("left nozzle"), "{err}");
}

#[test]
fn negative_misalignment_is_fatal() {
    let mut config = MachineConfig::default();
    config.misalignment.max_theta_pick = -1.0;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

// ============================================================================
// Loading From Disk
// ============================================================================

#[test]
fn partial_file_keeps_stock_defaults() {
    let file = write_config(
        r#"
[head]
full_speed = 250.0

[misalignment]
max_theta_pick = 0.0
"#,
    );
    let config = MachineConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.head.full_speed, 250.0);
    assert_eq!(config.misalignment.max_theta_pick, 0.0);
    assert_eq!(config.polling, MachineConfig::default().polling);
    assert_eq!(config.feeders.positions.len(), 10);
}

#[test]
fn invalid_file_fails_to_load() {
    let file = write_config("[polling]\nsimulator_hz = 10\ncontroller_hz = 50\n");
    let err = MachineConfig::load_from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("polling.controller_hz"), "{err}");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_config("[head\nfull_speed = ");
    assert!(matches!(
        MachineConfig::load_from_file(file.path()),
        Err(ConfigError::Parse(..))
    ));
}

#[test]
fn custom_three_feeder_machine_runs_a_job() {
    let file = write_config(
        r#"
[[feeders.positions]]
x = 100.0
y = -150.0

[[feeders.positions]]
x = 300.0
y = -150.0

[[feeders.positions]]
x = 500.0
y = -150.0
"#,
    );
    let config = MachineConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.feeders.positions.len(), 3);

    let too_far = parse_work_order("a 1 R1 0603 1 100 100 0 4").unwrap();
    assert!(matches!(
        check_feeders(&too_far, &config),
        Err(WorklistError::FeederNotFitted { feeder: 4, fitted: 3, .. })
    ));

    let order = parse_work_order("a 2 R1 0603 1 100 100 0 2 R2 0603 1 400 250 90 0").unwrap();
    check_feeders(&order, &config).unwrap();
    let mut bench = Bench::new(config, order, Some(5));
    assert!(bench.run_until(Bench::is_done, 50_000));

    let report = bench.report();
    assert_eq!(report.placed.len(), 2);
    assert_eq!(report.placed[0].feeder, 0);
    assert_eq!(report.placed[1].feeder, 2);
}
