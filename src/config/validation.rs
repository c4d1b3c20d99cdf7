//! Config validation: unknown-key detection with edit-distance suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::defaults::MAX_FEEDERS;
use super::MachineConfig;
use crate::types::Nozzle;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `MachineConfig`.
///
/// Maintained by hand to match the struct hierarchy in `machine_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [workspace]
        "workspace",
        "workspace.min_x",
        "workspace.max_x",
        "workspace.min_y",
        "workspace.max_y",
        "workspace.home_x",
        "workspace.home_y",
        // [feeders]
        "feeders",
        "feeders.positions",
        "feeders.positions.x",
        "feeders.positions.y",
        // [camera]
        "camera",
        "camera.lookup_x",
        "camera.lookup_y",
        // [head]
        "head",
        "head.nozzle_separation",
        "head.full_speed",
        "head.rotate_speed",
        // [timing]
        "timing",
        "timing.nozzle_lower_secs",
        "timing.nozzle_raise_secs",
        "timing.vacuum_apply_secs",
        "timing.vacuum_release_secs",
        "timing.photo_secs",
        "timing.pcb_load_unload_secs",
        // [misalignment]
        "misalignment",
        "misalignment.max_theta_pick",
        "misalignment.max_x_preplace",
        "misalignment.max_y_preplace",
        // [polling]
        "polling",
        "polling.simulator_hz",
        "polling.controller_hz",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Collects the dotted path of every key in a parsed TOML document.
///
/// Tables inside an array (`[[feeders.positions]]`) are walked too; their
/// keys are reported under the array's path with no index, so every feeder
/// entry checks against the same `feeders.positions.x` / `.y` pair.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    collect_keys(value, prefix, &mut keys);
    keys.sort();
    keys.dedup();
    keys
}

fn collect_keys(value: &toml::Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        toml::Value::Table(table) => {
            for (name, child) in table {
                let path = match prefix {
                    "" => name.clone(),
                    _ => format!("{prefix}.{name}"),
                };
                collect_keys(child, &path, out);
                out.push(path);
            }
        }
        toml::Value::Array(items) => {
            for item in items.iter().filter(|item| item.is_table()) {
                collect_keys(item, prefix, out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Edit Distance
// ============================================================================

/// Number of single-character inserts, deletes and substitutions turning
/// `from` into `to`.
fn edit_distance(from: &str, to: &str) -> usize {
    let to: Vec<char> = to.chars().collect();
    // row[j] = distance from the prefix of `from` seen so far to to[..j]
    let mut row: Vec<usize> = (0..=to.len()).collect();

    for (i, a) in from.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &b) in to.iter().enumerate() {
            let substitute = diagonal + usize::from(a != b);
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[to.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, edit_distance(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        // Tie-break on the key itself so the suggestion does not depend on
        // HashSet iteration order.
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed `MachineConfig`.
///
/// Returns (errors, warnings): errors describe a machine that cannot run
/// and must prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(config: &MachineConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let w = &config.workspace;
    for (name, value) in [
        ("workspace.min_x", w.min_x),
        ("workspace.max_x", w.max_x),
        ("workspace.min_y", w.min_y),
        ("workspace.max_y", w.max_y),
        ("workspace.home_x", w.home_x),
        ("workspace.home_y", w.home_y),
        ("camera.lookup_x", config.camera.lookup_x),
        ("camera.lookup_y", config.camera.lookup_y),
    ] {
        if !value.is_finite() {
            errors.push(format!("{name} = {value} must be a finite number"));
        }
    }
    if w.min_x >= w.max_x {
        errors.push(format!(
            "workspace.min_x ({:.1}) must be < workspace.max_x ({:.1})",
            w.min_x, w.max_x
        ));
    }
    if w.min_y >= w.max_y {
        errors.push(format!(
            "workspace.min_y ({:.1}) must be < workspace.max_y ({:.1})",
            w.min_y, w.max_y
        ));
    }

    // Stations must be reachable by the gantry
    if !config.in_workspace(config.home()) {
        errors.push(format!("home position {} is outside the workspace", config.home()));
    }
    if !config.in_workspace(config.lookup_camera()) {
        errors.push(format!(
            "lookup camera {} is outside the workspace",
            config.lookup_camera()
        ));
    }
    if config.lookup_camera().is_over_pcb() {
        warnings.push(ValidationWarning {
            field: "camera".to_string(),
            message: format!(
                "lookup camera {} sits over PCB territory; look-down photos there will also succeed",
                config.lookup_camera()
            ),
            suggestion: None,
        });
    }

    // Feeders: operator keys 0-9 address at most ten of them
    let feeders = &config.feeders.positions;
    if feeders.is_empty() || feeders.len() > MAX_FEEDERS {
        errors.push(format!(
            "feeders.positions has {} entries; expected 1-{MAX_FEEDERS}",
            feeders.len()
        ));
    }
    for (i, f) in feeders.iter().enumerate() {
        if !config.in_workspace(*f) {
            errors.push(format!("feeder {i} at {f} is outside the workspace"));
        } else {
            // Autonomous picks park the gantry so each nozzle sits over the feeder
            for nozzle in Nozzle::ALL {
                let stop = config.head_position_for(nozzle, *f);
                if !config.in_workspace(stop) {
                    errors.push(format!(
                        "feeder {i} at {f}: gantry stop {stop} for the {} nozzle is outside the workspace",
                        nozzle.name().to_lowercase()
                    ));
                }
            }
        }
        if f.is_over_pcb() {
            warnings.push(ValidationWarning {
                field: format!("feeders.positions[{i}]"),
                message: format!("feeder {i} at {f} sits over PCB territory"),
                suggestion: None,
            });
        }
    }

    // Divisors and durations
    for (name, value) in [
        ("head.full_speed", config.head.full_speed),
        ("head.rotate_speed", config.head.rotate_speed),
    ] {
        if !value.is_finite() || value <= 0.0 {
            errors.push(format!("{name} = {value} must be > 0 (used as divisor)"));
        }
    }
    if !config.head.nozzle_separation.is_finite() || config.head.nozzle_separation < 0.0 {
        errors.push(format!(
            "head.nozzle_separation = {} cannot be negative",
            config.head.nozzle_separation
        ));
    }

    let t = &config.timing;
    for (name, value) in [
        ("timing.nozzle_lower_secs", t.nozzle_lower_secs),
        ("timing.nozzle_raise_secs", t.nozzle_raise_secs),
        ("timing.vacuum_apply_secs", t.vacuum_apply_secs),
        ("timing.vacuum_release_secs", t.vacuum_release_secs),
        ("timing.photo_secs", t.photo_secs),
        ("timing.pcb_load_unload_secs", t.pcb_load_unload_secs),
    ] {
        if !value.is_finite() || value <= 0.0 {
            errors.push(format!("{name} = {value} must be a positive duration"));
        }
    }

    let m = &config.misalignment;
    for (name, value) in [
        ("misalignment.max_theta_pick", m.max_theta_pick),
        ("misalignment.max_x_preplace", m.max_x_preplace),
        ("misalignment.max_y_preplace", m.max_y_preplace),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(format!("{name} = {value} cannot be negative"));
        }
    }

    // Polling: the simulator must see every instruction before the
    // controller's next poll
    let p = &config.polling;
    if p.simulator_hz == 0 || p.controller_hz == 0 {
        errors.push("polling.simulator_hz and polling.controller_hz must be > 0".to_string());
    } else if p.simulator_hz < p.controller_hz {
        errors.push(format!(
            "polling.controller_hz ({}) must not exceed polling.simulator_hz ({})",
            p.controller_hz, p.simulator_hz
        ));
    } else if p.simulator_hz % p.controller_hz != 0 {
        warnings.push(ValidationWarning {
            field: "polling".to_string(),
            message: format!(
                "polling.simulator_hz ({}) is not a multiple of polling.controller_hz ({}); lockstep runs round down",
                p.simulator_hz, p.controller_hz
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("head.full_speed", "head.full_speed"), 0);
        assert_eq!(edit_distance("full_sped", "full_speed"), 1);
        assert_eq!(edit_distance("photo_secs", "phtoo_secs"), 2);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [head]
            full_speed = 800.0
            [[feeders.positions]]
            x = 50.0
            y = -100.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert_eq!(
            keys,
            [
                "feeders",
                "feeders.positions",
                "feeders.positions.x",
                "feeders.positions.y",
                "head",
                "head.full_speed",
            ]
        );
    }

    #[test]
    fn test_typo_inside_feeder_entry_warns() {
        let warnings = validate_unknown_keys(
            r#"
            [[feeders.positions]]
            x = 50.0
            y = -100.0

            [[feeders.positions]]
            x = 150.0
            yy = -100.0
            "#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "feeders.positions.yy");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("feeders.positions.y"));
    }

    #[test]
    fn test_unknown_key_gets_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
            [head]
            full_sped = 800.0
            "#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "head.full_sped");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("head.full_speed"));
        assert!(warnings[0].to_string().contains("did you mean 'head.full_speed'"));
    }

    #[test]
    fn test_unrelated_key_has_no_suggestion() {
        let warnings = validate_unknown_keys("[conveyor]\nbelt_speed = 3.0\n");
        assert!(warnings.iter().all(|w| w.suggestion.is_none()));
        assert!(warnings.iter().any(|w| w.field == "conveyor.belt_speed"));
    }

    #[test]
    fn test_known_keys_produce_no_warnings() {
        let text = MachineConfig::default().to_toml().unwrap();
        assert!(validate_unknown_keys(&text).is_empty());
    }

    #[test]
    fn test_defaults_pass_range_checks() {
        let (errors, warnings) = validate_physical_ranges(&MachineConfig::default());
        assert!(errors.is_empty(), "{errors:?}");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_zero_speed_is_rejected() {
        let mut config = MachineConfig::default();
        config.head.full_speed = 0.0;
        let (errors, _) = validate_physical_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("head.full_speed")));
    }

    #[test]
    fn test_too_many_feeders_is_rejected() {
        let mut config = MachineConfig::default();
        config.feeders.positions.push(Point::new(990.0, -100.0));
        let (errors, _) = validate_physical_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("feeders.positions")));
    }

    #[test]
    fn test_feeder_at_workspace_edge_needs_room_for_every_nozzle() {
        let mut config = MachineConfig::default();
        config.feeders.positions = vec![Point::new(990.0, -100.0)];
        let (errors, _) = validate_physical_ranges(&config);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("feeder 0"), "{errors:?}");
        assert!(errors[0].contains("left nozzle"), "{errors:?}");

        config.feeders.positions = vec![Point::new(980.0, -100.0)];
        let (errors, _) = validate_physical_ranges(&config);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_camera_outside_workspace_is_rejected() {
        let mut config = MachineConfig::default();
        config.camera.lookup_x = -500.0;
        let (errors, _) = validate_physical_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("lookup camera")));
    }

    #[test]
    fn test_non_multiple_poll_rate_warns() {
        let mut config = MachineConfig::default();
        config.polling.simulator_hz = 120;
        let (errors, warnings) = validate_physical_ranges(&config);
        assert!(errors.is_empty());
        assert!(warnings.iter().any(|w| w.field == "polling"));
    }
}
