//! Work order loading
//!
//! Reads the centroid file that tells the controller what to place and in
//! which mode. Format (whitespace separated):
//!
//! ```text
//! <mode: m|M|a|A>
//! <component count>
//! <designation> <footprint> <value> <x> <y> <theta> <feeder>   (count times)
//! ```
//!
//! Any problem with the file is fatal at startup: the controller never runs
//! without a valid work order.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::defaults::MAX_COMPONENTS_TO_PLACE;
use crate::config::MachineConfig;
use crate::types::{OperationMode, PlacementOrder, WorkOrder};

/// Fields per component record.
const FIELDS_PER_COMPONENT: usize = 7;

#[derive(Debug, Error)]
pub enum WorklistError {
    #[error("Centroid file {} not present: {}", .0.display(), .1)]
    NotPresent(PathBuf, std::io::Error),

    #[error("Centroid file present but content issue: {0}")]
    ContentIssue(String),

    #[error("Centroid file lists {0} components; at most {MAX_COMPONENTS_TO_PLACE} can be placed")]
    TooManyComponents(usize),

    #[error("Centroid file lists no components to place")]
    Empty,

    #[error("Part {designation} uses feeder {feeder}, but the machine has {fitted} feeders")]
    FeederNotFitted {
        designation: String,
        feeder: usize,
        fitted: usize,
    },
}

/// Read and parse a centroid file.
pub fn load_work_order(path: &Path) -> Result<WorkOrder, WorklistError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| WorklistError::NotPresent(path.to_path_buf(), e))?;
    parse_work_order(&text)
}

/// Parse centroid file contents.
pub fn parse_work_order(text: &str) -> Result<WorkOrder, WorklistError> {
    let mut tokens = text.split_whitespace();

    let mode = match tokens.next() {
        Some("m" | "M") => OperationMode::Manual,
        Some("a" | "A") => OperationMode::Autonomous,
        Some(other) => {
            return Err(WorklistError::ContentIssue(format!(
                "mode must be 'm' or 'a', found '{other}'"
            )))
        }
        None => return Err(WorklistError::ContentIssue("file is empty".to_string())),
    };

    let count_token = tokens
        .next()
        .ok_or_else(|| WorklistError::ContentIssue("missing component count".to_string()))?;
    let count: i64 = count_token.parse().map_err(|_| {
        WorklistError::ContentIssue(format!("component count '{count_token}' is not an integer"))
    })?;
    let count = usize::try_from(count).map_err(|_| {
        WorklistError::ContentIssue(format!("component count {count} is negative"))
    })?;
    if count > MAX_COMPONENTS_TO_PLACE {
        return Err(WorklistError::TooManyComponents(count));
    }
    if count == 0 {
        return Err(WorklistError::Empty);
    }

    let fields: Vec<&str> = tokens.collect();
    if fields.len() < count * FIELDS_PER_COMPONENT {
        return Err(WorklistError::ContentIssue(format!(
            "expected {count} components of {FIELDS_PER_COMPONENT} fields, found {} fields",
            fields.len()
        )));
    }

    let parts = fields
        .chunks_exact(FIELDS_PER_COMPONENT)
        .take(count)
        .enumerate()
        .map(|(i, record)| parse_component(i, record))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WorkOrder { mode, parts })
}

fn parse_component(index: usize, record: &[&str]) -> Result<PlacementOrder, WorklistError> {
    let number = |field: &str, value: &str| -> Result<f64, WorklistError> {
        value.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
            WorklistError::ContentIssue(format!("component {index}: {field} '{value}' is not a number"))
        })
    };
    let feeder = record[6].parse::<usize>().map_err(|_| {
        WorklistError::ContentIssue(format!(
            "component {index}: feeder '{}' is not a feeder index",
            record[6]
        ))
    })?;

    Ok(PlacementOrder {
        designation: record[0].to_string(),
        footprint: record[1].to_string(),
        value: number("value", record[2])?,
        x: number("x", record[3])?,
        y: number("y", record[4])?,
        theta: number("theta", record[5])?,
        feeder,
    })
}

/// Check every part names a feeder the machine actually has.
pub fn check_feeders(order: &WorkOrder, config: &MachineConfig) -> Result<(), WorklistError> {
    let fitted = config.feeders.positions.len();
    match order.parts.iter().find(|p| p.feeder >= fitted) {
        Some(p) => Err(WorklistError::FeederNotFitted {
            designation: p.designation.clone(),
            feeder: p.feeder,
            fitted,
        }),
        None => Ok(()),
    }
}

/// Render a work order in centroid file format.
pub fn format_work_order(order: &WorkOrder) -> String {
    let mode = match order.mode {
        OperationMode::Manual => 'm',
        OperationMode::Autonomous => 'a',
    };
    let mut out = format!("{mode}\n{}\n", order.parts.len());
    for p in &order.parts {
        out.push_str(&format!(
            "{} {} {:.2} {:.2} {:.2} {:.2} {}\n",
            p.designation, p.footprint, p.value, p.x, p.y, p.theta, p.feeder
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "a\n3\n\
        R1 0603 100.0 10.0 20.0 90.0 2\n\
        C1 0805 0.1 30.0 5.0 0.0 1\n\
        U1 SOIC8 0 50.5 60.25 -45.0 1\n";

    #[test]
    fn test_parse_sample() {
        let order = parse_work_order(SAMPLE).unwrap();
        assert_eq!(order.mode, OperationMode::Autonomous);
        assert_eq!(order.parts.len(), 3);
        assert_eq!(order.parts[2].designation, "U1");
        assert_eq!(order.parts[2].y, 60.25);
        assert_eq!(order.parts[2].theta, -45.0);
        assert_eq!(order.parts[0].feeder, 2);
    }

    #[test]
    fn test_mode_is_case_insensitive() {
        let order = parse_work_order("M 1 R1 0603 1 0 0 0 0").unwrap();
        assert_eq!(order.mode, OperationMode::Manual);
    }

    #[test]
    fn test_bad_mode_is_content_issue() {
        let err = parse_work_order("x 1 R1 0603 1 0 0 0 0").unwrap_err();
        assert!(matches!(err, WorklistError::ContentIssue(_)));
    }

    #[test]
    fn test_truncated_record_is_content_issue() {
        let err = parse_work_order("m 2 R1 0603 1 0 0 0 0 R2 0603 1 0").unwrap_err();
        assert!(matches!(err, WorklistError::ContentIssue(_)));
    }

    #[test]
    fn test_non_numeric_field_is_content_issue() {
        let err = parse_work_order("m 1 R1 0603 1 abc 0 0 0").unwrap_err();
        assert!(err.to_string().contains("x 'abc'"));
    }

    #[test]
    fn test_too_many_components() {
        let err = parse_work_order("a 101").unwrap_err();
        assert!(matches!(err, WorklistError::TooManyComponents(101)));
    }

    #[test]
    fn test_zero_components_is_empty() {
        assert!(matches!(parse_work_order("a 0").unwrap_err(), WorklistError::Empty));
    }

    #[test]
    fn test_missing_file_is_not_present() {
        let err = load_work_order(Path::new("/nonexistent/centroid.txt")).unwrap_err();
        assert!(matches!(err, WorklistError::NotPresent(..)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let order = load_work_order(file.path()).unwrap();
        assert_eq!(order.parts.len(), 3);
    }

    #[test]
    fn test_feeder_must_be_fitted() {
        let order = parse_work_order("m 1 R1 0603 1 0 0 0 10").unwrap();
        let err = check_feeders(&order, &MachineConfig::default()).unwrap_err();
        assert!(matches!(err, WorklistError::FeederNotFitted { feeder: 10, .. }));
    }

    #[test]
    fn test_format_parses_back() {
        let order = parse_work_order(SAMPLE).unwrap();
        let again = parse_work_order(&format_work_order(&order)).unwrap();
        assert_eq!(again, order);
    }
}
