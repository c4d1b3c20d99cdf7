//! Work order and placement records.

use serde::{Deserialize, Serialize};

/// Tolerance used when matching the gantry against fixed stations
/// (feeders, lookup camera).
pub const POSITION_TOLERANCE: f64 = 1e-6;

/// A position in machine coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Whether both coordinates match within [`POSITION_TOLERANCE`].
    pub fn coincides_with(self, other: Self) -> bool {
        (self.x - other.x).abs() <= POSITION_TOLERANCE && (self.y - other.y).abs() <= POSITION_TOLERANCE
    }

    /// PCB territory is the non-negative quadrant.
    pub fn is_over_pcb(self) -> bool {
        self.x >= 0.0 && self.y >= 0.0
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Operating mode declared by the work order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Operator drives each step with single-key commands.
    Manual,
    /// Controller sequences every part without operator input.
    Autonomous,
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Autonomous => write!(f, "automatic"),
        }
    }
}

/// One component to place. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacementOrder {
    pub designation: String,
    pub footprint: String,
    pub value: f64,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub feeder: usize,
}

impl PlacementOrder {
    pub const fn target(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// The loaded work order: mode plus parts in file order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkOrder {
    pub mode: OperationMode,
    pub parts: Vec<PlacementOrder>,
}

/// A part that came to rest on the PCB.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlacedPartRecord {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub feeder: usize,
}
