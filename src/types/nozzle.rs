//! Nozzle identity and per-nozzle storage.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// One of the three pick heads mounted on the gantry.
///
/// The centre nozzle sits directly under the gantry reference point; the
/// left and right nozzles are offset along x by the configured separation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Nozzle {
    Left,
    Centre,
    Right,
}

impl Nozzle {
    /// All nozzles in pick order (left first).
    pub const ALL: [Self; 3] = [Self::Left, Self::Centre, Self::Right];

    /// Wire index used in the instruction argument slot.
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Centre => 1,
            Self::Right => 2,
        }
    }

    /// Decode a wire index. Anything outside `0..=2` is not a nozzle.
    pub const fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Centre),
            2 => Some(Self::Right),
            _ => None,
        }
    }

    /// Signed multiple of the nozzle separation between this nozzle and the
    /// gantry reference point: left -1, centre 0, right +1.
    pub const fn offset_steps(self) -> f64 {
        match self {
            Self::Left => -1.0,
            Self::Centre => 0.0,
            Self::Right => 1.0,
        }
    }

    /// Capitalised name used at the start of narration lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Centre => "Centre",
            Self::Right => "Right",
        }
    }
}

impl std::fmt::Display for Nozzle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Centre => write!(f, "centre"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Fixed-size storage with one slot per nozzle, indexed by [`Nozzle`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PerNozzle<T>([T; 3]);

impl<T> PerNozzle<T> {
    pub const fn new(left: T, centre: T, right: T) -> Self {
        Self([left, centre, right])
    }

    /// Iterate `(nozzle, value)` pairs in left, centre, right order.
    pub fn iter(&self) -> impl Iterator<Item = (Nozzle, &T)> {
        Nozzle::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T: Clone> PerNozzle<T> {
    pub fn splat(value: T) -> Self {
        Self([value.clone(), value.clone(), value])
    }
}

impl<T> Index<Nozzle> for PerNozzle<T> {
    type Output = T;

    fn index(&self, nozzle: Nozzle) -> &T {
        &self.0[nozzle.index()]
    }
}

impl<T> IndexMut<Nozzle> for PerNozzle<T> {
    fn index_mut(&mut self, nozzle: Nozzle) -> &mut T {
        &mut self.0[nozzle.index()]
    }
}
