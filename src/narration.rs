//! Narration stream
//!
//! Both state machines describe every transition and physical event as a
//! timestamped line. Lines are buffered in a [`Narrator`] during a tick and
//! drained by whoever drives the tick, which emits them through `tracing`
//! and/or keeps them for inspection. Streams from the two sides are merged
//! with [`interleave`], which preserves `sim_time` order.

use serde::Serialize;
use tracing::{info, warn};

/// Which state machine produced a line.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Controller,
    Simulator,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Controller => write!(f, "controller"),
            Self::Simulator => write!(f, "simulator"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    /// Rejected commands, operator advisories, dropped parts.
    Warning,
}

/// One narration line.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Narration {
    pub sim_time: f64,
    pub origin: Origin,
    pub severity: Severity,
    pub message: String,
}

impl Narration {
    /// Emit through `tracing` with `sim_time` and `origin` as fields.
    pub fn emit(&self) {
        match self.severity {
            Severity::Info => info!(sim_time = self.sim_time, origin = %self.origin, "{}", self),
            Severity::Warning => warn!(sim_time = self.sim_time, origin = %self.origin, "{}", self),
        }
    }
}

impl std::fmt::Display for Narration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Time: {:7.2}  {}", self.sim_time, self.message)
    }
}

/// Per-side outbox of narration lines.
#[derive(Debug)]
pub struct Narrator {
    origin: Origin,
    pending: Vec<Narration>,
}

impl Narrator {
    pub const fn new(origin: Origin) -> Self {
        Self {
            origin,
            pending: Vec::new(),
        }
    }

    pub fn info(&mut self, sim_time: f64, message: impl Into<String>) {
        self.push(sim_time, Severity::Info, message.into());
    }

    pub fn warn(&mut self, sim_time: f64, message: impl Into<String>) {
        self.push(sim_time, Severity::Warning, message.into());
    }

    fn push(&mut self, sim_time: f64, severity: Severity, message: String) {
        self.pending.push(Narration {
            sim_time,
            origin: self.origin,
            severity,
            message,
        });
    }

    /// Take every buffered line, oldest first.
    pub fn drain(&mut self) -> Vec<Narration> {
        std::mem::take(&mut self.pending)
    }
}

/// Merge two streams that are each already in `sim_time` order.
///
/// On equal timestamps lines from `first` come before lines from `second`,
/// and each stream keeps its own relative order.
pub fn interleave(first: Vec<Narration>, second: Vec<Narration>) -> Vec<Narration> {
    let mut merged = Vec::with_capacity(first.len() + second.len());
    let mut a = first.into_iter().peekable();
    let mut b = second.into_iter().peekable();
    loop {
        let take_first = match (a.peek(), b.peek()) {
            (Some(x), Some(y)) => x.sim_time <= y.sim_time,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_first { a.next() } else { b.next() };
        merged.extend(next);
    }
    merged
}
