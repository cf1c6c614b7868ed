//! Plans and logs
//!
//! A [`Plan`] groups ops by phase and target location. Within a phase,
//! [`PhasePlan::schedule`] visits locations in order and, before an op,
//! schedules every op targeting the locations it reads. A parent's
//! `Extend` therefore lands before its children's, and a profile is tagged
//! before anything includes it.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use super::op::{MergeResult, Op};
use super::planner::Phase;
use crate::repository::Location;

/// Ops of one phase, keyed by target
#[derive(Debug, Clone, PartialEq)]
pub struct PhasePlan {
    pub phase: Phase,
    pub ops: BTreeMap<Location, Vec<Op>>,
}

impl PhasePlan {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            ops: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, op: Op) {
        self.ops.entry(op.target.clone()).or_default().push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Ops in application order, dependencies first
    pub fn schedule(&self) -> Vec<&Op> {
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.len());
        for location in self.ops.keys() {
            self.follow(location, &mut visited, &mut order);
        }
        order
    }

    fn follow<'a>(&'a self, location: &'a Location, visited: &mut HashSet<&'a Location>, order: &mut Vec<&'a Op>) {
        if !visited.insert(location) {
            return;
        }
        let Some(ops) = self.ops.get(location) else {
            return;
        };
        for op in ops {
            for prerequisite in op.prerequisites() {
                if self.ops.contains_key(prerequisite) {
                    self.follow(prerequisite, visited, order);
                }
            }
            order.push(op);
        }
    }
}

/// Every planned op, phase by phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub phases: Vec<PhasePlan>,
}

impl Plan {
    pub fn phase(&self, phase: Phase) -> Option<&PhasePlan> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn len(&self) -> usize {
        self.phases.iter().map(PhasePlan::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ops targeting a location, across phases
    pub fn ops_for<'a>(&'a self, location: &'a Location) -> impl Iterator<Item = &'a Op> + 'a {
        self.phases
            .iter()
            .filter_map(move |p| p.ops.get(location))
            .flatten()
    }

    /// Human-readable listing, one op per line in application order
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for phase in &self.phases {
            let _ = writeln!(out, "== {} ({} ops)", phase.phase, phase.len());
            for op in phase.schedule() {
                let _ = writeln!(out, "  {}", op);
            }
        }
        out
    }
}

/// One applied op and its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub op: Op,
    pub result: MergeResult,
}

/// Outcomes of one phase, keyed by target
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseLog {
    pub phase: Phase,
    pub entries: BTreeMap<Location, Vec<LogEntry>>,
}

impl PhaseLog {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            entries: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, op: Op, result: MergeResult) {
        self.entries
            .entry(op.target.clone())
            .or_default()
            .push(LogEntry { op, result });
    }
}

/// Summary counts of a log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    pub applied: usize,
    pub no_op: usize,
    pub failed: usize,
}

/// Everything that happened during compile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Log {
    pub phases: Vec<PhaseLog>,
}

impl Log {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseLog> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.phases.iter().flat_map(|p| p.entries.values().flatten())
    }

    pub fn entries_for<'a>(&'a self, location: &'a Location) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.phases
            .iter()
            .filter_map(move |p| p.entries.get(location))
            .flatten()
    }

    pub fn failures(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries().filter(|e| e.result.is_failed())
    }

    pub fn stats(&self) -> LogStats {
        let mut stats = LogStats::default();
        for entry in self.entries() {
            match entry.result {
                MergeResult::Applied { .. } => stats.applied += 1,
                MergeResult::NoOp => stats.no_op += 1,
                MergeResult::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }
}
