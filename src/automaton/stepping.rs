//! Per-cell transition function with dirty-flag skipping.
//!
//! A cell is re-evaluated only when it, or one of its neighbors, flipped in
//! the previous generation. Every flip marks all 8 neighbors dirty for the
//! following generation, so stable regions cost nothing once they settle.

use std::ops::Add;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::grid::{CellId, GridTopology};
use super::rules::RuleSet;
use crate::state::CellStates;

/// Whether clean cells are skipped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// Evaluate only cells whose neighborhood changed last generation.
    #[default]
    SkipStable,
    /// Evaluate every cell every generation.
    EvaluateAll,
}

/// Receives one event per cell per generation, from worker threads.
///
/// `time` is the generation clock value at which the computed state becomes
/// visible. Skipped cells report `old == new`.
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, cell: CellId, old: bool, new: bool, time: f64);
}

impl<F> TransitionObserver for F
where
    F: Fn(CellId, bool, bool, f64) + Send + Sync,
{
    fn on_transition(&self, cell: CellId, old: bool, new: bool, time: f64) {
        self(cell, old, new, time)
    }
}

/// What happened to a single cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellOutcome {
    Skipped,
    Stable,
    Flipped,
}

/// Cell counts for one partition or one whole generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub evaluated: usize,
    pub skipped: usize,
    pub flipped: usize,
}

impl StepReport {
    pub fn cells(&self) -> usize {
        self.evaluated + self.skipped
    }
}

impl From<CellOutcome> for StepReport {
    fn from(outcome: CellOutcome) -> Self {
        match outcome {
            CellOutcome::Skipped => StepReport {
                skipped: 1,
                ..StepReport::default()
            },
            CellOutcome::Stable => StepReport {
                evaluated: 1,
                ..StepReport::default()
            },
            CellOutcome::Flipped => StepReport {
                evaluated: 1,
                flipped: 1,
                ..StepReport::default()
            },
        }
    }
}

impl Add for StepReport {
    type Output = StepReport;

    fn add(self, rhs: StepReport) -> StepReport {
        StepReport {
            evaluated: self.evaluated + rhs.evaluated,
            skipped: self.skipped + rhs.skipped,
            flipped: self.flipped + rhs.flipped,
        }
    }
}

/// Live cells among the 8 neighbors of `cell`.
#[inline]
pub fn alive_neighbors(topology: &GridTopology, states: &CellStates, cell: CellId) -> usize {
    topology
        .neighbors(cell)
        .iter()
        .filter(|&&n| states.current(n))
        .count()
}

/// Everything a worker needs to advance cells by one generation.
pub struct StepPass<'a> {
    pub topology: &'a GridTopology,
    pub rules: &'a RuleSet,
    pub states: &'a CellStates,
    pub policy: SkipPolicy,
    pub observer: Option<&'a dyn TransitionObserver>,
    /// Generation clock value forwarded to the observer.
    pub time: f64,
}

impl StepPass<'_> {
    /// Compute `next` for one cell and propagate dirty flags if it flips.
    pub fn apply_cell(&self, cell: CellId) -> CellOutcome {
        let old = self.states.current(cell);

        if self.policy == SkipPolicy::SkipStable && !self.states.is_dirty(cell) {
            if let Some(observer) = self.observer {
                observer.on_transition(cell, old, old, self.time);
            }
            return CellOutcome::Skipped;
        }

        let count = alive_neighbors(self.topology, self.states, cell);
        let new = self.rules.next_state(old, count);
        self.states.store_next(cell, new);

        let outcome = if new != old {
            self.states.mark_changed(cell);
            for &neighbor in self.topology.neighbors(cell) {
                self.states.mark_neighborhood_changed(neighbor);
            }
            CellOutcome::Flipped
        } else {
            CellOutcome::Stable
        };

        if let Some(observer) = self.observer {
            observer.on_transition(cell, old, new, self.time);
        }
        outcome
    }

    /// Apply the transition to `cells` in parallel on the current rayon pool.
    ///
    /// Each cell writes only its own `next`/`changed_this_step` slot plus the
    /// monotonic neighborhood flags, so iteration order is irrelevant.
    pub fn apply_cells(&self, cells: &[CellId]) -> StepReport {
        cells
            .par_iter()
            .map(|&cell| StepReport::from(self.apply_cell(cell)))
            .reduce(StepReport::default, |a, b| a + b)
    }
}
