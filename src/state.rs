//! Double-buffered cell state and change-tracking flags.
//!
//! Write ownership is split between two windows that never overlap:
//! - during a cascade, workers write `next`, `changed_this_step` and
//!   `neighborhood_changed_this_step` (atomics, so `&self` suffices) while
//!   only reading the plain arrays;
//! - during commit, the controller holds `&mut CellStates` and shifts the
//!   "this step" buffers into the plain arrays.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::automaton::grid::CellId;
use crate::error::ConfigError;

pub struct CellStates {
    current: Vec<bool>,
    next: Vec<AtomicBool>,
    changed_this_step: Vec<AtomicBool>,
    changed_last_step: Vec<bool>,
    neighborhood_changed_this_step: Vec<AtomicBool>,
    neighborhood_changed_last_step: Vec<bool>,
}

fn atomic_vec(len: usize, value: bool) -> Vec<AtomicBool> {
    (0..len).map(|_| AtomicBool::new(value)).collect()
}

impl CellStates {
    /// Wrap an initial alive/dead vector. Every cell starts dirty so the first
    /// generation evaluates the whole grid.
    pub fn from_cells(current: Vec<bool>) -> Self {
        let len = current.len();
        CellStates {
            current,
            next: atomic_vec(len, false),
            changed_this_step: atomic_vec(len, false),
            changed_last_step: vec![true; len],
            neighborhood_changed_this_step: atomic_vec(len, false),
            neighborhood_changed_last_step: vec![true; len],
        }
    }

    /// All cells dead.
    pub fn dead(num_cells: usize) -> Self {
        Self::from_cells(vec![false; num_cells])
    }

    /// Each cell alive with probability `probability`, reproducible per seed.
    pub fn random(num_cells: usize, probability: f64, seed: u64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ConfigError::InvalidProbability(probability));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cells = (0..num_cells).map(|_| rng.gen_bool(probability)).collect();
        Ok(Self::from_cells(cells))
    }

    /// The given cells alive, everything else dead.
    pub fn from_alive<I>(num_cells: usize, alive: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = CellId>,
    {
        let mut cells = vec![false; num_cells];
        for cell in alive {
            let slot = cells
                .get_mut(cell)
                .ok_or(ConfigError::CellOutOfRange { cell, num_cells })?;
            *slot = true;
        }
        Ok(Self::from_cells(cells))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    #[inline]
    pub fn current(&self, cell: CellId) -> bool {
        self.current[cell]
    }

    /// Committed alive/dead state of every cell.
    pub fn current_cells(&self) -> &[bool] {
        &self.current
    }

    #[inline]
    pub fn next(&self, cell: CellId) -> bool {
        self.next[cell].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn changed_this_step(&self, cell: CellId) -> bool {
        self.changed_this_step[cell].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn changed_last_step(&self, cell: CellId) -> bool {
        self.changed_last_step[cell]
    }

    #[inline]
    pub fn neighborhood_changed_this_step(&self, cell: CellId) -> bool {
        self.neighborhood_changed_this_step[cell].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn neighborhood_changed_last_step(&self, cell: CellId) -> bool {
        self.neighborhood_changed_last_step[cell]
    }

    /// Whether the cell or one of its neighbors flipped last generation.
    #[inline]
    pub fn is_dirty(&self, cell: CellId) -> bool {
        self.neighborhood_changed_last_step[cell] || self.changed_last_step[cell]
    }

    pub fn alive_count(&self) -> usize {
        self.current.par_iter().filter(|&&alive| alive).count()
    }

    #[inline]
    pub(crate) fn store_next(&self, cell: CellId, alive: bool) {
        self.next[cell].store(alive, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn mark_changed(&self, cell: CellId) {
        self.changed_this_step[cell].store(true, Ordering::Relaxed);
    }

    /// Monotonic: concurrent writers only ever store `true`.
    #[inline]
    pub(crate) fn mark_neighborhood_changed(&self, cell: CellId) {
        self.neighborhood_changed_this_step[cell].store(true, Ordering::Relaxed);
    }

    /// Publish the computed generation: `current <- next`, shift the
    /// "this step" flags into "last step" and clear them.
    pub fn commit(&mut self) {
        self.current
            .par_iter_mut()
            .zip(self.next.par_iter_mut())
            .for_each(|(current, next)| *current = *next.get_mut());

        self.changed_last_step
            .par_iter_mut()
            .zip(self.changed_this_step.par_iter_mut())
            .for_each(|(last, this)| *last = std::mem::take(this.get_mut()));

        self.neighborhood_changed_last_step
            .par_iter_mut()
            .zip(self.neighborhood_changed_this_step.par_iter_mut())
            .for_each(|(last, this)| *last = std::mem::take(this.get_mut()));
    }
}
