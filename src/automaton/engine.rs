//! The shared simulation: immutable topology, rules and partitions plus the
//! cell states they drive.

use std::sync::Arc;

use super::grid::GridTopology;
use super::partition::Partition;
use super::rules::RuleSet;
use super::stepping::{SkipPolicy, StepPass, StepReport, TransitionObserver};
use crate::state::CellStates;

pub struct Engine {
    topology: GridTopology,
    rules: RuleSet,
    partitions: Vec<Partition>,
    states: CellStates,
    policy: SkipPolicy,
    observer: Option<Arc<dyn TransitionObserver>>,
}

impl Engine {
    pub fn new(
        topology: GridTopology,
        rules: RuleSet,
        partitions: Vec<Partition>,
        states: CellStates,
        policy: SkipPolicy,
        observer: Option<Arc<dyn TransitionObserver>>,
    ) -> Self {
        debug_assert_eq!(topology.num_cells(), states.len());
        Engine {
            topology,
            rules,
            partitions,
            states,
            policy,
            observer,
        }
    }

    #[inline]
    pub fn topology(&self) -> &GridTopology {
        &self.topology
    }

    #[inline]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    #[inline]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    #[inline]
    pub fn states(&self) -> &CellStates {
        &self.states
    }

    #[inline]
    pub fn policy(&self) -> SkipPolicy {
        self.policy
    }

    fn pass(&self, time: f64) -> StepPass<'_> {
        StepPass {
            topology: &self.topology,
            rules: &self.rules,
            states: &self.states,
            policy: self.policy,
            observer: self.observer.as_deref(),
            time,
        }
    }

    /// Advance every cell of one partition. Runs on the caller's rayon pool.
    pub fn step_partition(&self, index: usize, time: f64) -> StepReport {
        self.pass(time).apply_cells(self.partitions[index].cells())
    }

    /// Advance all partitions in order on the calling thread's pool.
    pub fn step_all(&self, time: f64) -> StepReport {
        (0..self.partitions.len())
            .map(|index| self.step_partition(index, time))
            .fold(StepReport::default(), |a, b| a + b)
    }

    /// Publish the computed generation. Requires exclusive access, so no
    /// partition can be running.
    pub fn commit(&mut self) {
        self.states.commit();
    }
}
