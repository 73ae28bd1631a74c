//! Generation controller: double-buffer commit and background cascades.
//!
//! Core invariant: a cascade only ever writes the "next" side of the state,
//! and commit only runs once the cascade has handed the engine back. The
//! controller holds the engine in an `Arc` that is unique exactly when no
//! cascade is in flight, so commit cannot overlap a running partition.

use std::sync::Arc;

use log::{debug, info};
use rayon::ThreadPool;

use super::cascade::{self, CascadeHandle, CascadeOutcome};
use super::engine::Engine;
use super::grid::{CellId, GridTopology};
use super::partition::{build_partitions, Partition};
use super::rules::RuleSet;
use super::stepping::TransitionObserver;
use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineError};
use crate::state::CellStates;

/// Controller lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The last launched cascade has been observed complete.
    Idle,
    /// A cascade is running in the background.
    Stepping,
    /// Next states are being published.
    Committing,
    /// A partition failed; no further generations are accepted.
    Failed,
}

/// Outcome of one pacing tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// The renderer should publish this partition of the committed state.
    Publish { partition: usize },
    /// Every partition was published; a new generation was committed.
    StepCompleted { generation: u64 },
}

/// Time at which the next computed generation becomes visible.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationClock {
    next_transition: f64,
    period: f64,
}

impl GenerationClock {
    pub fn new(period: f64) -> Self {
        GenerationClock {
            next_transition: 0.0,
            period,
        }
    }

    #[inline]
    pub fn next_transition(&self) -> f64 {
        self.next_transition
    }

    #[inline]
    pub fn period(&self) -> f64 {
        self.period
    }

    /// The next transition happens one period after `now`.
    pub fn advance_from(&mut self, now: f64) {
        self.next_transition = now + self.period;
    }
}

/// Builds a [`GenerationController`] and runs its first cascade.
pub struct ControllerBuilder {
    config: EngineConfig,
    states: Option<CellStates>,
    alive: Option<Vec<CellId>>,
    observer: Option<Arc<dyn TransitionObserver>>,
}

impl ControllerBuilder {
    /// Start from an explicit state instead of a random one.
    pub fn states(mut self, states: CellStates) -> Self {
        self.states = Some(states);
        self
    }

    /// Start with exactly these cells alive.
    pub fn alive<I>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = CellId>,
    {
        self.alive = Some(cells.into_iter().collect());
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<GenerationController, EngineError> {
        let config = self.config;
        let dims = config.validate()?;

        let threads = config.worker_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("automata-worker-{i}"))
            .build()?;

        let rules = RuleSet::parse(&config.birth, &config.survive)?;
        let topology = pool.install(|| GridTopology::new(dims))?;
        let partitions = build_partitions(&topology, config.divisions)?;
        let num_cells = topology.num_cells();

        let states = match (self.states, self.alive) {
            (Some(states), _) => states,
            (None, Some(alive)) => CellStates::from_alive(num_cells, alive)?,
            (None, None) => CellStates::random(num_cells, config.probability, config.seed)?,
        };
        if states.len() != num_cells {
            return Err(ConfigError::StateSizeMismatch {
                expected: num_cells,
                actual: states.len(),
            }
            .into());
        }

        info!(
            "automaton {}x{} cells ({} clusters) rule {} in {} partitions on {} threads",
            topology.x_cells(),
            topology.z_cells(),
            topology.num_clusters(),
            rules,
            partitions.len(),
            threads
        );

        let engine = Engine::new(
            topology,
            rules,
            partitions,
            states,
            config.skip_policy,
            self.observer,
        );

        let mut controller = GenerationController {
            engine: Arc::new(engine),
            pool: Arc::new(pool),
            in_flight: None,
            last_outcome: None,
            clock: GenerationClock::new(config.step_period),
            generation: 0,
            publish_cursor: 0,
            phase: Phase::Idle,
            config,
        };

        // Populate `next` before anything can be published.
        controller.launch();
        controller.wait()?;
        Ok(controller)
    }
}

/// Drives generations: cascade, wait, commit, relaunch.
pub struct GenerationController {
    engine: Arc<Engine>,
    pool: Arc<ThreadPool>,
    in_flight: Option<CascadeHandle>,
    last_outcome: Option<CascadeOutcome>,
    clock: GenerationClock,
    generation: u64,
    publish_cursor: usize,
    phase: Phase,
    config: EngineConfig,
}

impl GenerationController {
    pub fn builder(config: EngineConfig) -> ControllerBuilder {
        ControllerBuilder {
            config,
            states: None,
            alive: None,
            observer: None,
        }
    }

    /// Random initial state per `config.probability` and `config.seed`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::builder(config).build()
    }

    fn launch(&mut self) {
        let engine = Arc::clone(&self.engine);
        let pool = Arc::clone(&self.pool);
        self.in_flight = Some(cascade::launch(engine, pool, self.clock.next_transition()));
        self.phase = Phase::Stepping;
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.phase == Phase::Failed {
            return Err(EngineError::Halted);
        }
        Ok(())
    }

    /// Block until the in-flight cascade (if any) has finished.
    pub fn wait(&mut self) -> Result<(), EngineError> {
        self.ensure_running()?;
        if let Some(handle) = self.in_flight.take() {
            match handle.wait() {
                Ok(outcome) => {
                    self.last_outcome = Some(outcome);
                    self.phase = Phase::Idle;
                }
                Err(err) => {
                    self.phase = Phase::Failed;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Non-blocking: true once the next generation is fully computed.
    pub fn poll(&mut self) -> Result<bool, EngineError> {
        self.ensure_running()?;
        let finished = match self.in_flight.as_mut() {
            None => return Ok(true),
            Some(handle) => handle.is_finished(),
        };
        if finished {
            self.wait()?;
        }
        Ok(finished)
    }

    /// Commit the computed generation and start computing the one after it.
    ///
    /// The clock moves one period past its previous transition time.
    pub fn step_complete(&mut self) -> Result<u64, EngineError> {
        let now = self.clock.next_transition();
        self.step_complete_at(now)
    }

    /// As [`step_complete`](Self::step_complete), with the next transition
    /// scheduled one period after the caller's `now`.
    pub fn step_complete_at(&mut self, now: f64) -> Result<u64, EngineError> {
        self.wait()?;

        self.phase = Phase::Committing;
        let pool = &self.pool;
        let engine = Arc::get_mut(&mut self.engine).ok_or(EngineError::StateBusy)?;
        pool.install(|| engine.commit());

        self.generation += 1;
        self.clock.advance_from(now);
        self.publish_cursor = 0;

        if let Some(outcome) = &self.last_outcome {
            debug!(
                "generation {} committed: {} evaluated, {} skipped, {} flipped",
                self.generation,
                outcome.report.evaluated,
                outcome.report.skipped,
                outcome.report.flipped
            );
        }

        self.launch();
        Ok(self.generation)
    }

    /// Block until `partition` of the in-flight cascade has completed.
    fn wait_for_partition(&mut self, partition: usize) -> Result<(), EngineError> {
        self.ensure_running()?;
        if let Some(handle) = self.in_flight.as_mut() {
            if let Err(err) = handle.wait_for_partition(partition) {
                self.in_flight = None;
                self.phase = Phase::Failed;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Partitions of the in-flight generation computed so far, without
    /// blocking. Equals the partition count once the cascade has finished.
    pub fn completed_partitions(&mut self) -> usize {
        match self.in_flight.as_mut() {
            Some(handle) => handle.completed_partitions(),
            None => self.engine.partitions().len(),
        }
    }

    /// One pacing signal: publish the next partition, or once all are
    /// published, complete the step.
    ///
    /// A partition is only handed out for publishing once the in-flight
    /// cascade has completed it, so every observer event for its cells has
    /// already been delivered. Later partitions may still be computing.
    pub fn tick(&mut self) -> Result<Tick, EngineError> {
        self.ensure_running()?;
        if self.publish_cursor < self.engine.partitions().len() {
            let partition = self.publish_cursor;
            self.wait_for_partition(partition)?;
            self.publish_cursor += 1;
            return Ok(Tick::Publish { partition });
        }
        let generation = self.step_complete()?;
        Ok(Tick::StepCompleted { generation })
    }

    /// Committed state of a cell. Panics if `cell` is off the grid.
    #[inline]
    pub fn current_state(&self, cell: CellId) -> bool {
        self.engine.states().current(cell)
    }

    /// Committed state of a cell, or `None` if `cell` is off the grid.
    pub fn cell_state(&self, cell: CellId) -> Option<bool> {
        self.engine.states().current_cells().get(cell).copied()
    }

    /// Whether the last commit changed this cell.
    #[inline]
    pub fn did_change_this_commit(&self, cell: CellId) -> bool {
        self.engine.states().changed_last_step(cell)
    }

    /// State the in-flight generation computed for `cell`. Only settled once
    /// [`wait`](Self::wait) or [`poll`](Self::poll) reported completion.
    #[inline]
    pub fn next_state(&self, cell: CellId) -> bool {
        self.engine.states().next(cell)
    }

    pub fn current_cells(&self) -> &[bool] {
        self.engine.states().current_cells()
    }

    pub fn alive_count(&self) -> usize {
        self.on_pool(|engine| engine.states().alive_count())
    }

    /// Run `op` on the controller's worker pool, so nested parallel
    /// iterators respect the configured thread count.
    fn on_pool<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce(&Engine) -> R + Send,
    {
        let engine = &*self.engine;
        self.pool.install(|| op(engine))
    }

    /// Cell states as seen by the running cascade. Only meaningful once
    /// [`wait`](Self::wait) or [`poll`](Self::poll) reported completion.
    pub fn states(&self) -> &CellStates {
        self.engine.states()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn next_transition_time(&self) -> f64 {
        self.clock.next_transition()
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Partitions published so far this generation.
    #[inline]
    pub fn publish_cursor(&self) -> usize {
        self.publish_cursor
    }

    /// Report of the most recently completed cascade.
    pub fn last_outcome(&self) -> Option<&CascadeOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn topology(&self) -> &GridTopology {
        self.engine.topology()
    }

    pub fn rules(&self) -> &RuleSet {
        self.engine.rules()
    }

    pub fn partitions(&self) -> &[Partition] {
        self.engine.partitions()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for GenerationController {
    fn drop(&mut self) {
        // Generations are never cancelled; let the in-flight one finish.
        if let Some(handle) = self.in_flight.take() {
            let _ = handle.wait();
        }
    }
}
