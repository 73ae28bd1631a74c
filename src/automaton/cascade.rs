//! Cascading partition scheduler.
//!
//! One generation runs as a chain of jobs on a rayon pool: partition `i`'s
//! job, once its cell loop finishes, reports the partition on a channel and
//! submits partition `i + 1`. The job that wraps the cursor back to 0 signals
//! completion of the whole cascade on the same channel. Partitions
//! never overlap; parallelism lives inside each partition's cell loop.
//!
//! Exactly one job holds the engine handle at any time and passes it to its
//! successor. The final job drops it before signalling, so a caller that has
//! received the signal can take the engine back exclusively for commit.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use log::{error, trace};
use rayon::ThreadPool;

use super::engine::Engine;
use super::stepping::StepReport;
use crate::error::EngineError;

/// When one partition ran, and what it did.
#[derive(Clone, Copy, Debug)]
pub struct PartitionTiming {
    pub partition: usize,
    pub started: Instant,
    pub completed: Instant,
    pub report: StepReport,
}

/// Result of a finished cascade.
#[derive(Clone, Debug)]
pub struct CascadeOutcome {
    /// Sum over all partitions.
    pub report: StepReport,
    /// In execution order.
    pub timings: Vec<PartitionTiming>,
    /// Clock value handed to the observer for this generation.
    pub time: f64,
}

enum Signal {
    PartitionCompleted { partition: usize },
    Complete(CascadeOutcome),
    Failed { partition: usize },
}

/// Receiving end of a running cascade.
pub struct CascadeHandle {
    receiver: Receiver<Signal>,
    completed: usize,
    finished: Option<Signal>,
}

impl CascadeHandle {
    fn absorb(&mut self, signal: Signal) {
        match signal {
            Signal::PartitionCompleted { partition } => self.completed = partition + 1,
            signal => self.finished = Some(signal),
        }
    }

    /// Take every pending signal. True once the cascade has ended, or its
    /// sender is gone.
    fn drain(&mut self) -> bool {
        while self.finished.is_none() {
            match self.receiver.try_recv() {
                Ok(signal) => self.absorb(signal),
                Err(TryRecvError::Empty) => return false,
                // Surfaced as an error by `wait`.
                Err(TryRecvError::Disconnected) => return true,
            }
        }
        true
    }

    /// Non-blocking completion check.
    pub fn is_finished(&mut self) -> bool {
        self.drain()
    }

    /// Partitions of this cascade whose cell loop has finished, without
    /// blocking. Partitions complete in index order.
    pub fn completed_partitions(&mut self) -> usize {
        self.drain();
        self.completed
    }

    /// Block until `partition` has completed. Its observer events have all
    /// been delivered once this returns.
    pub fn wait_for_partition(&mut self, partition: usize) -> Result<(), EngineError> {
        while self.completed <= partition {
            match &self.finished {
                Some(Signal::Complete(_)) => break,
                Some(Signal::Failed { partition }) => {
                    return Err(EngineError::PartitionFailed {
                        partition: *partition,
                    })
                }
                _ => {}
            }
            let signal = self
                .receiver
                .recv()
                .map_err(|_| EngineError::CascadeDisconnected)?;
            self.absorb(signal);
        }
        Ok(())
    }

    /// Block until the last partition has completed.
    pub fn wait(mut self) -> Result<CascadeOutcome, EngineError> {
        loop {
            match self.finished.take() {
                Some(Signal::Complete(outcome)) => return Ok(outcome),
                Some(Signal::Failed { partition }) => {
                    return Err(EngineError::PartitionFailed { partition })
                }
                _ => {}
            }
            let signal = self
                .receiver
                .recv()
                .map_err(|_| EngineError::CascadeDisconnected)?;
            self.absorb(signal);
        }
    }
}

struct PartitionJob {
    engine: Arc<Engine>,
    pool: Arc<ThreadPool>,
    partition: usize,
    time: f64,
    timings: Vec<PartitionTiming>,
    done: Sender<Signal>,
}

impl PartitionJob {
    fn submit(self) {
        let pool = Arc::clone(&self.pool);
        pool.spawn(move || self.run());
    }

    fn run(mut self) {
        let partition = self.partition;
        trace!("partition {partition} started");
        let started = Instant::now();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.engine.step_partition(partition, self.time)
        }));

        match result {
            Ok(report) => {
                trace!(
                    "partition {partition} completed: {} evaluated, {} flipped",
                    report.evaluated,
                    report.flipped
                );
                self.timings.push(PartitionTiming {
                    partition,
                    started,
                    completed: Instant::now(),
                    report,
                });
                let _ = self.done.send(Signal::PartitionCompleted { partition });
                self.partition_completed();
            }
            Err(_) => {
                error!("partition {partition} panicked; generation abandoned");
                let PartitionJob { engine, done, .. } = self;
                drop(engine);
                let _ = done.send(Signal::Failed { partition });
            }
        }
    }

    /// Advance the cursor; submit the next partition or finish the cascade.
    fn partition_completed(mut self) {
        let next = (self.partition + 1) % self.engine.partitions().len();
        if next != 0 {
            self.partition = next;
            self.submit();
            return;
        }

        let PartitionJob {
            engine,
            time,
            timings,
            done,
            ..
        } = self;
        drop(engine);

        let report = timings
            .iter()
            .fold(StepReport::default(), |total, timing| total + timing.report);
        let _ = done.send(Signal::Complete(CascadeOutcome {
            report,
            timings,
            time,
        }));
    }
}

/// Start a cascade at partition 0 without blocking.
///
/// `engine` must be the only handle the caller gives away; it comes back to
/// the caller's `Arc` once the returned handle reports completion.
pub fn launch(engine: Arc<Engine>, pool: Arc<ThreadPool>, time: f64) -> CascadeHandle {
    let (done, receiver) = mpsc::channel();
    let partitions = engine.partitions().len();

    PartitionJob {
        engine,
        pool,
        partition: 0,
        time,
        timings: Vec::with_capacity(partitions),
        done,
    }
    .submit();

    CascadeHandle {
        receiver,
        completed: 0,
        finished: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::grid::GridTopology;
    use crate::automaton::partition::build_partitions;
    use crate::automaton::rules::RuleSet;
    use crate::automaton::stepping::{SkipPolicy, TransitionObserver};
    use crate::config::GridDims;
    use crate::state::CellStates;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn pool(threads: usize) -> Arc<ThreadPool> {
        Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap(),
        )
    }

    fn engine_with(
        divisions: usize,
        states: Option<CellStates>,
        observer: Option<Arc<dyn TransitionObserver>>,
    ) -> Engine {
        let topology = GridTopology::new(GridDims {
            x_clusters: 4,
            z_clusters: 4,
            cells_per_cluster_x: 2,
            cells_per_cluster_z: 2,
        })
        .unwrap();
        let states = match states {
            Some(states) => states,
            None => CellStates::random(topology.num_cells(), 0.4, 3).unwrap(),
        };
        let partitions = build_partitions(&topology, divisions).unwrap();
        Engine::new(
            topology,
            RuleSet::conway(),
            partitions,
            states,
            SkipPolicy::SkipStable,
            observer,
        )
    }

    fn engine(divisions: usize) -> Engine {
        engine_with(divisions, None, None)
    }

    #[test]
    fn test_cascade_runs_every_partition_in_order() {
        let mut shared = Arc::new(engine(4));
        let outcome = launch(Arc::clone(&shared), pool(4), 1.5).wait().unwrap();

        let order: Vec<usize> = outcome.timings.iter().map(|t| t.partition).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(outcome.report.cells(), 64);
        assert_eq!(outcome.time, 1.5);

        // The chain released its handle before signalling.
        assert!(Arc::get_mut(&mut shared).is_some());
    }

    #[test]
    fn test_cascade_matches_sequential_step() {
        let reference = engine(1);
        let expected = reference.step_all(0.0);
        let expected_next: Vec<bool> = (0..64).map(|c| reference.states().next(c)).collect();

        let shared = Arc::new(engine(4));
        let outcome = launch(Arc::clone(&shared), pool(2), 0.0).wait().unwrap();
        let next: Vec<bool> = (0..64).map(|c| shared.states().next(c)).collect();

        assert_eq!(outcome.report, expected);
        assert_eq!(next, expected_next);
    }

    #[test]
    fn test_handle_polls_until_finished() {
        let shared = Arc::new(engine(2));
        let mut handle = launch(shared, pool(1), 0.0);
        while !handle.is_finished() {
            std::thread::yield_now();
        }
        assert!(handle.is_finished());
        assert_eq!(handle.wait().unwrap().timings.len(), 2);
    }

    #[test]
    fn test_partitions_report_completion_in_order() {
        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);
        let observer: Arc<dyn TransitionObserver> =
            Arc::new(move |_: usize, _: bool, _: bool, _: f64| {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let shared = Arc::new(engine_with(4, Some(CellStates::dead(64)), Some(observer)));

        let mut handle = launch(shared, pool(2), 0.0);
        for partition in 0..4 {
            handle.wait_for_partition(partition).unwrap();
            assert!(handle.completed_partitions() > partition);
            // Every event of partitions 0..=partition has been delivered.
            assert!(events.load(Ordering::SeqCst) >= (partition + 1) * 16);
        }
        assert_eq!(handle.completed_partitions(), 4);
        assert_eq!(handle.wait().unwrap().timings.len(), 4);
    }

    #[test]
    fn test_wait_for_partition_after_failure() {
        let topology = GridTopology::new(GridDims {
            x_clusters: 2,
            z_clusters: 2,
            cells_per_cluster_x: 2,
            cells_per_cluster_z: 2,
        })
        .unwrap();
        let partitions = build_partitions(&topology, 2).unwrap();
        let observer: Arc<dyn TransitionObserver> =
            Arc::new(|cell: usize, _: bool, _: bool, _: f64| {
                if cell == 0 {
                    panic!("observer failure");
                }
            });
        let shared = Arc::new(Engine::new(
            topology,
            RuleSet::conway(),
            partitions,
            CellStates::dead(16),
            SkipPolicy::SkipStable,
            Some(observer),
        ));

        let mut handle = launch(shared, pool(1), 0.0);
        assert!(matches!(
            handle.wait_for_partition(1),
            Err(EngineError::PartitionFailed { partition: 0 })
        ));
        assert_eq!(handle.completed_partitions(), 0);
    }

    #[test]
    fn test_single_partition_cascade() {
        let shared = Arc::new(engine(1));
        let outcome = launch(shared, pool(1), 0.0).wait().unwrap();
        assert_eq!(outcome.timings.len(), 1);
    }

    #[test]
    fn test_panicking_partition_is_fatal() {
        let topology = GridTopology::new(GridDims {
            x_clusters: 2,
            z_clusters: 2,
            cells_per_cluster_x: 2,
            cells_per_cluster_z: 2,
        })
        .unwrap();
        let partitions = build_partitions(&topology, 2).unwrap();
        let states = CellStates::dead(topology.num_cells());
        let observer: Arc<dyn TransitionObserver> =
            Arc::new(|cell: usize, _: bool, _: bool, _: f64| {
                if cell == 15 {
                    panic!("observer failure");
                }
            });
        let shared = Arc::new(Engine::new(
            topology,
            RuleSet::conway(),
            partitions,
            states,
            SkipPolicy::SkipStable,
            Some(observer),
        ));

        let result = launch(shared, pool(1), 0.0).wait();
        // Cell 15 lives in the last cluster, which belongs to partition 1.
        assert!(matches!(
            result,
            Err(EngineError::PartitionFailed { partition: 1 })
        ));
    }
}
