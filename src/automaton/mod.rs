//! Core automaton logic: topology, rules, stepping and scheduling.
//!
//! This module contains the simulation itself. The FFI layer in `ffi/` calls
//! into the controller defined here.

pub mod cascade;
pub mod engine;
pub mod grid;
pub mod incremental;
pub mod partition;
pub mod rules;
pub mod stepping;

pub use cascade::{CascadeHandle, CascadeOutcome, PartitionTiming};
pub use engine::Engine;
pub use grid::{toroidal_neighbors, CellId, ClusterId, GridTopology, NEIGHBORS};
pub use incremental::{ControllerBuilder, GenerationClock, GenerationController, Phase, Tick};
pub use partition::{build_partitions, Partition};
pub use rules::{parse_counts, CountTable, RuleSet};
pub use stepping::{alive_neighbors, CellOutcome, SkipPolicy, StepPass, StepReport, TransitionObserver};
