//! Cluster Automata - parallel Life-like cellular automata on a toroidal grid.
//!
//! Cells are grouped into rectangular clusters, clusters into partitions, and
//! each generation is computed as a cascade of partition jobs on a worker
//! pool. Cells whose neighborhood did not change last generation are skipped.
//!
//! The library also provides a C ABI (see [`ffi`]) for host renderers.

pub mod automaton;
pub mod config;
pub mod error;
pub mod ffi;
pub mod state;

pub use automaton::{
    CellId, GenerationController, GridTopology, Partition, RuleSet, SkipPolicy, StepReport, Tick,
    TransitionObserver,
};
pub use config::{EngineConfig, GridDims};
pub use error::{ConfigError, EngineError, RuleKind};
pub use state::CellStates;
