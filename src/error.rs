//! Error types for configuration and generation stepping.

use std::fmt;

use thiserror::Error;

/// Which of the two neighbor-count sets a rule digit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Birth,
    Survive,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Birth => f.write_str("birth"),
            RuleKind::Survive => f.write_str("survive"),
        }
    }
}

/// Invalid engine configuration. Always fatal at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A rule digit names a neighbor count an 8-neighbor cell can never have.
    #[error("{kind} rule digit {digit} is outside the neighbor-count range 0..=8")]
    NeighborCountOutOfRange { kind: RuleKind, digit: u32 },

    /// Rule notation could not be split into birth and survival parts.
    #[error("invalid rule notation `{0}`: expected B<digits>/S<digits>")]
    InvalidNotation(String),

    /// A grid extent was zero.
    #[error("grid dimension `{name}` must be non-zero")]
    ZeroDimension { name: &'static str },

    /// The cell count, or the per-cell neighbor table, does not fit in the
    /// address space.
    #[error("grid of {x_cells}x{z_cells} cells is too large")]
    GridTooLarge { x_cells: usize, z_cells: usize },

    /// No valid partitioning exists.
    #[error("divisions must be at least 1, got {0}")]
    InvalidDivisions(i64),

    #[error("at most {max} divisions are supported, got {divisions}")]
    TooManyDivisions { divisions: usize, max: usize },

    #[error("initial alive probability must lie in [0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("step period must be finite and non-negative, got {0}")]
    InvalidStepPeriod(f64),

    /// Seeded cell states do not match the grid.
    #[error("expected state for {expected} cells, got {actual}")]
    StateSizeMismatch { expected: usize, actual: usize },

    /// A seeded live cell does not exist on the grid.
    #[error("cell {cell} is outside a grid of {num_cells} cells")]
    CellOutOfRange { cell: usize, num_cells: usize },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while driving generations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A partition job panicked. The generation cannot be committed.
    #[error("partition {partition} failed before completing its generation")]
    PartitionFailed { partition: usize },

    /// The cascade dropped its completion channel without signalling.
    #[error("cascade disconnected before signalling completion")]
    CascadeDisconnected,

    /// Commit was attempted while a cascade still holds the engine.
    #[error("cell states are still shared with an in-flight cascade")]
    StateBusy,

    /// A previous generation failed; the controller accepts no further steps.
    #[error("controller halted after a failed generation")]
    Halted,
}
