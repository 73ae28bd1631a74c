//! Engine configuration.
//!
//! Everything here is fixed once a controller is built. `step_period` only
//! feeds the generation clock handed to transition observers; the automaton
//! itself never looks at wall-clock time.

use std::mem;

use serde::{Deserialize, Serialize};

use crate::automaton::grid::{CellId, NEIGHBORS};
use crate::automaton::stepping::SkipPolicy;
use crate::error::ConfigError;

/// Upper bound on scheduling partitions per generation.
pub const MAX_DIVISIONS: usize = 1 << 16;

/// Cluster-grid extent and per-cluster cell extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub x_clusters: usize,
    pub z_clusters: usize,
    pub cells_per_cluster_x: usize,
    pub cells_per_cluster_z: usize,
}

impl GridDims {
    /// Reject zero extents and grids whose cell count or neighbor table
    /// cannot be addressed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("x_clusters", self.x_clusters),
            ("z_clusters", self.z_clusters),
            ("cells_per_cluster_x", self.cells_per_cluster_x),
            ("cells_per_cluster_z", self.cells_per_cluster_z),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDimension { name });
            }
        }

        let too_large = || ConfigError::GridTooLarge {
            x_cells: self.x_clusters.saturating_mul(self.cells_per_cluster_x),
            z_cells: self.z_clusters.saturating_mul(self.cells_per_cluster_z),
        };
        let x_cells = self
            .x_clusters
            .checked_mul(self.cells_per_cluster_x)
            .ok_or_else(too_large)?;
        let z_cells = self
            .z_clusters
            .checked_mul(self.cells_per_cluster_z)
            .ok_or_else(too_large)?;
        let num_cells = x_cells.checked_mul(z_cells).ok_or_else(too_large)?;

        let table_bytes = num_cells
            .checked_mul(mem::size_of::<[CellId; NEIGHBORS]>())
            .ok_or_else(too_large)?;
        if table_bytes > isize::MAX as usize {
            return Err(too_large());
        }
        Ok(())
    }

    #[inline]
    pub fn num_clusters(&self) -> usize {
        self.x_clusters * self.z_clusters
    }

    #[inline]
    pub fn cells_per_cluster(&self) -> usize {
        self.cells_per_cluster_x * self.cells_per_cluster_z
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.num_clusters() * self.cells_per_cluster()
    }

    /// Width of the full cell grid.
    #[inline]
    pub fn x_cells(&self) -> usize {
        self.x_clusters * self.cells_per_cluster_x
    }

    /// Depth of the full cell grid.
    #[inline]
    pub fn z_cells(&self) -> usize {
        self.z_clusters * self.cells_per_cluster_z
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Horizontal extent of the cluster grid.
    pub x_clusters: usize,
    /// Vertical extent of the cluster grid.
    pub z_clusters: usize,
    pub cells_per_cluster_x: usize,
    pub cells_per_cluster_z: usize,
    /// Number of scheduling partitions per generation.
    pub divisions: usize,
    /// Chance that a cell starts alive when no initial state is supplied.
    pub probability: f64,
    /// Birth neighbor counts as a digit string. Non-digits are ignored.
    pub birth: String,
    /// Survival neighbor counts as a digit string. Non-digits are ignored.
    pub survive: String,
    /// Seconds between externally paced generations.
    pub step_period: f64,
    /// Seed for the random initial state.
    pub seed: u64,
    /// Worker threads for the cascade pool (0 = 1).
    pub num_threads: usize,
    pub skip_policy: SkipPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            x_clusters: 300,
            z_clusters: 300,
            cells_per_cluster_x: 2,
            cells_per_cluster_z: 2,
            divisions: 2,
            probability: 0.4,
            birth: "3".to_string(),
            survive: "23".to_string(),
            step_period: 0.01,
            seed: 0,
            num_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            skip_policy: SkipPolicy::SkipStable,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn dims(&self) -> GridDims {
        GridDims {
            x_clusters: self.x_clusters,
            z_clusters: self.z_clusters,
            cells_per_cluster_x: self.cells_per_cluster_x,
            cells_per_cluster_z: self.cells_per_cluster_z,
        }
    }

    /// Check every scalar field. Rule strings are checked when parsed.
    pub fn validate(&self) -> Result<GridDims, ConfigError> {
        let dims = self.dims();
        dims.validate()?;

        if self.divisions == 0 {
            return Err(ConfigError::InvalidDivisions(0));
        }
        if self.divisions > MAX_DIVISIONS {
            return Err(ConfigError::TooManyDivisions {
                divisions: self.divisions,
                max: MAX_DIVISIONS,
            });
        }
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigError::InvalidProbability(self.probability));
        }
        if !self.step_period.is_finite() || self.step_period < 0.0 {
            return Err(ConfigError::InvalidStepPeriod(self.step_period));
        }

        Ok(dims)
    }

    /// Worker count with the zero case mapped to a single thread.
    pub fn worker_threads(&self) -> usize {
        if self.num_threads == 0 {
            1
        } else {
            self.num_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> EngineConfig {
        EngineConfig {
            x_clusters: 4,
            z_clusters: 4,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_default_is_valid() {
        let dims = EngineConfig::default().validate().unwrap();
        assert_eq!(dims.num_clusters(), 90_000);
        assert_eq!(dims.num_cells(), 360_000);
        assert_eq!(dims.x_cells(), 600);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let config = EngineConfig {
            cells_per_cluster_z: 0,
            ..small()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDimension {
                name: "cells_per_cluster_z"
            })
        ));
    }

    #[test]
    fn test_zero_divisions_rejected() {
        let config = EngineConfig {
            divisions: 0,
            ..small()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDivisions(0))
        ));
    }

    #[test]
    fn test_probability_range() {
        for bad in [-0.1, 1.5, f64::NAN] {
            let config = EngineConfig {
                probability: bad,
                ..small()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidProbability(_))
            ));
        }
        let config = EngineConfig {
            probability: 1.0,
            ..small()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_step_period_rejected() {
        let config = EngineConfig {
            step_period: -1.0,
            ..small()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidStepPeriod(_))
        ));
    }

    #[test]
    fn test_overflowing_grid_rejected() {
        let config = EngineConfig {
            x_clusters: usize::MAX / 2,
            ..small()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GridTooLarge { .. })
        ));
    }

    #[test]
    fn test_unaddressable_neighbor_table_rejected() {
        // The cell count fits in a usize, the 8-entry neighbor table does not.
        let config = EngineConfig {
            x_clusters: 1 << 15,
            z_clusters: 1 << 15,
            cells_per_cluster_x: 1 << 15,
            cells_per_cluster_z: 1 << 15,
            ..small()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GridTooLarge { .. })
        ));
    }

    #[test]
    fn test_division_limit() {
        let config = EngineConfig {
            divisions: MAX_DIVISIONS,
            ..small()
        };
        assert!(config.validate().is_ok());

        let config = EngineConfig::from_json(r#"{ "divisions": 1000000000000 }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyDivisions {
                divisions: 1_000_000_000_000,
                max: MAX_DIVISIONS
            })
        ));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "x_clusters": 8, "z_clusters": 6, "divisions": 3, "birth": "36", "skip_policy": "evaluate_all" }"#,
        )
        .unwrap();
        assert_eq!(config.x_clusters, 8);
        assert_eq!(config.z_clusters, 6);
        assert_eq!(config.divisions, 3);
        assert_eq!(config.birth, "36");
        assert_eq!(config.survive, "23");
        assert_eq!(config.cells_per_cluster_x, 2);
        assert_eq!(config.skip_policy, SkipPolicy::EvaluateAll);
    }

    #[test]
    fn test_from_json_reports_syntax_errors() {
        assert!(matches!(
            EngineConfig::from_json("{ x_clusters: }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_worker_threads_never_zero() {
        let config = EngineConfig {
            num_threads: 0,
            ..small()
        };
        assert_eq!(config.worker_threads(), 1);
    }
}
