//! Cluster-aligned partitions, one per scheduling unit.

use std::ops::Range;

use super::grid::{CellId, ClusterId, GridTopology};
use crate::config::MAX_DIVISIONS;
use crate::error::ConfigError;

/// A contiguous run of whole clusters and their cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    index: usize,
    clusters: Range<ClusterId>,
    cells: Vec<CellId>,
}

impl Partition {
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn clusters(&self) -> Range<ClusterId> {
        self.clusters.clone()
    }

    /// Member cells, cluster by cluster in quadrant order.
    #[inline]
    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Clusters assigned to each partition; the last ones may get fewer.
pub fn clusters_per_partition(num_clusters: usize, divisions: usize) -> usize {
    num_clusters.div_ceil(divisions)
}

/// Split the grid into `divisions` partitions of contiguous clusters.
///
/// Trailing partitions are short, or empty when `divisions` does not divide
/// the cluster count evenly enough.
pub fn build_partitions(
    topology: &GridTopology,
    divisions: usize,
) -> Result<Vec<Partition>, ConfigError> {
    if divisions == 0 {
        return Err(ConfigError::InvalidDivisions(0));
    }
    if divisions > MAX_DIVISIONS {
        return Err(ConfigError::TooManyDivisions {
            divisions,
            max: MAX_DIVISIONS,
        });
    }

    let num_clusters = topology.num_clusters();
    let per = clusters_per_partition(num_clusters, divisions);
    let cells_per_cluster = topology.dims().cells_per_cluster();

    let partitions = (0..divisions)
        .map(|index| {
            let first = (index * per).min(num_clusters);
            let end = (first + per).min(num_clusters);

            let mut cells = Vec::with_capacity((end - first) * cells_per_cluster);
            for cluster in first..end {
                cells.extend(topology.cells_of_cluster(cluster));
            }

            Partition {
                index,
                clusters: first..end,
                cells,
            }
        })
        .collect();

    Ok(partitions)
}
