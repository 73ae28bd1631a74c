//! Toroidal grid topology: cell coordinates, clusters and Moore neighborhoods.

use rayon::prelude::*;

use crate::config::GridDims;
use crate::error::ConfigError;

/// Linear cell index, `z * x_cells + x`.
pub type CellId = usize;

/// Linear cluster index, `cluster_z * x_clusters + cluster_x`.
pub type ClusterId = usize;

/// Moore neighborhood size.
pub const NEIGHBORS: usize = 8;

/// Immutable grid layout plus the precomputed neighbor table.
pub struct GridTopology {
    dims: GridDims,
    x_cells: usize,
    z_cells: usize,
    neighbors: Vec<[CellId; NEIGHBORS]>,
}

/// The 8 toroidal neighbors of `cell` on an `x_cells` by `z_cells` grid.
///
/// Order: row below (left, center, right), same row (left, right),
/// row above (left, center, right).
pub fn toroidal_neighbors(x_cells: usize, z_cells: usize, cell: CellId) -> [CellId; NEIGHBORS] {
    let x = cell % x_cells;
    let z = cell / x_cells;

    let z_up = (z + 1) % z_cells;
    let z_down = (z + z_cells - 1) % z_cells;
    let x_up = (x + 1) % x_cells;
    let x_down = (x + x_cells - 1) % x_cells;

    [
        x_down + x_cells * z_down,
        x + x_cells * z_down,
        x_up + x_cells * z_down,
        x_down + x_cells * z,
        x_up + x_cells * z,
        x_down + x_cells * z_up,
        x + x_cells * z_up,
        x_up + x_cells * z_up,
    ]
}

impl GridTopology {
    /// Validate the extents and build the neighbor table in parallel.
    pub fn new(dims: GridDims) -> Result<Self, ConfigError> {
        dims.validate()?;

        let x_cells = dims.x_cells();
        let z_cells = dims.z_cells();
        let neighbors = (0..dims.num_cells())
            .into_par_iter()
            .map(|cell| toroidal_neighbors(x_cells, z_cells, cell))
            .collect();

        Ok(GridTopology {
            dims,
            x_cells,
            z_cells,
            neighbors,
        })
    }

    #[inline]
    pub fn dims(&self) -> &GridDims {
        &self.dims
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.neighbors.len()
    }

    #[inline]
    pub fn num_clusters(&self) -> usize {
        self.dims.num_clusters()
    }

    #[inline]
    pub fn x_cells(&self) -> usize {
        self.x_cells
    }

    #[inline]
    pub fn z_cells(&self) -> usize {
        self.z_cells
    }

    /// Grid coordinate `(x, z)` of a cell.
    #[inline]
    pub fn cell_coords(&self, cell: CellId) -> (usize, usize) {
        (cell % self.x_cells, cell / self.x_cells)
    }

    /// Cell at `(x, z)`, wrapping both coordinates around the torus.
    #[inline]
    pub fn cell_at(&self, x: usize, z: usize) -> CellId {
        (z % self.z_cells) * self.x_cells + (x % self.x_cells)
    }

    /// Cluster grid coordinate `(cluster_x, cluster_z)`.
    #[inline]
    pub fn cluster_coords(&self, cluster: ClusterId) -> (usize, usize) {
        (
            cluster % self.dims.x_clusters,
            cluster / self.dims.x_clusters,
        )
    }

    /// The cluster owning `cell` and the cell's quadrant inside it.
    pub fn cluster_of(&self, cell: CellId) -> (ClusterId, usize) {
        let (x, z) = self.cell_coords(cell);
        let cpcx = self.dims.cells_per_cluster_x;
        let cpcz = self.dims.cells_per_cluster_z;

        let cluster = (z / cpcz) * self.dims.x_clusters + x / cpcx;
        let quadrant = (z % cpcz) * cpcx + x % cpcx;
        (cluster, quadrant)
    }

    /// Inverse of [`cluster_of`](Self::cluster_of).
    pub fn cell_of_cluster(&self, cluster: ClusterId, quadrant: usize) -> CellId {
        let (cluster_x, cluster_z) = self.cluster_coords(cluster);
        let cpcx = self.dims.cells_per_cluster_x;
        let cpcz = self.dims.cells_per_cluster_z;

        let local_x = quadrant % cpcx;
        let local_z = quadrant / cpcx;
        (cluster_z * cpcz + local_z) * self.x_cells + cluster_x * cpcx + local_x
    }

    /// Member cells of a cluster in quadrant order.
    pub fn cells_of_cluster(&self, cluster: ClusterId) -> impl Iterator<Item = CellId> + '_ {
        (0..self.dims.cells_per_cluster()).map(move |quadrant| self.cell_of_cluster(cluster, quadrant))
    }

    #[inline]
    pub fn neighbors(&self, cell: CellId) -> &[CellId; NEIGHBORS] {
        &self.neighbors[cell]
    }
}
