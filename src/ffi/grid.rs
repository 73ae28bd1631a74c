//! Cell and cluster queries.

use crate::automaton::GenerationController;

/// Total number of cells.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
#[no_mangle]
pub unsafe extern "C" fn ca_num_cells(ctrl: *const GenerationController) -> u64 {
    if ctrl.is_null() {
        return 0;
    }
    (*ctrl).topology().num_cells() as u64
}

/// Total number of clusters.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
#[no_mangle]
pub unsafe extern "C" fn ca_num_clusters(ctrl: *const GenerationController) -> u64 {
    if ctrl.is_null() {
        return 0;
    }
    (*ctrl).topology().num_clusters() as u64
}

/// Gets the committed state of a cell (0 = dead, 1 = alive).
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
///
/// # Returns
/// 0 if out of range or null pointer.
#[no_mangle]
pub unsafe extern "C" fn ca_get_cell(ctrl: *const GenerationController, cell: u64) -> u8 {
    if ctrl.is_null() {
        return 0;
    }
    let Ok(cell) = usize::try_from(cell) else {
        return 0;
    };
    (*ctrl).cell_state(cell).unwrap_or(false) as u8
}

/// Whether the last commit flipped this cell (1) or not (0).
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
#[no_mangle]
pub unsafe extern "C" fn ca_did_change(ctrl: *const GenerationController, cell: u64) -> u8 {
    if ctrl.is_null() {
        return 0;
    }
    let ctrl = &*ctrl;
    match usize::try_from(cell) {
        Ok(cell) if cell < ctrl.topology().num_cells() => ctrl.did_change_this_commit(cell) as u8,
        _ => 0,
    }
}

/// Cell ID at grid coordinate `(x, z)`, wrapping around the torus.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
#[no_mangle]
pub unsafe extern "C" fn ca_cell_at(ctrl: *const GenerationController, x: u64, z: u64) -> u64 {
    if ctrl.is_null() {
        return 0;
    }
    let topology = (*ctrl).topology();
    // Wrap in u64 first; both remainders then fit in usize.
    let x = x % topology.x_cells() as u64;
    let z = z % topology.z_cells() as u64;
    topology.cell_at(x as usize, z as usize) as u64
}

/// Writes the member cell IDs of `cluster` into `out_buf`, in quadrant order.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
/// - `out_buf` must point to at least `len` writable `u64`s
///
/// # Returns
/// Number of IDs written, or 0 if the cluster is out of range or the buffer
/// is too small.
#[no_mangle]
pub unsafe extern "C" fn ca_cluster_cells(
    ctrl: *const GenerationController,
    cluster: u64,
    out_buf: *mut u64,
    len: u64,
) -> u64 {
    if ctrl.is_null() || out_buf.is_null() {
        return 0;
    }
    let topology = (*ctrl).topology();
    let needed = topology.dims().cells_per_cluster();
    let Ok(cluster) = usize::try_from(cluster) else {
        return 0;
    };
    if cluster >= topology.num_clusters() || len < needed as u64 {
        return 0;
    }

    let out = std::slice::from_raw_parts_mut(out_buf, needed);
    for (slot, cell) in out.iter_mut().zip(topology.cells_of_cluster(cluster)) {
        *slot = cell as u64;
    }
    needed as u64
}

/// Number of live cells in the committed generation.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
#[no_mangle]
pub unsafe extern "C" fn ca_alive_count(ctrl: *const GenerationController) -> u64 {
    if ctrl.is_null() {
        return 0;
    }
    (*ctrl).alive_count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::{ca_destroy, create_test_controller};
    use std::ptr;

    #[test]
    fn test_null_handling() {
        unsafe {
            assert_eq!(ca_num_cells(ptr::null()), 0);
            assert_eq!(ca_get_cell(ptr::null(), 0), 0);
            assert_eq!(ca_did_change(ptr::null(), 0), 0);
            assert_eq!(ca_alive_count(ptr::null()), 0);
            let mut buf = [0u64; 4];
            assert_eq!(ca_cluster_cells(ptr::null(), 0, buf.as_mut_ptr(), 4), 0);
        }
    }

    #[test]
    fn test_queries_match_controller() {
        unsafe {
            let ctrl = create_test_controller(2);
            assert_eq!(ca_num_cells(ctrl), 16);
            assert_eq!(ca_num_clusters(ctrl), 4);

            let mut alive = 0;
            for cell in 0..16 {
                let state = ca_get_cell(ctrl, cell);
                assert_eq!(state != 0, (*ctrl).current_state(cell as usize));
                alive += state as u64;
            }
            assert_eq!(ca_alive_count(ctrl), alive);

            // Out of range reads as dead/unchanged.
            assert_eq!(ca_get_cell(ctrl, 16), 0);
            assert_eq!(ca_did_change(ctrl, 99), 0);
            assert_eq!(ca_get_cell(ctrl, u64::MAX), 0);
            assert_eq!(ca_did_change(ctrl, u64::MAX), 0);
            assert_eq!(ca_get_cell(ctrl, (1 << 32) + 1), 0);

            assert_eq!(ca_cell_at(ctrl, 5, 0), 1);
            assert_eq!(ca_cell_at(ctrl, u64::MAX, 1), 7);
            ca_destroy(ctrl);
        }
    }

    #[test]
    fn test_cluster_cells() {
        unsafe {
            let ctrl = create_test_controller(2);
            let mut buf = [0u64; 4];
            assert_eq!(ca_cluster_cells(ctrl, 3, buf.as_mut_ptr(), 4), 4);
            assert_eq!(buf, [10, 11, 14, 15]);

            let mut small = [0u64; 3];
            assert_eq!(ca_cluster_cells(ctrl, 0, small.as_mut_ptr(), 3), 0);
            assert_eq!(ca_cluster_cells(ctrl, 4, buf.as_mut_ptr(), 4), 0);
            assert_eq!(ca_cluster_cells(ctrl, (1 << 32) + 3, buf.as_mut_ptr(), 4), 0);
            ca_destroy(ctrl);
        }
    }
}
