//! FFI interface for generation stepping and pacing.

use log::error;

use crate::automaton::{GenerationController, Tick};

/// Commits the computed generation and starts the next one in the background.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
///
/// # Returns
/// The new generation number, or -1 on null pointer or failed generation.
#[no_mangle]
pub unsafe extern "C" fn ca_step_complete(ctrl: *mut GenerationController) -> i64 {
    if ctrl.is_null() {
        return -1;
    }
    match (*ctrl).step_complete() {
        Ok(generation) => generation as i64,
        Err(err) => {
            error!("ca_step_complete: {err}");
            -1
        }
    }
}

/// Pacing tick: publish the next partition, or complete the step.
///
/// Blocks until the partition being handed out has been computed, so all of
/// its transition callbacks have run.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
/// - `out_value` must be null or point to a writable `u64`
///
/// # Returns
/// 0 if a partition should be published (its index is written to
/// `out_value`), 1 if a generation was committed (its number is written to
/// `out_value`), -1 on error.
#[no_mangle]
pub unsafe extern "C" fn ca_tick(ctrl: *mut GenerationController, out_value: *mut u64) -> i32 {
    if ctrl.is_null() {
        return -1;
    }
    let (status, value) = match (*ctrl).tick() {
        Ok(Tick::Publish { partition }) => (0, partition as u64),
        Ok(Tick::StepCompleted { generation }) => (1, generation),
        Err(err) => {
            error!("ca_tick: {err}");
            return -1;
        }
    };
    if !out_value.is_null() {
        *out_value = value;
    }
    status
}

/// Query whether the next generation has been fully computed.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
///
/// # Returns
/// 1 if ready, 0 if still computing, -1 on null pointer or failure.
#[no_mangle]
pub unsafe extern "C" fn ca_poll(ctrl: *mut GenerationController) -> i32 {
    if ctrl.is_null() {
        return -1;
    }
    match (*ctrl).poll() {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(_) => -1,
    }
}

/// Block until the in-flight generation is computed.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
///
/// # Returns
/// 0 on success, -1 on null pointer or failure.
#[no_mangle]
pub unsafe extern "C" fn ca_wait(ctrl: *mut GenerationController) -> i32 {
    if ctrl.is_null() {
        return -1;
    }
    match (*ctrl).wait() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Current generation counter.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
#[no_mangle]
pub unsafe extern "C" fn ca_generation(ctrl: *const GenerationController) -> u64 {
    if ctrl.is_null() {
        return 0;
    }
    (*ctrl).generation()
}

/// Time at which the generation being computed becomes visible.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
#[no_mangle]
pub unsafe extern "C" fn ca_next_transition_time(ctrl: *const GenerationController) -> f64 {
    if ctrl.is_null() {
        return 0.0;
    }
    (*ctrl).next_transition_time()
}

/// Number of scheduling partitions.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
#[no_mangle]
pub unsafe extern "C" fn ca_num_partitions(ctrl: *const GenerationController) -> u64 {
    if ctrl.is_null() {
        return 0;
    }
    (*ctrl).partitions().len() as u64
}

/// Writes the cell IDs of `partition` into `out_buf`.
///
/// # Safety
/// - `ctrl` must be null or a valid controller pointer
/// - `out_buf` must point to at least `len` writable `u64`s
///
/// # Returns
/// Number of IDs written, or 0 if the partition is out of range or the
/// buffer is too small.
#[no_mangle]
pub unsafe extern "C" fn ca_partition_cells(
    ctrl: *const GenerationController,
    partition: u64,
    out_buf: *mut u64,
    len: u64,
) -> u64 {
    if ctrl.is_null() || out_buf.is_null() {
        return 0;
    }
    let Some(partition) = usize::try_from(partition)
        .ok()
        .and_then(|index| (*ctrl).partitions().get(index))
    else {
        return 0;
    };
    let cells = partition.cells();
    if len < cells.len() as u64 {
        return 0;
    }

    let out = std::slice::from_raw_parts_mut(out_buf, cells.len());
    for (slot, &cell) in out.iter_mut().zip(cells) {
        *slot = cell as u64;
    }
    cells.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::{ca_destroy, create_test_controller};
    use std::ptr;

    #[test]
    fn test_null_handling() {
        unsafe {
            assert_eq!(ca_step_complete(ptr::null_mut()), -1);
            assert_eq!(ca_tick(ptr::null_mut(), ptr::null_mut()), -1);
            assert_eq!(ca_poll(ptr::null_mut()), -1);
            assert_eq!(ca_wait(ptr::null_mut()), -1);
            assert_eq!(ca_generation(ptr::null()), 0);
            assert_eq!(ca_num_partitions(ptr::null()), 0);
        }
    }

    #[test]
    fn test_step_and_wait() {
        unsafe {
            let ctrl = create_test_controller(2);
            assert_eq!(ca_generation(ctrl), 0);
            assert_eq!(ca_poll(ctrl), 1);

            assert_eq!(ca_step_complete(ctrl), 1);
            assert_eq!(ca_wait(ctrl), 0);
            assert_eq!(ca_poll(ctrl), 1);
            assert_eq!(ca_generation(ctrl), 1);
            assert!((ca_next_transition_time(ctrl) - 0.1).abs() < 1e-6);

            ca_destroy(ctrl);
        }
    }

    #[test]
    fn test_tick_cycle() {
        unsafe {
            let ctrl = create_test_controller(2);
            let mut value = u64::MAX;

            assert_eq!(ca_tick(ctrl, &mut value), 0);
            assert_eq!(value, 0);
            assert_eq!(ca_tick(ctrl, &mut value), 0);
            assert_eq!(value, 1);
            assert_eq!(ca_tick(ctrl, &mut value), 1);
            assert_eq!(value, 1);
            assert_eq!(ca_tick(ctrl, ptr::null_mut()), 0);

            ca_destroy(ctrl);
        }
    }

    #[test]
    fn test_partition_cells() {
        unsafe {
            let ctrl = create_test_controller(2);
            assert_eq!(ca_num_partitions(ctrl), 2);

            let mut seen = Vec::new();
            let mut buf = [0u64; 16];
            for partition in 0..2 {
                let written = ca_partition_cells(ctrl, partition, buf.as_mut_ptr(), 16);
                assert_eq!(written, 8);
                seen.extend_from_slice(&buf[..written as usize]);
            }
            seen.sort_unstable();
            assert_eq!(seen, (0..16).collect::<Vec<u64>>());

            assert_eq!(ca_partition_cells(ctrl, 2, buf.as_mut_ptr(), 16), 0);
            assert_eq!(ca_partition_cells(ctrl, (1 << 32) + 1, buf.as_mut_ptr(), 16), 0);
            assert_eq!(ca_partition_cells(ctrl, 0, buf.as_mut_ptr(), 4), 0);
            ca_destroy(ctrl);
        }
    }
}
