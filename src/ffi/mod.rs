//! C FFI layer for host renderers.
//!
//! This module exports C ABI functions for a rendering host (game engine,
//! LuaJIT, ...). All functions are marked with `#[no_mangle]` and use
//! `extern "C"`.
//!
//! The actual logic is in the `automaton` module. These functions are thin wrappers
//! that handle null checks, pointer safety, and C-to-Rust conversions.

pub mod grid;
pub mod incremental;
pub mod lifecycle;

pub use grid::{
    ca_alive_count, ca_cell_at, ca_cluster_cells, ca_did_change, ca_get_cell, ca_num_cells,
    ca_num_clusters,
};
pub use incremental::{
    ca_generation, ca_next_transition_time, ca_num_partitions, ca_partition_cells, ca_poll,
    ca_step_complete, ca_tick, ca_wait,
};
pub use lifecycle::{ca_create, ca_create_from_json, ca_destroy, TransitionCallback};

/// 4x4 cells in 2x2 clusters, B3/S23, seeded.
#[cfg(test)]
pub(crate) unsafe fn create_test_controller(
    divisions: i32,
) -> *mut crate::automaton::GenerationController {
    ca_create(
        2,
        2,
        2,
        2,
        divisions,
        0.5,
        c"3".as_ptr(),
        c"23".as_ptr(),
        0.1,
        9,
        2,
        None,
        std::ptr::null_mut(),
    )
}
