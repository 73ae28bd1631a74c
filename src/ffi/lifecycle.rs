//! Controller creation and destruction.

use std::ffi::{c_char, c_void, CStr};
use std::sync::Arc;

use log::error;

use crate::automaton::{CellId, GenerationController, TransitionObserver};
use crate::config::EngineConfig;
use crate::error::ConfigError;

/// Called once per cell per generation, from worker threads.
pub type TransitionCallback =
    extern "C" fn(user_data: *mut c_void, cell: u64, old_state: u8, new_state: u8, time: f64);

struct ForeignObserver {
    callback: TransitionCallback,
    user_data: *mut c_void,
}

// The host promises `user_data` may be used from any thread; see `ca_create`.
unsafe impl Send for ForeignObserver {}
unsafe impl Sync for ForeignObserver {}

impl TransitionObserver for ForeignObserver {
    fn on_transition(&self, cell: CellId, old: bool, new: bool, time: f64) {
        (self.callback)(self.user_data, cell as u64, old as u8, new as u8, time);
    }
}

fn extent(name: &'static str, value: i32) -> Result<usize, ConfigError> {
    match usize::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConfigError::ZeroDimension { name }),
    }
}

unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn build(
    config: EngineConfig,
    callback: Option<TransitionCallback>,
    user_data: *mut c_void,
) -> *mut GenerationController {
    let mut builder = GenerationController::builder(config);
    if let Some(callback) = callback {
        builder = builder.observer(Arc::new(ForeignObserver {
            callback,
            user_data,
        }));
    }

    match builder.build() {
        Ok(ctrl) => Box::into_raw(Box::new(ctrl)),
        Err(err) => {
            error!("ca_create failed: {err}");
            std::ptr::null_mut()
        }
    }
}

/// Creates a controller and runs its first generation synchronously.
///
/// # Safety
/// - `birth` and `survive` must be null or valid NUL-terminated strings
/// - `callback`, if given, must be safe to call concurrently from several
///   threads with `user_data` until `ca_destroy()` returns
///
/// # Returns
/// A controller pointer, or null on invalid configuration.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn ca_create(
    x_clusters: i32,
    z_clusters: i32,
    cells_per_cluster_x: i32,
    cells_per_cluster_z: i32,
    divisions: i32,
    probability: f32,
    birth: *const c_char,
    survive: *const c_char,
    step_period: f32,
    seed: u64,
    num_threads: u8,
    callback: Option<TransitionCallback>,
    user_data: *mut c_void,
) -> *mut GenerationController {
    let (Some(birth), Some(survive)) = (c_str(birth), c_str(survive)) else {
        error!("ca_create: rule strings must be valid UTF-8");
        return std::ptr::null_mut();
    };

    let config = (|| -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig {
            x_clusters: extent("x_clusters", x_clusters)?,
            z_clusters: extent("z_clusters", z_clusters)?,
            cells_per_cluster_x: extent("cells_per_cluster_x", cells_per_cluster_x)?,
            cells_per_cluster_z: extent("cells_per_cluster_z", cells_per_cluster_z)?,
            divisions: usize::try_from(divisions)
                .ok()
                .filter(|&d| d > 0)
                .ok_or(ConfigError::InvalidDivisions(divisions as i64))?,
            probability: probability as f64,
            birth: birth.to_string(),
            survive: survive.to_string(),
            step_period: step_period as f64,
            seed,
            num_threads: num_threads as usize,
            ..EngineConfig::default()
        })
    })();

    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!("ca_create failed: {err}");
            return std::ptr::null_mut();
        }
    };
    build(config, callback, user_data)
}

/// Creates a controller from a JSON configuration document.
///
/// # Safety
/// Same requirements as `ca_create()`; `json` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ca_create_from_json(
    json: *const c_char,
    callback: Option<TransitionCallback>,
    user_data: *mut c_void,
) -> *mut GenerationController {
    let Some(json) = c_str(json) else {
        return std::ptr::null_mut();
    };
    match EngineConfig::from_json(json) {
        Ok(config) => build(config, callback, user_data),
        Err(err) => {
            error!("ca_create_from_json failed: {err}");
            std::ptr::null_mut()
        }
    }
}

/// Destroys a controller, waiting for any in-flight generation.
///
/// # Safety
/// - `ctrl` must be null or a pointer returned by `ca_create*()`
/// - `ctrl` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn ca_destroy(ctrl: *mut GenerationController) {
    if !ctrl.is_null() {
        drop(Box::from_raw(ctrl));
    }
}
