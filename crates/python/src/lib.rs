//! Python bindings for the pyospray marshaling core
//!
//! Installed as `pyospray._native`. The pure-Python package builds its scene
//! wrappers on top of these functions.
//!
//! # Architecture
//!
//! - **api.rs**: exported functions (marshal, framebuffer codec, parameters)
//! - **marshal.rs**: scene wrapper adaptation and the `NativeBuffer` class
//! - **numpy_bridge.rs**: zero-copy numpy array views
//! - **error.rs**: core error to Python exception mapping
//!
//! # Usage (Python)
//!
//! ```python
//! import numpy as np
//! from pyospray import _native
//!
//! vertex = np.array([-1, -1, 3, 0, 1, 1, 3, 0], dtype=np.float32)
//! buffer = _native.marshal(_native.OSP_FLOAT3A, vertex)
//! assert buffer.element_count == 2
//! ```

#![warn(clippy::all)]

mod api;
mod error;
mod marshal;
mod numpy_bridge;

use pyo3::prelude::*;

use pyospray_core::device::{DataFlags, FrameChannels};
use pyospray_core::TypeTag;

/// Python module for pyospray native marshaling
///
/// Installed as pyospray._native
#[pymodule]
#[pyo3(name = "_native")]
fn pyospray_ffi(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let config = api::load_config()?;

    // Initialize tracing on module load
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .try_init();

    m.add_class::<marshal::PyNativeBuffer>()?;

    m.add_function(wrap_pyfunction!(api::marshal, m)?)?;
    m.add_function(wrap_pyfunction!(api::resolve_handles, m)?)?;
    m.add_function(wrap_pyfunction!(api::framebuffer_to_bytes, m)?)?;
    m.add_function(wrap_pyfunction!(api::framebuffer_to_file, m)?)?;
    m.add_function(wrap_pyfunction!(api::normalize_param_name, m)?)?;
    m.add_function(wrap_pyfunction!(api::param_setter, m)?)?;
    m.add_function(wrap_pyfunction!(api::param_accepts, m)?)?;
    m.add_function(wrap_pyfunction!(api::load_builtin_data, m)?)?;
    m.add_function(wrap_pyfunction!(api::get_version, m)?)?;

    // OSPDataType codes
    for tag in TypeTag::all() {
        m.add(tag.name(), tag.code())?;
    }

    m.add("OSP_DATA_SHARED_BUFFER", DataFlags::SHARED_BUFFER.bits())?;
    m.add("OSP_FB_COLOR", FrameChannels::COLOR.bits())?;
    m.add("OSP_FB_DEPTH", FrameChannels::DEPTH.bits())?;
    m.add("OSP_FB_ACCUM", FrameChannels::ACCUM.bits())?;
    m.add("OSP_FB_VARIANCE", FrameChannels::VARIANCE.bits())?;

    m.add("HANDLE_ATTR", marshal::HANDLE_ATTR)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    tracing::debug!(default_format = ?config.default_format, "pyospray._native loaded");
    Ok(())
}
