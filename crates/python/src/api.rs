//! Functions exported to Python

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyString};

use pyospray_core::framebuffer::{self, PixelFormat, PixelRegion};
use pyospray_core::params::{normalize_name, ParamType, Setter};
use pyospray_core::{builtin, BindingConfig};

use crate::error::{map_core_error, FfiError};
use crate::marshal::{marshal_object, resolve_objects, PyNativeBuffer};
use crate::numpy_bridge::{type_name, with_pixel_bytes};

static CONFIG: OnceLock<BindingConfig> = OnceLock::new();

/// Load the binding configuration once per process
pub(crate) fn load_config() -> PyResult<&'static BindingConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let loaded = BindingConfig::from_env().map_err(map_core_error)?;
    Ok(CONFIG.get_or_init(|| loaded))
}

fn config() -> &'static BindingConfig {
    CONFIG.get_or_init(BindingConfig::default)
}

/// Format names arrive as `str` or `bytes` (`b"rgb"`)
fn parse_format(format: Option<&Bound<'_, PyAny>>) -> PyResult<PixelFormat> {
    let Some(format) = format else {
        return Ok(config().default_format);
    };
    let name = if format.is_instance_of::<PyString>() {
        format.extract::<String>()?
    } else if let Ok(b) = format.downcast::<PyBytes>() {
        String::from_utf8_lossy(b.as_bytes()).into_owned()
    } else {
        return Err(FfiError::WrongType(format!(
            "format must be str or bytes, got {}",
            type_name(format)
        ))
        .into());
    };
    name.parse().map_err(map_core_error)
}

/// Marshal a numpy array (numeric kinds) or a sequence of scene objects
/// (handle kinds) into a native buffer.
#[pyfunction]
pub fn marshal(tag: u32, source: &Bound<'_, PyAny>) -> PyResult<PyNativeBuffer> {
    marshal_object(tag, source)
}

/// Resolve scene objects to their native handle addresses, in order.
#[pyfunction]
pub fn resolve_handles(objects: &Bound<'_, PyAny>) -> PyResult<Vec<usize>> {
    resolve_objects(objects)
}

/// Flip and repack mapped RGBA8 pixels (rows bottom-to-top) into
/// top-to-bottom `rgb` or `rgba` bytes.
#[pyfunction]
#[pyo3(signature = (width, height, pixels, format=None))]
pub fn framebuffer_to_bytes<'py>(
    py: Python<'py>,
    width: u32,
    height: u32,
    pixels: &Bound<'py, PyAny>,
    format: Option<&Bound<'py, PyAny>>,
) -> PyResult<Bound<'py, PyBytes>> {
    let format = parse_format(format)?;
    with_pixel_bytes(pixels, |pixels| {
        let region = PixelRegion::new(width, height, pixels).map_err(map_core_error)?;
        let out = framebuffer::to_bytes(&region, format);
        Ok(PyBytes::new(py, &out))
    })
}

/// Write mapped RGBA8 pixels to a binary PPM file.
#[pyfunction]
pub fn framebuffer_to_file(
    path: PathBuf,
    width: u32,
    height: u32,
    pixels: &Bound<'_, PyAny>,
) -> PyResult<()> {
    with_pixel_bytes(pixels, |pixels| {
        let region = PixelRegion::new(width, height, pixels).map_err(map_core_error)?;
        framebuffer::to_file(&path, &region).map_err(map_core_error)
    })
}

/// Map an attribute name to its native parameter name.
#[pyfunction]
pub fn normalize_param_name(name: &str) -> PyResult<String> {
    normalize_name(name).map_err(map_core_error)
}

/// Native setter for a documented parameter type and argument count.
///
/// Returns `None` for types without a setter.
#[pyfunction]
#[pyo3(signature = (doc_type, arity=None))]
pub fn param_setter(doc_type: &str, arity: Option<usize>) -> PyResult<Option<&'static str>> {
    let setter = ParamType::parse(doc_type).map_err(map_core_error)?.setter();
    match (setter, arity) {
        (Setter::Unsupported, _) => Ok(None),
        (setter, Some(n)) => Ok(setter.for_arity(n).map_err(map_core_error)?.symbol()),
        (setter, None) => Ok(setter.symbol()),
    }
}

/// `OSPDataType` codes a data parameter accepts; empty when unrestricted.
#[pyfunction]
pub fn param_accepts(doc_type: &str) -> PyResult<Vec<u32>> {
    let param = ParamType::parse(doc_type).map_err(map_core_error)?;
    Ok(param.accepts().iter().map(|tag| tag.code()).collect())
}

/// Load a builtin colormap / opacity map file.
#[pyfunction]
pub fn load_builtin_data(path: PathBuf) -> PyResult<BTreeMap<String, Vec<f32>>> {
    builtin::load_builtin_data(&path).map_err(map_core_error)
}

/// Get runtime version
#[pyfunction]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
