//! Error conversion at the Python boundary

use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::PyErr;
use thiserror::Error;

use pyospray_core::Error as CoreError;

/// Failures adapting Python objects before they reach the core
#[derive(Debug, Error)]
pub enum FfiError {
    /// Object is not a numpy array
    #[error("expected a numpy array, got {0}")]
    NotAnArray(String),

    /// Array dtype has no native counterpart
    #[error("unsupported array dtype {0}")]
    UnsupportedDtype(String),

    /// Array is not one C-contiguous, native-order block
    #[error("array must be C-contiguous and in native byte order")]
    NotContiguous,

    /// Array is already borrowed mutably from Rust
    #[error("array is not readable: {0}")]
    Borrowed(String),

    /// Argument of the wrong Python type
    #[error("{0}")]
    WrongType(String),
}

impl From<FfiError> for PyErr {
    fn from(e: FfiError) -> Self {
        tracing::warn!(error = %e, "rejected python argument");
        match e {
            FfiError::NotAnArray(_) | FfiError::WrongType(_) => PyTypeError::new_err(e.to_string()),
            FfiError::UnsupportedDtype(_) | FfiError::NotContiguous => {
                PyValueError::new_err(e.to_string())
            }
            FfiError::Borrowed(_) => PyRuntimeError::new_err(e.to_string()),
        }
    }
}

/// Map core errors to Python exceptions
pub fn map_core_error(e: CoreError) -> PyErr {
    tracing::warn!(error = %e, "pyospray call failed");
    match e {
        CoreError::MissingHandleCapability { .. } => PyTypeError::new_err(e.to_string()),
        CoreError::UnsupportedTypeKind(_)
        | CoreError::InvalidLayout(_)
        | CoreError::MisalignedLength { .. }
        | CoreError::HandleTypeMismatch { .. }
        | CoreError::UnsupportedFormat(_)
        | CoreError::RegionSizeMismatch { .. }
        | CoreError::InvalidArgument(_)
        | CoreError::UnsupportedParameter(_) => PyValueError::new_err(e.to_string()),
        CoreError::IoFailure(io) => PyErr::from(io),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}
