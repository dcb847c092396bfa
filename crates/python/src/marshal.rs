//! Python-facing marshaling
//!
//! - Scene wrappers expose their native handle through an `_ospray_object`
//!   attribute holding the handle address as an int; [`PyHandle`] reads it
//!   once and adapts the result to the core [`HandleRef`] capability.
//! - [`PyNativeBuffer`] is the Python view of a marshaled buffer. For numeric
//!   kinds it keeps the source array alive, since the buffer points into it.

use pyo3::exceptions::PyAttributeError;
use pyo3::intern;
use pyo3::prelude::*;

use pyospray_core::handle::{Exposed, HandleRef, RawHandle};
use pyospray_core::marshal::{marshal_handles, marshal_numeric, NativeBuffer};
use pyospray_core::types::{resolve, TypeTag};
use pyospray_core::Error as CoreError;

use crate::error::{map_core_error, FfiError};
use crate::numpy_bridge::{is_numpy_array, numpy_array, type_name};

/// Attribute carrying the native handle on scene wrappers
pub const HANDLE_ATTR: &str = "_ospray_object";

/// Handle read from a scene wrapper
#[derive(Debug)]
pub struct PyHandle(Exposed);

impl PyHandle {
    /// Read the handle attribute of `obj`.
    ///
    /// Only `AttributeError` means the wrapper has no handle. Any other
    /// exception (e.g. a lazy property failing to create the native object)
    /// is returned unchanged.
    pub fn read(obj: &Bound<'_, PyAny>) -> PyResult<Self> {
        let py = obj.py();
        let value = match obj.getattr(intern!(py, HANDLE_ATTR)) {
            Ok(value) => value,
            Err(e) if e.is_instance_of::<PyAttributeError>(py) => {
                return Ok(Self(Exposed::Missing))
            }
            Err(e) => return Err(e),
        };
        Ok(Self(match value.extract::<usize>() {
            Ok(addr) => Exposed::Handle(RawHandle::from_addr(addr)),
            Err(_) => Exposed::Mismatch(type_name(&value)),
        }))
    }
}

impl HandleRef for PyHandle {
    fn expose_handle(&self) -> Exposed {
        self.0.clone()
    }
}

/// Marshaled native buffer
#[derive(Debug)]
#[pyclass(name = "NativeBuffer", module = "pyospray._native", frozen)]
pub struct PyNativeBuffer {
    tag: TypeTag,
    element_count: usize,
    stride: usize,
    nbytes: usize,
    address: usize,
    /// Source array backing borrowed memory
    source: Option<Py<PyAny>>,
    /// Handle array for owned memory
    handles: Option<Box<[RawHandle]>>,
}

impl PyNativeBuffer {
    fn from_buffer(buffer: NativeBuffer<'_>, source: Option<Py<PyAny>>) -> Self {
        let tag = buffer.tag();
        let element_count = buffer.element_count();
        let stride = buffer.stride();
        let nbytes = buffer.byte_len();
        let address = buffer.as_ptr() as usize;
        // Moving the boxed slice keeps its heap address
        let handles = buffer.into_handles();
        Self {
            tag,
            element_count,
            stride,
            nbytes,
            address,
            source,
            handles,
        }
    }
}

#[pymethods]
impl PyNativeBuffer {
    /// `OSPDataType` code of the elements
    #[getter]
    fn tag(&self) -> u32 {
        self.tag.code()
    }

    /// Constant name of the element kind, e.g. `OSP_FLOAT3`
    #[getter]
    fn type_name(&self) -> &'static str {
        self.tag.name()
    }

    #[getter]
    fn element_count(&self) -> usize {
        self.element_count
    }

    /// Bytes per element
    #[getter]
    fn stride(&self) -> usize {
        self.stride
    }

    #[getter]
    fn nbytes(&self) -> usize {
        self.nbytes
    }

    /// Address of the first element, for the native data constructor
    #[getter]
    fn address(&self) -> usize {
        self.address
    }

    /// True when the memory was allocated by the marshaler
    #[getter]
    fn owned(&self) -> bool {
        self.handles.is_some()
    }

    /// Source array, for borrowed buffers
    #[getter]
    fn source(&self, py: Python<'_>) -> Option<Py<PyAny>> {
        self.source.as_ref().map(|s| s.clone_ref(py))
    }

    /// Resolved handle addresses, for handle buffers
    #[getter]
    fn handles(&self) -> Option<Vec<usize>> {
        self.handles
            .as_ref()
            .map(|handles| handles.iter().map(|h| h.addr()).collect())
    }

    fn __len__(&self) -> usize {
        self.element_count
    }

    fn __repr__(&self) -> String {
        format!(
            "NativeBuffer({}, elements={}, nbytes={}, {})",
            self.tag,
            self.element_count,
            self.nbytes,
            if self.handles.is_some() { "owned" } else { "borrowed" }
        )
    }
}

/// Marshal `source` as a buffer of `tag` elements.
pub fn marshal_object(tag: u32, source: &Bound<'_, PyAny>) -> PyResult<PyNativeBuffer> {
    let tag = TypeTag::from_code(tag).map_err(map_core_error)?;
    let spec = resolve(tag).map_err(map_core_error)?;

    if spec.storage.is_numeric() {
        if !is_numpy_array(source) {
            return Err(map_core_error(CoreError::InvalidLayout(format!(
                "{} expects a numpy array, got {}",
                tag,
                type_name(source)
            ))));
        }
        let array = numpy_array(source)?;
        let buffer = marshal_numeric(tag, array.source()).map_err(map_core_error)?;
        Ok(PyNativeBuffer::from_buffer(
            buffer,
            Some(source.clone().unbind()),
        ))
    } else {
        let wrappers = read_handles(source)?;
        let buffer = marshal_handles(tag, &wrappers).map_err(map_core_error)?;
        Ok(PyNativeBuffer::from_buffer(buffer, None))
    }
}

/// Resolve a sequence of scene wrappers to handle addresses.
pub fn resolve_objects(objects: &Bound<'_, PyAny>) -> PyResult<Vec<usize>> {
    let wrappers = read_handles(objects)?;
    let handles = pyospray_core::resolve_handles(&wrappers).map_err(map_core_error)?;
    Ok(handles.iter().map(|h| h.addr()).collect())
}

fn read_handles(sequence: &Bound<'_, PyAny>) -> PyResult<Vec<PyHandle>> {
    let iter = sequence.try_iter().map_err(|_| {
        FfiError::WrongType(format!(
            "expected a sequence of objects, got {}",
            type_name(sequence)
        ))
    })?;
    iter.map(|obj| PyHandle::read(&obj?)).collect()
}
