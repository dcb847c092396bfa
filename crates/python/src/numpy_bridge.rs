//! Zero-copy views of numpy arrays
//!
//! [`NumpyArray`] holds a read-only borrow of an ndarray (through numpy's
//! borrow tracking) together with its layout facts. Dimensionality,
//! contiguity, byte order and dtype are left for the core marshaler to
//! judge; no data is copied.

use numpy::{
    Element, PyArrayDescrMethods, PyArrayDyn, PyArrayMethods, PyReadonlyArrayDyn, PyUntypedArray,
    PyUntypedArrayMethods,
};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

use pyospray_core::marshal::{ByteOrder, NumericSource, ScalarKind};

use crate::error::FfiError;

/// numpy dtype kind/itemsize to scalar kind
fn scalar_kind(kind: u8, itemsize: usize) -> Option<ScalarKind> {
    match (kind, itemsize) {
        (b'f', 4) => Some(ScalarKind::Float32),
        (b'f', 8) => Some(ScalarKind::Float64),
        (b'i', 4) => Some(ScalarKind::Int32),
        (b'i', 8) => Some(ScalarKind::Int64),
        (b'u', 1) => Some(ScalarKind::UInt8),
        (b'u', 4) => Some(ScalarKind::UInt32),
        _ => None,
    }
}

/// Byte order of a dtype relative to this host
fn byte_order(flag: u8) -> ByteOrder {
    let foreign = if cfg!(target_endian = "little") {
        b'>'
    } else {
        b'<'
    };
    if flag == foreign {
        ByteOrder::Swapped
    } else {
        ByteOrder::Native
    }
}

/// Read-only borrow of a native-order array, typed by element
enum ArrayView<'py> {
    F32(PyReadonlyArrayDyn<'py, f32>),
    F64(PyReadonlyArrayDyn<'py, f64>),
    I32(PyReadonlyArrayDyn<'py, i32>),
    I64(PyReadonlyArrayDyn<'py, i64>),
    U8(PyReadonlyArrayDyn<'py, u8>),
    U32(PyReadonlyArrayDyn<'py, u32>),
}

impl ArrayView<'_> {
    fn bytes(&self) -> &[u8] {
        fn cast<T: bytemuck::Pod>(slice: Result<&[T], numpy::NotContiguousError>) -> &[u8] {
            slice.map(bytemuck::cast_slice).unwrap_or(&[])
        }
        match self {
            ArrayView::F32(a) => cast(a.as_slice()),
            ArrayView::F64(a) => cast(a.as_slice()),
            ArrayView::I32(a) => cast(a.as_slice()),
            ArrayView::I64(a) => cast(a.as_slice()),
            ArrayView::U8(a) => cast(a.as_slice()),
            ArrayView::U32(a) => cast(a.as_slice()),
        }
    }
}

fn readonly<'py, T: Element>(
    obj: &Bound<'py, PyAny>,
) -> Result<PyReadonlyArrayDyn<'py, T>, FfiError> {
    let typed = obj
        .downcast::<PyArrayDyn<T>>()
        .map_err(|_| FfiError::UnsupportedDtype(type_name(obj)))?;
    typed
        .try_readonly()
        .map_err(|e| FfiError::Borrowed(e.to_string()))
}

/// Borrowed numpy array with the layout facts the marshaler needs
pub struct NumpyArray<'py> {
    view: Option<ArrayView<'py>>,
    scalar: ScalarKind,
    ndim: usize,
    contiguous: bool,
    order: ByteOrder,
}

impl NumpyArray<'_> {
    /// View the array as a numeric source without copying.
    ///
    /// Strided or byte-swapped arrays get an empty byte view; the recorded
    /// layout makes the marshaler reject them before bytes are read.
    pub fn source(&self) -> NumericSource<'_> {
        let bytes = self.view.as_ref().map(ArrayView::bytes).unwrap_or(&[]);
        NumericSource::from_bytes(bytes, self.scalar)
            .with_ndim(self.ndim)
            .with_contiguous(self.contiguous)
            .with_byte_order(self.order)
    }

    /// RGBA8 pixel memory: any C-contiguous native uint8 or uint32 array
    pub fn pixel_bytes(&self) -> Result<&[u8], FfiError> {
        match (self.scalar, &self.view) {
            (ScalarKind::UInt8 | ScalarKind::UInt32, Some(view)) => Ok(view.bytes()),
            (ScalarKind::UInt8 | ScalarKind::UInt32, None) => Err(FfiError::NotContiguous),
            (other, _) => Err(FfiError::UnsupportedDtype(format!("{:?}", other))),
        }
    }
}

/// Check if a Python object is a numpy array
pub fn is_numpy_array(obj: &Bound<'_, PyAny>) -> bool {
    obj.downcast::<PyUntypedArray>().is_ok()
}

/// Borrow a numpy array read-only and record its layout.
pub fn numpy_array<'py>(obj: &Bound<'py, PyAny>) -> Result<NumpyArray<'py>, FfiError> {
    let array = obj
        .downcast::<PyUntypedArray>()
        .map_err(|_| FfiError::NotAnArray(type_name(obj)))?;

    let dtype = array.dtype();
    let scalar = scalar_kind(dtype.kind(), dtype.itemsize())
        .ok_or_else(|| FfiError::UnsupportedDtype(dtype.to_string()))?;
    let ndim = array.ndim();
    let contiguous = array.is_c_contiguous();
    let order = byte_order(dtype.byteorder());

    let view = if contiguous && order == ByteOrder::Native {
        Some(match scalar {
            ScalarKind::Float32 => ArrayView::F32(readonly(obj)?),
            ScalarKind::Float64 => ArrayView::F64(readonly(obj)?),
            ScalarKind::Int32 => ArrayView::I32(readonly(obj)?),
            ScalarKind::Int64 => ArrayView::I64(readonly(obj)?),
            ScalarKind::UInt8 => ArrayView::U8(readonly(obj)?),
            ScalarKind::UInt32 => ArrayView::U32(readonly(obj)?),
        })
    } else {
        None
    };

    Ok(NumpyArray {
        view,
        scalar,
        ndim,
        contiguous,
        order,
    })
}

/// Run `f` over RGBA8 pixel memory borrowed from `bytes` or a numpy array.
pub fn with_pixel_bytes<R>(
    obj: &Bound<'_, PyAny>,
    f: impl FnOnce(&[u8]) -> PyResult<R>,
) -> PyResult<R> {
    if let Ok(bytes) = obj.downcast::<PyBytes>() {
        return f(bytes.as_bytes());
    }
    let array = numpy_array(obj)?;
    f(array.pixel_bytes()?)
}

pub(crate) fn type_name(obj: &Bound<'_, PyAny>) -> String {
    obj.get_type()
        .name()
        .map(|name| name.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyo3::ffi::c_str;
    use pyo3::types::PyDict;

    fn eval<'py>(py: Python<'py>, code: &std::ffi::CStr) -> Bound<'py, PyAny> {
        let locals = PyDict::new(py);
        py.run(code, None, Some(&locals)).unwrap();
        locals.get_item("result").unwrap().unwrap()
    }

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(scalar_kind(b'f', 4), Some(ScalarKind::Float32));
        assert_eq!(scalar_kind(b'i', 4), Some(ScalarKind::Int32));
        assert_eq!(scalar_kind(b'f', 2), None);
        assert_eq!(scalar_kind(b'c', 8), None);
    }

    #[test]
    fn test_float32_view_is_zero_copy() {
        Python::attach(|py| {
            if py.import("numpy").is_err() {
                println!("Skipping test: numpy not available");
                return;
            }

            let array = eval(
                py,
                c_str!("import numpy as np\nresult = np.arange(6, dtype=np.float32)"),
            );
            let view = numpy_array(&array).unwrap();
            let source = view.source();
            assert_eq!(source.scalar(), ScalarKind::Float32);
            assert_eq!(source.raw_len(), 6);
            assert!(source.is_flat());

            let address: usize = array
                .getattr("ctypes")
                .unwrap()
                .getattr("data")
                .unwrap()
                .extract()
                .unwrap();
            assert_eq!(source.bytes().as_ptr() as usize, address);
        });
    }

    #[test]
    fn test_layout_facts_recorded() {
        Python::attach(|py| {
            if py.import("numpy").is_err() {
                println!("Skipping test: numpy not available");
                return;
            }

            let two_d = eval(
                py,
                c_str!("import numpy as np\nresult = np.zeros((2, 3), dtype=np.float32)"),
            );
            assert!(!numpy_array(&two_d).unwrap().source().is_flat());

            let strided = eval(
                py,
                c_str!("import numpy as np\nresult = np.zeros(8, dtype=np.float32)[::2]"),
            );
            let view = numpy_array(&strided).unwrap();
            assert!(!view.source().is_flat());
            assert!(view.source().bytes().is_empty());

            let swapped = eval(
                py,
                c_str!("import numpy as np\nresult = np.zeros(3, dtype=np.dtype(np.float32).newbyteorder('S'))"),
            );
            let view = numpy_array(&swapped).unwrap();
            assert!(!view.source().is_flat());
            assert!(view.source().bytes().is_empty());
        });
    }

    #[test]
    fn test_mutably_borrowed_array_is_rejected() {
        Python::attach(|py| {
            if py.import("numpy").is_err() {
                println!("Skipping test: numpy not available");
                return;
            }

            let array = eval(
                py,
                c_str!("import numpy as np\nresult = np.zeros(4, dtype=np.float32)"),
            );
            let typed = array.downcast::<PyArrayDyn<f32>>().unwrap();
            let writer = typed.readwrite();
            assert!(matches!(numpy_array(&array), Err(FfiError::Borrowed(_))));

            drop(writer);
            assert!(numpy_array(&array).is_ok());
        });
    }

    #[test]
    fn test_rejects_non_arrays() {
        Python::attach(|py| {
            if py.import("numpy").is_err() {
                println!("Skipping test: numpy not available");
                return;
            }

            let list = eval(py, c_str!("result = [1.0, 2.0, 3.0]"));
            assert!(matches!(
                numpy_array(&list),
                Err(FfiError::NotAnArray(name)) if name == "list"
            ));
            assert!(!is_numpy_array(&list));
        });
    }

    #[test]
    fn test_pixel_bytes_from_bytes() {
        Python::attach(|py| {
            let bytes = eval(py, c_str!("result = bytes(range(8))"));
            let copied = with_pixel_bytes(&bytes, |pixels| Ok(pixels.to_vec())).unwrap();
            assert_eq!(copied, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        });
    }

    #[test]
    fn test_pixel_bytes_from_framebuffer_shapes() {
        Python::attach(|py| {
            if py.import("numpy").is_err() {
                println!("Skipping test: numpy not available");
                return;
            }

            let rgba = eval(
                py,
                c_str!("import numpy as np\nresult = np.arange(2 * 3 * 4, dtype=np.uint8).reshape(2, 3, 4)"),
            );
            let len = with_pixel_bytes(&rgba, |pixels| Ok(pixels.len())).unwrap();
            assert_eq!(len, 24);

            let packed = eval(
                py,
                c_str!("import numpy as np\nresult = np.zeros((2, 3), dtype=np.uint32)"),
            );
            let len = with_pixel_bytes(&packed, |pixels| Ok(pixels.len())).unwrap();
            assert_eq!(len, 24);

            let transposed = eval(
                py,
                c_str!("import numpy as np\nresult = np.zeros((3, 2), dtype=np.uint32).T"),
            );
            let view = numpy_array(&transposed).unwrap();
            assert!(matches!(view.pixel_bytes(), Err(FfiError::NotContiguous)));

            let floats = eval(
                py,
                c_str!("import numpy as np\nresult = np.zeros(4, dtype=np.float32)"),
            );
            let view = numpy_array(&floats).unwrap();
            assert!(matches!(view.pixel_bytes(), Err(FfiError::UnsupportedDtype(_))));
        });
    }
}
