//! Typed buffer marshaling
//!
//! Turns a `(TypeTag, source)` pair into a [`NativeBuffer`] the rendering
//! library can commit.
//!
//! - Numeric kinds borrow the caller's memory (zero copy). The source must be
//!   one contiguous, native-endian, one-dimensional block of the tag's scalar
//!   type, and its length a whole number of elements.
//! - The handle kind resolves every wrapper through [`resolve_handles`] and
//!   owns the resulting array until the buffer is dropped.
//!
//! Ownership is carried on the buffer itself ([`Ownership`]), so callers never
//! have to remember which conversions allocated.

use std::ffi::c_void;

use crate::handle::{resolve_handles, HandleRef, RawHandle};
use crate::types::{resolve, StorageKind, TypeSpec, TypeTag};
use crate::{Error, Result};

/// Scalar type of a host-side numeric sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    UInt8,
    /// 32-bit unsigned integer
    UInt32,
}

impl ScalarKind {
    /// Get size in bytes for this scalar type
    pub const fn size_bytes(self) -> usize {
        match self {
            ScalarKind::Float32 => 4,
            ScalarKind::Float64 => 8,
            ScalarKind::Int32 => 4,
            ScalarKind::Int64 => 8,
            ScalarKind::UInt8 => 1,
            ScalarKind::UInt32 => 4,
        }
    }

    /// Native storage this scalar can be handed to without conversion
    pub const fn storage(self) -> Option<StorageKind> {
        match self {
            ScalarKind::Float32 => Some(StorageKind::Float32),
            ScalarKind::Int32 => Some(StorageKind::Int32),
            _ => None,
        }
    }
}

/// Byte order of a numeric source relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Same as the host
    Native,
    /// Opposite of the host
    Swapped,
}

/// Borrowed view of a host-side numeric sequence plus its layout facts
#[derive(Debug, Clone, Copy)]
pub struct NumericSource<'a> {
    bytes: &'a [u8],
    scalar: ScalarKind,
    ndim: usize,
    contiguous: bool,
    byte_order: ByteOrder,
}

impl<'a> NumericSource<'a> {
    /// View raw bytes as a flat, contiguous, native-order sequence of `scalar`
    pub fn from_bytes(bytes: &'a [u8], scalar: ScalarKind) -> Self {
        Self {
            bytes,
            scalar,
            ndim: 1,
            contiguous: true,
            byte_order: ByteOrder::Native,
        }
    }

    /// View a float slice
    pub fn from_f32(data: &'a [f32]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(data), ScalarKind::Float32)
    }

    /// View an int slice
    pub fn from_i32(data: &'a [i32]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(data), ScalarKind::Int32)
    }

    /// Record the dimensionality reported by the host
    pub fn with_ndim(mut self, ndim: usize) -> Self {
        self.ndim = ndim;
        self
    }

    /// Record whether the host memory is one contiguous block
    pub fn with_contiguous(mut self, contiguous: bool) -> Self {
        self.contiguous = contiguous;
        self
    }

    /// Record the byte order of the host memory
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Scalar type of the source
    pub fn scalar(&self) -> ScalarKind {
        self.scalar
    }

    /// Number of scalars in the source
    pub fn raw_len(&self) -> usize {
        self.bytes.len() / self.scalar.size_bytes()
    }

    /// Borrowed bytes
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Whether the source is a flat, contiguous, native-order block
    pub fn is_flat(&self) -> bool {
        self.ndim == 1 && self.contiguous && self.byte_order == ByteOrder::Native
    }

    fn check_layout(&self, tag: TypeTag, storage: StorageKind) -> Result<()> {
        if self.ndim != 1 {
            return Err(Error::InvalidLayout(format!(
                "expected a one-dimensional sequence, got {} dimensions",
                self.ndim
            )));
        }
        if !self.contiguous {
            return Err(Error::InvalidLayout(
                "sequence is not a single contiguous block".to_string(),
            ));
        }
        if self.byte_order != ByteOrder::Native {
            return Err(Error::InvalidLayout(
                "sequence is not in native byte order".to_string(),
            ));
        }
        if self.scalar.storage() != Some(storage) {
            return Err(Error::InvalidLayout(format!(
                "{} needs {} elements, got {:?}",
                tag, storage, self.scalar
            )));
        }
        if self.bytes.len() % self.scalar.size_bytes() != 0 {
            return Err(Error::InvalidLayout(format!(
                "{} bytes is not a whole number of {:?} values",
                self.bytes.len(),
                self.scalar
            )));
        }
        Ok(())
    }
}

/// Host-side input to [`marshal`]
#[derive(Debug, Clone, Copy)]
pub enum Source<'a, R> {
    /// Numeric sequence, borrowed as-is
    Numeric(NumericSource<'a>),
    /// Ordered wrapper objects for the handle kind
    Handles(&'a [R]),
}

/// Who owns the memory behind a [`NativeBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Memory belongs to the caller's source sequence
    Borrowed,
    /// Memory was allocated by the marshaler and is freed with the buffer
    Owned,
}

/// Memory behind a [`NativeBuffer`]
#[derive(Debug)]
pub enum BufferStorage<'a> {
    /// View of caller memory
    Borrowed(&'a [u8]),
    /// Handle array allocated during marshaling
    Owned(Box<[RawHandle]>),
}

/// Descriptor handed to the rendering library's data constructor
#[derive(Debug)]
pub struct NativeBuffer<'a> {
    tag: TypeTag,
    spec: TypeSpec,
    element_count: usize,
    storage: BufferStorage<'a>,
}

impl<'a> NativeBuffer<'a> {
    /// Element kind
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Native layout of one element
    pub fn spec(&self) -> TypeSpec {
        self.spec
    }

    /// Number of elements (not scalars)
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Bytes between consecutive elements
    pub fn stride(&self) -> usize {
        self.spec.element_size()
    }

    /// Total byte length; always `element_count * stride`
    pub fn byte_len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Raw bytes of the buffer
    pub fn as_bytes(&self) -> &[u8] {
        match self.storage {
            BufferStorage::Borrowed(bytes) => bytes,
            BufferStorage::Owned(ref handles) => bytemuck::cast_slice(&handles[..]),
        }
    }

    /// Pointer passed to the native API
    pub fn as_ptr(&self) -> *const c_void {
        self.as_bytes().as_ptr().cast()
    }

    /// Whether the memory is borrowed or owned
    pub fn ownership(&self) -> Ownership {
        match self.storage {
            BufferStorage::Borrowed(_) => Ownership::Borrowed,
            BufferStorage::Owned(_) => Ownership::Owned,
        }
    }

    /// Resolved handles, for the handle kind
    pub fn handles(&self) -> Option<&[RawHandle]> {
        match &self.storage {
            BufferStorage::Owned(handles) => Some(&handles[..]),
            BufferStorage::Borrowed(_) => None,
        }
    }

    /// Underlying storage
    pub fn storage(&self) -> &BufferStorage<'a> {
        &self.storage
    }

    /// Take the handle array out of an owned buffer
    pub fn into_handles(self) -> Option<Box<[RawHandle]>> {
        match self.storage {
            BufferStorage::Owned(handles) => Some(handles),
            BufferStorage::Borrowed(_) => None,
        }
    }
}

/// Marshal `source` as a buffer of `tag` elements.
pub fn marshal<'a, R: HandleRef>(tag: TypeTag, source: Source<'a, R>) -> Result<NativeBuffer<'a>> {
    let spec = resolve(tag)?;

    let buffer = match (spec.storage.is_numeric(), source) {
        (true, Source::Numeric(numeric)) => borrow_numeric(tag, spec, numeric)?,
        (false, Source::Handles(objects)) => {
            let handles = resolve_handles(objects)?;
            NativeBuffer {
                tag,
                spec,
                element_count: handles.len(),
                storage: BufferStorage::Owned(handles),
            }
        }
        (true, Source::Handles(_)) => {
            return Err(Error::InvalidLayout(format!(
                "{} expects a numeric sequence, got objects",
                tag
            )))
        }
        (false, Source::Numeric(_)) => {
            return Err(Error::InvalidLayout(format!(
                "{} expects a sequence of objects, got numbers",
                tag
            )))
        }
    };

    tracing::debug!(
        tag = %tag,
        elements = buffer.element_count,
        bytes = buffer.byte_len(),
        ownership = ?buffer.ownership(),
        "marshaled native buffer"
    );
    Ok(buffer)
}

/// Marshal with a raw `OSPDataType` code instead of a [`TypeTag`].
pub fn marshal_code<'a, R: HandleRef>(code: u32, source: Source<'a, R>) -> Result<NativeBuffer<'a>> {
    marshal(TypeTag::from_code(code)?, source)
}

/// Marshal a numeric sequence.
pub fn marshal_numeric(tag: TypeTag, source: NumericSource<'_>) -> Result<NativeBuffer<'_>> {
    marshal::<RawHandle>(tag, Source::Numeric(source))
}

/// Marshal a sequence of wrapper objects.
pub fn marshal_handles<R: HandleRef>(tag: TypeTag, objects: &[R]) -> Result<NativeBuffer<'static>> {
    let buffer = marshal(tag, Source::Handles(objects))?;
    // Owned storage carries no borrow of `objects`
    match buffer.storage {
        BufferStorage::Owned(handles) => Ok(NativeBuffer {
            tag: buffer.tag,
            spec: buffer.spec,
            element_count: buffer.element_count,
            storage: BufferStorage::Owned(handles),
        }),
        BufferStorage::Borrowed(_) => Err(Error::InvalidLayout(format!(
            "{} expects a numeric sequence, got objects",
            tag
        ))),
    }
}

fn borrow_numeric<'a>(
    tag: TypeTag,
    spec: TypeSpec,
    source: NumericSource<'a>,
) -> Result<NativeBuffer<'a>> {
    source.check_layout(tag, spec.storage)?;

    let len = source.raw_len();
    if len % spec.components != 0 {
        return Err(Error::MisalignedLength {
            len,
            components: spec.components,
        });
    }

    Ok(NativeBuffer {
        tag,
        spec,
        element_count: len / spec.components,
        storage: BufferStorage::Borrowed(source.bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float3_zero_copy() {
        let data = [0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0];
        let buffer = marshal_numeric(TypeTag::Float3, NumericSource::from_f32(&data)).unwrap();

        assert_eq!(buffer.element_count(), 2);
        assert_eq!(buffer.stride(), 12);
        assert_eq!(buffer.byte_len(), 24);
        assert_eq!(buffer.ownership(), Ownership::Borrowed);
        assert_eq!(buffer.as_ptr(), data.as_ptr().cast::<c_void>());
    }

    #[test]
    fn test_float3a_uses_four_components() {
        let vertex = [
            -1.0f32, -1.0, 3.0, 0.0, //
            -1.0, 1.0, 3.0, 0.0, //
            1.0, -1.0, 3.0, 0.0, //
            0.1, 0.1, 0.3, 0.0,
        ];
        let buffer = marshal_numeric(TypeTag::Float3A, NumericSource::from_f32(&vertex)).unwrap();
        assert_eq!(buffer.element_count(), 4);
        assert_eq!(buffer.byte_len(), 64);
    }

    #[test]
    fn test_int3_indices() {
        let index = [0i32, 1, 2, 1, 2, 3];
        let buffer = marshal_numeric(TypeTag::Int3, NumericSource::from_i32(&index)).unwrap();
        assert_eq!(buffer.element_count(), 2);
        assert!(buffer.handles().is_none());
    }

    #[test]
    fn test_misaligned_length() {
        let data = [0.0f32; 10];
        match marshal_numeric(TypeTag::Float3, NumericSource::from_f32(&data)) {
            Err(Error::MisalignedLength { len, components }) => {
                assert_eq!(len, 10);
                assert_eq!(components, 3);
            }
            other => panic!("expected MisalignedLength, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_layouts() {
        let data = [0.0f32; 6];
        let two_d = NumericSource::from_f32(&data).with_ndim(2);
        assert!(matches!(
            marshal_numeric(TypeTag::Float3, two_d),
            Err(Error::InvalidLayout(_))
        ));

        let strided = NumericSource::from_f32(&data).with_contiguous(false);
        assert!(matches!(
            marshal_numeric(TypeTag::Float3, strided),
            Err(Error::InvalidLayout(_))
        ));

        let swapped = NumericSource::from_f32(&data).with_byte_order(ByteOrder::Swapped);
        assert!(matches!(
            marshal_numeric(TypeTag::Float3, swapped),
            Err(Error::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_rejects_scalar_mismatch() {
        let data = [0i32; 3];
        assert!(matches!(
            marshal_numeric(TypeTag::Float3, NumericSource::from_i32(&data)),
            Err(Error::InvalidLayout(_))
        ));

        let doubles = [0u8; 24];
        let source = NumericSource::from_bytes(&doubles, ScalarKind::Float64);
        assert!(matches!(
            marshal_numeric(TypeTag::Float3, source),
            Err(Error::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_bytes() {
        let bytes = [0u8; 13];
        let source = NumericSource::from_bytes(&bytes, ScalarKind::Float32);
        assert!(matches!(
            marshal_numeric(TypeTag::Float, source),
            Err(Error::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_light_handles_are_owned() {
        let lights = [RawHandle::from_addr(0xdead), RawHandle::from_addr(0xbeef)];
        let buffer = marshal_handles(TypeTag::Light, &lights).unwrap();

        assert_eq!(buffer.ownership(), Ownership::Owned);
        assert_eq!(buffer.element_count(), 2);
        assert_eq!(buffer.byte_len(), 2 * std::mem::size_of::<usize>());
        assert_eq!(buffer.handles().unwrap(), &lights);
        assert_eq!(buffer.into_handles().unwrap().len(), 2);
    }

    #[test]
    fn test_kind_mismatch_between_tag_and_source() {
        let lights = [RawHandle::from_addr(1)];
        assert!(matches!(
            marshal(TypeTag::Float, Source::Handles(&lights)),
            Err(Error::InvalidLayout(_))
        ));

        let data = [0.0f32; 1];
        assert!(matches!(
            marshal_numeric(TypeTag::Light, NumericSource::from_f32(&data)),
            Err(Error::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_marshal_code_unknown() {
        let data = [0.0f32; 3];
        let result = marshal_code::<RawHandle>(7000, Source::Numeric(NumericSource::from_f32(&data)));
        assert!(matches!(result, Err(Error::UnsupportedTypeKind(_))));
    }

    #[test]
    fn test_empty_numeric_source() {
        let data: [f32; 0] = [];
        let buffer = marshal_numeric(TypeTag::Float4, NumericSource::from_f32(&data)).unwrap();
        assert_eq!(buffer.element_count(), 0);
        assert_eq!(buffer.byte_len(), 0);
    }
}
