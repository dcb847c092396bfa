//! Element-type dispatch table
//!
//! Maps each supported element kind to its native storage layout. The set of
//! kinds is closed: adding one means adding a [`TypeTag`] variant and a row in
//! the table below, never a branch at a call site.

use std::fmt;

use crate::handle::RawHandle;
use crate::{Error, Result};

/// Native scalar storage of one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// 32-bit IEEE float
    Float32,
    /// 32-bit signed integer
    Int32,
    /// Opaque native object handle (pointer sized)
    ObjectHandle,
}

impl StorageKind {
    /// Get size in bytes of one component
    pub const fn size_bytes(self) -> usize {
        match self {
            StorageKind::Float32 => 4,
            StorageKind::Int32 => 4,
            StorageKind::ObjectHandle => std::mem::size_of::<RawHandle>(),
        }
    }

    /// Whether this storage is filled from a numeric source
    pub const fn is_numeric(self) -> bool {
        !matches!(self, StorageKind::ObjectHandle)
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageKind::Float32 => "float32",
            StorageKind::Int32 => "int32",
            StorageKind::ObjectHandle => "object handle",
        };
        f.write_str(name)
    }
}

/// Element kind of a marshaled buffer.
///
/// Discriminants are the OSPRay `OSPDataType` codes, so raw tags coming from
/// the host can be checked with [`TypeTag::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TypeTag {
    /// Handle to a light object (`OSP_LIGHT`)
    Light = 1005,
    /// Scalar int (`OSP_INT`)
    Int = 4000,
    /// 3-int vector (`OSP_INT3`)
    Int3 = 4002,
    /// 4-int vector (`OSP_INT4`)
    Int4 = 4003,
    /// Scalar float (`OSP_FLOAT`)
    Float = 6000,
    /// 2-float vector (`OSP_FLOAT2`)
    Float2 = 6001,
    /// 3-float vector (`OSP_FLOAT3`)
    Float3 = 6002,
    /// 4-float vector (`OSP_FLOAT4`)
    Float4 = 6003,
    /// 3-float vector padded to 4 floats (`OSP_FLOAT3A`)
    Float3A = 6004,
}

/// Native layout of one element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    /// Scalar storage of each component
    pub storage: StorageKind,
    /// Components per element (always >= 1)
    pub components: usize,
}

impl TypeSpec {
    const fn new(storage: StorageKind, components: usize) -> Self {
        Self {
            storage,
            components,
        }
    }

    /// Bytes occupied by one element (the buffer stride)
    pub const fn element_size(&self) -> usize {
        self.components * self.storage.size_bytes()
    }
}

struct Entry {
    tag: TypeTag,
    spec: TypeSpec,
}

const fn entry(tag: TypeTag, storage: StorageKind, components: usize) -> Entry {
    Entry {
        tag,
        spec: TypeSpec::new(storage, components),
    }
}

static DISPATCH_TABLE: [Entry; 9] = [
    entry(TypeTag::Float, StorageKind::Float32, 1),
    entry(TypeTag::Float2, StorageKind::Float32, 2),
    entry(TypeTag::Float3, StorageKind::Float32, 3),
    entry(TypeTag::Float3A, StorageKind::Float32, 4),
    entry(TypeTag::Float4, StorageKind::Float32, 4),
    entry(TypeTag::Int, StorageKind::Int32, 1),
    entry(TypeTag::Int3, StorageKind::Int32, 3),
    entry(TypeTag::Int4, StorageKind::Int32, 4),
    entry(TypeTag::Light, StorageKind::ObjectHandle, 1),
];

fn lookup(tag: TypeTag) -> Option<&'static Entry> {
    DISPATCH_TABLE.iter().find(|e| e.tag == tag)
}

/// Resolve the native layout of `tag`.
pub fn resolve(tag: TypeTag) -> Result<TypeSpec> {
    lookup(tag)
        .map(|e| e.spec)
        .ok_or_else(|| Error::UnsupportedTypeKind(format!("{:?}", tag)))
}

impl TypeTag {
    /// Native `OSPDataType` code
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Look up the tag for a native code
    pub fn from_code(code: u32) -> Result<Self> {
        DISPATCH_TABLE
            .iter()
            .find(|e| e.tag.code() == code)
            .map(|e| e.tag)
            .ok_or_else(|| Error::UnsupportedTypeKind(format!("code {}", code)))
    }

    /// Host-facing constant name, e.g. `OSP_FLOAT3`
    pub const fn name(self) -> &'static str {
        match self {
            TypeTag::Light => "OSP_LIGHT",
            TypeTag::Int => "OSP_INT",
            TypeTag::Int3 => "OSP_INT3",
            TypeTag::Int4 => "OSP_INT4",
            TypeTag::Float => "OSP_FLOAT",
            TypeTag::Float2 => "OSP_FLOAT2",
            TypeTag::Float3 => "OSP_FLOAT3",
            TypeTag::Float4 => "OSP_FLOAT4",
            TypeTag::Float3A => "OSP_FLOAT3A",
        }
    }

    /// Every supported tag, in table order
    pub fn all() -> impl Iterator<Item = TypeTag> {
        DISPATCH_TABLE.iter().map(|e| e.tag)
    }
}

impl TryFrom<u32> for TypeTag {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        TypeTag::from_code(code)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
