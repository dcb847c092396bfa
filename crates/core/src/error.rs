//! Error types for pyospray-core

use thiserror::Error;

/// Result type alias for pyospray-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pyospray-core
#[derive(Debug, Error)]
pub enum Error {
    /// Element-type tag outside the dispatch table
    #[error("Unsupported data type: {0}")]
    UnsupportedTypeKind(String),

    /// Source is not a contiguous, native-order, one-dimensional block of the expected kind
    #[error("Invalid source layout: {0}")]
    InvalidLayout(String),

    /// Raw length is not a whole number of elements
    #[error("Source length {len} is not a multiple of {components} components per element")]
    MisalignedLength {
        /// Raw scalar count of the source
        len: usize,
        /// Components per element required by the type tag
        components: usize,
    },

    /// Handle-list element does not expose a native handle
    #[error("Object at index {index} does not expose a native handle")]
    MissingHandleCapability {
        /// Position of the offending element
        index: usize,
    },

    /// Handle-list element exposes something that is not a native handle
    #[error("Object at index {index} exposes {found} instead of a native handle")]
    HandleTypeMismatch {
        /// Position of the offending element
        index: usize,
        /// Description of what was exposed
        found: String,
    },

    /// Output pixel format name not recognised
    #[error("Unsupported pixel format: {0:?} (expected \"rgb\" or \"rgba\")")]
    UnsupportedFormat(String),

    /// Pixel memory does not match the region dimensions
    #[error("Pixel region {width}x{height} needs {expected} bytes, got {actual}")]
    RegionSizeMismatch {
        /// Region width in pixels
        width: u32,
        /// Region height in pixels
        height: u32,
        /// Bytes required
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// Library initialisation argument cannot be passed to native code
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Parameter type or arity has no native setter
    #[error("Unsupported parameter: {0}")]
    UnsupportedParameter(String),

    /// Builtin color/opacity map text is malformed
    #[error("Builtin data error on line {line}: {reason}")]
    BuiltinData {
        /// 1-based line number
        line: usize,
        /// What went wrong
        reason: String,
    },

    /// Binding configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rendering device reported a failure
    #[error("Device error: {0}")]
    Device(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoFailure(#[from] std::io::Error),
}
