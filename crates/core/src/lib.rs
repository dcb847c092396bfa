//! pyospray core - marshaling boundary between a scripting host and OSPRay
//!
//! This crate is pure Rust with no Python dependency. It provides:
//! - the element-type dispatch table (`types`)
//! - zero-copy typed buffer marshaling (`marshal`)
//! - ordered, all-or-nothing native handle resolution (`handle`)
//! - the framebuffer codec: row flip, channel packing, binary PPM (`framebuffer`)
//! - the rendering device seam and scoped map/commit/release helpers (`device`)
//!
//! The Python extension module lives in the `pyospray-ffi` crate and only
//! adapts host objects to the types defined here.
//!
//! # Example
//!
//! ```
//! use pyospray_core::marshal::{marshal_numeric, NumericSource};
//! use pyospray_core::types::TypeTag;
//!
//! let vertex = [0.0f32, 0.0, 1.0, 1.0, 0.0, 1.0];
//! let buffer = marshal_numeric(TypeTag::Float3, NumericSource::from_f32(&vertex))?;
//! assert_eq!(buffer.element_count(), 2);
//! # Ok::<(), pyospray_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtin;
pub mod config;
pub mod device;
pub mod error;
pub mod framebuffer;
pub mod handle;
pub mod marshal;
pub mod params;
pub mod types;

pub use config::{BindingConfig, InitArgs};
pub use device::{DataFlags, FrameChannels, FrameMapping, Released, RenderDevice};
pub use error::{Error, Result};
pub use framebuffer::{PixelFormat, PixelRegion};
pub use handle::{resolve_handles, Exposed, HandleRef, RawHandle};
pub use marshal::{marshal, NativeBuffer, NumericSource, Ownership, Source};
pub use types::{StorageKind, TypeSpec, TypeTag};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
