//! Opaque native handles and the resolver that packs them
//!
//! Wrapper objects (scene objects created by the host) expose their native
//! handle through [`HandleRef`]. [`resolve_handles`] turns an ordered
//! sequence of wrappers into a dense array of [`RawHandle`] values, or fails
//! without returning any partial array.

use std::ffi::c_void;

use bytemuck::{Pod, Zeroable};

use crate::{Error, Result};

/// Raw handle to an object owned by the rendering library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct RawHandle(usize);

impl RawHandle {
    /// Wrap a handle given as an address
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Wrap a handle given as a pointer
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// Handle as an address
    pub const fn addr(self) -> usize {
        self.0
    }

    /// Handle as the pointer the native API expects
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

/// Outcome of asking a wrapper for its native handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exposed {
    /// The wrapper holds this handle
    Handle(RawHandle),
    /// The wrapper has no native handle at all
    Missing,
    /// The wrapper exposes something else; the string describes it
    Mismatch(String),
}

/// Capability of yielding an underlying native handle.
///
/// Implemented by every wrapper variant that can be placed in a handle list.
pub trait HandleRef {
    /// Expose the native handle this value wraps
    fn expose_handle(&self) -> Exposed;
}

impl HandleRef for RawHandle {
    fn expose_handle(&self) -> Exposed {
        Exposed::Handle(*self)
    }
}

impl<T: HandleRef + ?Sized> HandleRef for &T {
    fn expose_handle(&self) -> Exposed {
        (**self).expose_handle()
    }
}

impl<T: HandleRef + ?Sized> HandleRef for Box<T> {
    fn expose_handle(&self) -> Exposed {
        (**self).expose_handle()
    }
}

impl<T: HandleRef> HandleRef for Option<T> {
    fn expose_handle(&self) -> Exposed {
        match self {
            Some(inner) => inner.expose_handle(),
            None => Exposed::Missing,
        }
    }
}

/// Resolve every wrapper to its raw handle, preserving order.
///
/// All-or-nothing: the first element that cannot be resolved aborts the call
/// and the handles collected so far are dropped.
pub fn resolve_handles<I>(objects: I) -> Result<Box<[RawHandle]>>
where
    I: IntoIterator,
    I::Item: HandleRef,
{
    let handles = objects
        .into_iter()
        .enumerate()
        .map(|(index, object)| match object.expose_handle() {
            Exposed::Handle(handle) => Ok(handle),
            Exposed::Missing => Err(Error::MissingHandleCapability { index }),
            Exposed::Mismatch(found) => Err(Error::HandleTypeMismatch { index, found }),
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(count = handles.len(), "resolved native handles");
    Ok(handles.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Wrapper(Exposed);

    impl HandleRef for Wrapper {
        fn expose_handle(&self) -> Exposed {
            self.0.clone()
        }
    }

    #[test]
    fn test_resolve_preserves_order() {
        let objects = [
            RawHandle::from_addr(0x30),
            RawHandle::from_addr(0x10),
            RawHandle::from_addr(0x20),
        ];
        let handles = resolve_handles(&objects).unwrap();
        assert_eq!(&*handles, &objects);
    }

    #[test]
    fn test_missing_capability_reports_index() {
        let objects = vec![
            Some(RawHandle::from_addr(1)),
            Some(RawHandle::from_addr(2)),
            None,
            Some(RawHandle::from_addr(4)),
        ];
        match resolve_handles(&objects) {
            Err(Error::MissingHandleCapability { index }) => assert_eq!(index, 2),
            other => panic!("expected MissingHandleCapability, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatch_reports_found() {
        let objects = [
            Wrapper(Exposed::Handle(RawHandle::from_addr(8))),
            Wrapper(Exposed::Mismatch("str".to_string())),
        ];
        match resolve_handles(&objects) {
            Err(Error::HandleTypeMismatch { index, found }) => {
                assert_eq!(index, 1);
                assert_eq!(found, "str");
            }
            other => panic!("expected HandleTypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_first_failure_wins() {
        let objects = [
            Wrapper(Exposed::Missing),
            Wrapper(Exposed::Mismatch("float".to_string())),
        ];
        assert!(matches!(
            resolve_handles(&objects),
            Err(Error::MissingHandleCapability { index: 0 })
        ));
    }

    #[test]
    fn test_empty_sequence() {
        let objects: [RawHandle; 0] = [];
        assert!(resolve_handles(&objects).unwrap().is_empty());
    }

    #[test]
    fn test_boxed_trait_objects() {
        let objects: Vec<Box<dyn HandleRef>> = vec![
            Box::new(RawHandle::from_addr(5)),
            Box::new(Some(RawHandle::from_addr(6))),
        ];
        let handles = resolve_handles(&objects).unwrap();
        assert_eq!(handles[0].addr(), 5);
        assert_eq!(handles[1].addr(), 6);
    }
}
