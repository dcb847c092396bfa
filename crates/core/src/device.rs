//! Rendering device seam
//!
//! [`RenderDevice`] is the narrow slice of the rendering library the binding
//! talks to: data creation, commit/release, parameter setters, frame
//! rendering and framebuffer mapping. The helpers here sequence those calls
//! so that owned buffers outlive the consuming call and every mapped frame
//! is unmapped exactly once.

use std::path::Path;
use std::ptr::NonNull;

use bitflags::bitflags;

use crate::framebuffer::{self, PixelFormat, PixelRegion, BYTES_PER_PIXEL};
use crate::handle::{Exposed, HandleRef, RawHandle};
use crate::marshal::{marshal, NativeBuffer, Source};
use crate::params::{normalize_name, ParamArg, ParamType, ParamValue};
use crate::types::TypeTag;
use crate::{Error, Result};

bitflags! {
    /// Flags passed when creating a data object
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DataFlags: u32 {
        /// Library reads caller memory directly instead of copying it
        const SHARED_BUFFER = 1 << 0;
    }
}

bitflags! {
    /// Framebuffer channels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameChannels: u32 {
        /// RGBA8 color
        const COLOR = 1 << 0;
        /// Depth
        const DEPTH = 1 << 1;
        /// Accumulation buffer
        const ACCUM = 1 << 2;
        /// Variance estimate
        const VARIANCE = 1 << 3;
    }
}

/// Framebuffer memory handed out by [`RenderDevice::map_frame`]
#[derive(Debug)]
pub struct MappedFrame {
    ptr: NonNull<u8>,
    width: u32,
    height: u32,
}

impl MappedFrame {
    /// Describe a mapped color channel.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `width * height * 4` bytes until the
    /// frame is passed back to [`RenderDevice::unmap_frame`], and the memory
    /// must not be written during that time.
    pub unsafe fn new(ptr: NonNull<u8>, width: u32, height: u32) -> Self {
        Self { ptr, width, height }
    }

    /// Base address of the mapped pixels
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }
}

/// Operations the binding needs from the rendering library
pub trait RenderDevice {
    /// Create a data object over `buffer`'s memory
    fn new_data(&mut self, buffer: &NativeBuffer<'_>, flags: DataFlags) -> Result<RawHandle>;

    /// Commit pending parameter changes of `object`
    fn commit(&mut self, object: RawHandle) -> Result<()>;

    /// Drop the caller's reference to `object`
    fn release(&mut self, object: RawHandle);

    /// Assign a named parameter on `object`
    fn set_param(&mut self, object: RawHandle, name: &str, value: &ParamValue) -> Result<()>;

    /// Render one frame into `framebuffer`, returning the variance estimate
    fn render_frame(
        &mut self,
        framebuffer: RawHandle,
        renderer: RawHandle,
        channels: FrameChannels,
    ) -> Result<f32>;

    /// Map one channel of `framebuffer` for reading
    fn map_frame(&mut self, framebuffer: RawHandle, channel: FrameChannels) -> Result<MappedFrame>;

    /// Return memory obtained from [`RenderDevice::map_frame`]
    fn unmap_frame(&mut self, framebuffer: RawHandle, frame: MappedFrame);
}

/// Scoped view of a mapped color channel; unmaps on drop
pub struct FrameMapping<'d, D: RenderDevice + ?Sized> {
    device: &'d mut D,
    framebuffer: RawHandle,
    frame: Option<MappedFrame>,
}

impl<'d, D: RenderDevice + ?Sized> FrameMapping<'d, D> {
    /// Map the color channel of `framebuffer`
    pub fn color(device: &'d mut D, framebuffer: RawHandle) -> Result<Self> {
        let frame = device.map_frame(framebuffer, FrameChannels::COLOR)?;
        tracing::debug!(
            framebuffer = framebuffer.addr(),
            width = frame.width,
            height = frame.height,
            "mapped framebuffer"
        );
        Ok(Self {
            device,
            framebuffer,
            frame: Some(frame),
        })
    }

    /// Pixel region backed by the mapped memory
    pub fn region(&self) -> Result<PixelRegion<'_>> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| Error::Device("framebuffer is no longer mapped".to_string()))?;
        // SAFETY: MappedFrame::new guarantees the range is readable until unmap,
        // and unmap only happens in Drop, after every borrow of self has ended.
        let pixels = unsafe { std::slice::from_raw_parts(frame.as_ptr(), frame.byte_len()) };
        PixelRegion::new(frame.width, frame.height, pixels)
    }
}

impl<D: RenderDevice + ?Sized> Drop for FrameMapping<'_, D> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.device.unmap_frame(self.framebuffer, frame);
            tracing::debug!(framebuffer = self.framebuffer.addr(), "unmapped framebuffer");
        }
    }
}

/// Device object that is released when the guard drops
pub struct Released<'d, D: RenderDevice + ?Sized> {
    device: &'d mut D,
    handle: RawHandle,
}

impl<'d, D: RenderDevice + ?Sized> Released<'d, D> {
    /// Take over the caller's reference to `handle`
    pub fn new(device: &'d mut D, handle: RawHandle) -> Self {
        Self { device, handle }
    }

    /// Guarded handle
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Device, for calls made while the object is held
    pub fn device(&mut self) -> &mut D {
        self.device
    }
}

impl<D: RenderDevice + ?Sized> HandleRef for Released<'_, D> {
    fn expose_handle(&self) -> Exposed {
        Exposed::Handle(self.handle)
    }
}

impl<D: RenderDevice + ?Sized> Drop for Released<'_, D> {
    fn drop(&mut self) {
        self.device.release(self.handle);
    }
}

/// Run `f` against `object`, then commit it.
///
/// Nothing is committed when `f` fails.
pub fn commit_scoped<D, T, F>(device: &mut D, object: RawHandle, f: F) -> Result<T>
where
    D: RenderDevice + ?Sized,
    F: FnOnce(&mut D) -> Result<T>,
{
    let value = f(device)?;
    device.commit(object)?;
    Ok(value)
}

/// Marshal `source`, create a data object from it and commit it.
///
/// An owned handle array lives until `new_data` has returned and is freed
/// before this function returns.
pub fn upload<D, R>(
    device: &mut D,
    tag: TypeTag,
    source: Source<'_, R>,
    flags: DataFlags,
) -> Result<RawHandle>
where
    D: RenderDevice + ?Sized,
    R: HandleRef,
{
    let buffer = marshal(tag, source)?;
    let data = device.new_data(&buffer, flags)?;
    drop(buffer);

    device.commit(data)?;
    tracing::debug!(tag = %tag, data = data.addr(), "uploaded data object");
    Ok(data)
}

/// Assign a host attribute to `object`, dispatching on its documented type.
pub fn assign_param<D: RenderDevice + ?Sized>(
    device: &mut D,
    object: RawHandle,
    attribute: &str,
    doc_type: &str,
    args: &[ParamArg],
) -> Result<()> {
    let name = normalize_name(attribute)?;
    let value = ParamType::parse(doc_type)?.setter().bind(args)?;
    device.set_param(object, &name, &value)
}

/// Map the color channel, convert it and unmap.
pub fn read_framebuffer<D: RenderDevice + ?Sized>(
    device: &mut D,
    framebuffer: RawHandle,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let mapping = FrameMapping::color(device, framebuffer)?;
    let region = mapping.region()?;
    Ok(framebuffer::to_bytes(&region, format))
}

/// Map the color channel, write it to a PPM file at `path` and unmap.
pub fn write_framebuffer_ppm<D, P>(device: &mut D, framebuffer: RawHandle, path: P) -> Result<()>
where
    D: RenderDevice + ?Sized,
    P: AsRef<Path>,
{
    let mapping = FrameMapping::color(device, framebuffer)?;
    let region = mapping.region()?;
    framebuffer::to_file(path, &region)
}
