//! Framebuffer pixel codec
//!
//! The rendering library exposes color output as RGBA8 rows stored
//! bottom-to-top. Host code wants top-to-bottom rows, either as raw `rgb` /
//! `rgba` bytes or as a binary PPM file. Both outputs share one transform:
//! output row `y` is source row `height - 1 - y`, and each pixel keeps its
//! first three bytes plus the alpha byte only for `rgba`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::iter::Rev;
use std::path::Path;
use std::slice::ChunksExact;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Bytes per source pixel (RGBA8)
pub const BYTES_PER_PIXEL: usize = 4;

/// Rendered color memory, rows bottom-to-top, 4 bytes per pixel
#[derive(Debug, Clone, Copy)]
pub struct PixelRegion<'a> {
    width: u32,
    height: u32,
    pixels: &'a [u8],
}

impl<'a> PixelRegion<'a> {
    /// Wrap mapped pixel memory, checking it covers exactly `width * height` pixels
    pub fn new(width: u32, height: u32, pixels: &'a [u8]) -> Result<Self> {
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(BYTES_PER_PIXEL);
        if pixels.len() != expected {
            return Err(Error::RegionSizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Wrap pixel memory typed as one `u32` per pixel
    pub fn from_u32(width: u32, height: u32, pixels: &'a [u32]) -> Result<Self> {
        Self::new(width, height, bytemuck::cast_slice(pixels))
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw source bytes
    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }
}

/// Channel layout of codec output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Red, green, blue
    #[default]
    Rgb,
    /// Red, green, blue, alpha
    Rgba,
}

impl PixelFormat {
    /// Number of channels in this layout
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }

    /// Calculate output buffer size in bytes
    pub fn buffer_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.channels()
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "rgb" => Ok(PixelFormat::Rgb),
            "rgba" => Ok(PixelFormat::Rgba),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Yields output rows top-to-bottom, reusing one row buffer
struct RowRepacker<'a> {
    rows: Rev<ChunksExact<'a, u8>>,
    channels: usize,
    row: Vec<u8>,
}

impl<'a> RowRepacker<'a> {
    fn new(region: &PixelRegion<'a>, format: PixelFormat) -> Self {
        let channels = format.channels();
        Self {
            // a zero-width region has no bytes; any non-zero chunk size yields no rows
            rows: region.pixels.chunks_exact(region.row_bytes().max(1)).rev(),
            channels,
            row: vec![0; region.width as usize * channels],
        }
    }

    fn next_row(&mut self) -> Option<&[u8]> {
        let source = self.rows.next()?;
        for (out, pixel) in self
            .row
            .chunks_exact_mut(self.channels)
            .zip(source.chunks_exact(BYTES_PER_PIXEL))
        {
            out.copy_from_slice(&pixel[..self.channels]);
        }
        Some(&self.row)
    }
}

/// Flip and repack `region` into a new top-to-bottom byte buffer.
pub fn to_bytes(region: &PixelRegion<'_>, format: PixelFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(format.buffer_size(region.width, region.height));
    let mut rows = RowRepacker::new(region, format);
    while let Some(row) = rows.next_row() {
        out.extend_from_slice(row);
    }

    tracing::debug!(
        width = region.width,
        height = region.height,
        format = ?format,
        bytes = out.len(),
        "converted framebuffer to bytes"
    );
    out
}

/// [`to_bytes`] with the format given by name (`"rgb"` or `"rgba"`).
pub fn to_bytes_named(region: &PixelRegion<'_>, format: &str) -> Result<Vec<u8>> {
    Ok(to_bytes(region, format.parse()?))
}

/// Serialize `region` as a binary PPM: `P6\n<w> <h>\n255\n`, RGB rows
/// top-to-bottom, then one newline.
pub fn write_ppm<W: Write>(writer: &mut W, region: &PixelRegion<'_>) -> Result<()> {
    write!(writer, "P6\n{} {}\n255\n", region.width, region.height)?;
    let mut rows = RowRepacker::new(region, PixelFormat::Rgb);
    while let Some(row) = rows.next_row() {
        writer.write_all(row)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

/// Write `region` to a PPM file at `path`.
pub fn to_file<P: AsRef<Path>>(path: P, region: &PixelRegion<'_>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "cannot open PPM destination");
        e
    })?;
    let mut writer = BufWriter::new(file);
    write_ppm(&mut writer, region)?;
    writer.flush()?;

    tracing::debug!(
        path = %path.display(),
        width = region.width,
        height = region.height,
        "wrote framebuffer PPM"
    );
    Ok(())
}
