// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bitmaps over shared, generation-stamped pixel storage.
//!
//! Several bitmaps can view one [`PixelStorage`] at different byte offsets (subsets). Every
//! storage carries a generation id that changes whenever its bytes change, so two bitmaps with
//! the same generation id and offset show the same pixels.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{BitmapError, DecodeError};
use crate::geometry::IRect;
use crate::words::{WordReader, WordWriter};

static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

fn next_generation() -> u32 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Pixel layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelFormat {
    /// 8-bit coverage.
    Alpha8 = 0,
    /// 16-bit 5-6-5 color.
    Rgb565 = 1,
    /// 32-bit RGBA.
    Rgba8888 = 2,
    /// 32-bit BGRA.
    Bgra8888 = 3,
    /// 8-bit palette index. The palette is not modeled, so these cannot be copied.
    Index8 = 4,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Alpha8 | Self::Index8 => 1,
            Self::Rgb565 => 2,
            Self::Rgba8888 | Self::Bgra8888 => 4,
        }
    }

    /// Whether pixels in this layout can be duplicated.
    pub const fn can_copy(self) -> bool {
        !matches!(self, Self::Index8)
    }

    fn from_u32(v: u32) -> Result<Self, DecodeError> {
        Ok(match v {
            0 => Self::Alpha8,
            1 => Self::Rgb565,
            2 => Self::Rgba8888,
            3 => Self::Bgra8888,
            4 => Self::Index8,
            _ => return Err(DecodeError::invalid("pixel format", v)),
        })
    }
}

/// Pixel bytes plus their generation id.
#[derive(Debug)]
pub struct PixelStorage {
    generation_id: u32,
    bytes: Box<[u8]>,
}

impl PixelStorage {
    fn new(bytes: Box<[u8]>) -> Arc<Self> {
        Arc::new(Self {
            generation_id: next_generation(),
            bytes,
        })
    }

    /// Generation id of the current contents.
    pub fn generation_id(&self) -> u32 {
        self.generation_id
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for zero-sized storage.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A view of `width × height` pixels inside a [`PixelStorage`].
#[derive(Clone, Debug)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: PixelFormat,
    row_bytes: usize,
    storage: Arc<PixelStorage>,
    offset: usize,
    immutable: bool,
}

impl Bitmap {
    /// Bitmap over tightly packed rows.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Result<Self, BitmapError> {
        let row_bytes = width as usize * format.bytes_per_pixel();
        Self::with_row_bytes(width, height, format, row_bytes, pixels)
    }

    /// Bitmap over rows `row_bytes` apart.
    pub fn with_row_bytes(
        width: u32,
        height: u32,
        format: PixelFormat,
        row_bytes: usize,
        pixels: Vec<u8>,
    ) -> Result<Self, BitmapError> {
        let bitmap = Self {
            width,
            height,
            format,
            row_bytes,
            storage: PixelStorage::new(pixels.into_boxed_slice()),
            offset: 0,
            immutable: false,
        };
        bitmap.check_geometry()?;
        Ok(bitmap)
    }

    fn check_geometry(&self) -> Result<(), BitmapError> {
        let line = self.width as usize * self.format.bytes_per_pixel();
        if self.row_bytes < line {
            return Err(BitmapError::Geometry);
        }
        let end = match self.height {
            0 => self.offset,
            h => (h as usize - 1)
                .checked_mul(self.row_bytes)
                .and_then(|v| v.checked_add(self.offset + line))
                .ok_or(BitmapError::Geometry)?,
        };
        if end > self.storage.len() {
            return Err(BitmapError::Geometry);
        }
        Ok(())
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Distance between rows in bytes.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Byte offset of the first pixel inside the storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Content version of the underlying storage.
    pub fn generation_id(&self) -> u32 {
        self.storage.generation_id
    }

    /// Underlying storage.
    pub fn storage(&self) -> &Arc<PixelStorage> {
        &self.storage
    }

    /// Returns `true` if both bitmaps view the same storage allocation.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Whether the pixels are promised never to change.
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Promise that the pixels never change. Cannot be undone.
    pub fn set_immutable(&mut self) {
        self.immutable = true;
    }

    /// Bitmap with the same pixels that is marked immutable.
    pub fn into_immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// View of a sub-rectangle sharing this bitmap's storage.
    ///
    /// Returns `None` if `r` is empty or not fully inside the bitmap.
    pub fn extract_subset(&self, r: IRect) -> Option<Self> {
        if r.is_empty() || r.left < 0 || r.top < 0 {
            return None;
        }
        if r.right.unsigned_abs() > self.width || r.bottom.unsigned_abs() > self.height {
            return None;
        }
        let offset = self.offset
            + r.top.unsigned_abs() as usize * self.row_bytes
            + r.left.unsigned_abs() as usize * self.format.bytes_per_pixel();
        Some(Self {
            width: r.width(),
            height: r.height(),
            format: self.format,
            row_bytes: self.row_bytes,
            storage: Arc::clone(&self.storage),
            offset,
            immutable: self.immutable,
        })
    }

    /// Same geometry and offset as `self`, over another storage.
    pub(crate) fn with_storage(&self, storage: Arc<PixelStorage>) -> Result<Self, BitmapError> {
        let out = Self {
            storage,
            ..self.clone()
        };
        out.check_geometry()?;
        Ok(out)
    }

    /// One row of visible pixels.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = self.offset + y as usize * self.row_bytes;
        let len = self.width as usize * self.format.bytes_per_pixel();
        self.storage.bytes.get(start..start + len)
    }

    /// Visible pixels, rows packed tightly.
    pub fn read_pixels(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(self.width as usize * self.height as usize * self.format.bytes_per_pixel());
        for y in 0..self.height {
            if let Some(row) = self.row(y) {
                out.extend_from_slice(row);
            }
        }
        out
    }

    /// Mutable access to the whole storage.
    ///
    /// Storage shared with other bitmaps is copied first. Either way the storage gets a fresh
    /// generation id. Returns `None` for immutable bitmaps.
    pub fn storage_mut(&mut self) -> Option<&mut [u8]> {
        if self.immutable {
            return None;
        }
        if Arc::get_mut(&mut self.storage).is_none() {
            self.storage = PixelStorage::new(self.storage.bytes.clone());
        }
        let storage = Arc::get_mut(&mut self.storage)?;
        storage.generation_id = next_generation();
        Some(&mut storage.bytes)
    }

    /// Duplicate the storage, keeping geometry and offset.
    ///
    /// The copy has a new generation id and is mutable.
    pub fn deep_copy(&self) -> Result<Self, BitmapError> {
        if !self.format.can_copy() {
            return Err(BitmapError::UnsupportedFormat(self.format));
        }
        Ok(Self {
            storage: PixelStorage::new(self.storage.bytes.clone()),
            immutable: false,
            ..self.clone()
        })
    }

    /// Serialize the visible pixels.
    pub(crate) fn flatten(&self) -> Vec<u8> {
        let mut w = WordWriter::default();
        w.u32(self.width);
        w.u32(self.height);
        w.u32(self.format as u32);
        w.blob(&self.read_pixels());
        w.into_bytes()
    }

    /// Rebuild a bitmap from [`flatten`](Self::flatten) output. The result is immutable.
    pub(crate) fn unflatten(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = WordReader::new(bytes);
        let width = r.u32()?;
        let height = r.u32()?;
        let format = PixelFormat::from_u32(r.u32()?)?;
        let pixels = r.blob()?.to_vec();
        let len = pixels.len();
        Self::new(width, height, format, pixels)
            .map(Self::into_immutable)
            .map_err(|_| DecodeError::invalid("bitmap size", crate::words::blob_len(len)))
    }
}
