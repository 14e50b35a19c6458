// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Little-endian 32-bit word encoding shared by every payload.
//!
//! All payload items are whole words. Byte blobs are zero-padded up to the next word boundary
//! on write and skipped with the same rule on read, so every instruction starts word-aligned.

use kurbo::Affine;
use peniko::color::Rgba8;

use crate::error::DecodeError;

/// Largest blob accepted by the reader.
pub(crate) const MAX_BLOB_LEN: usize = 1 << 30;

/// Round a byte count up to a whole number of words.
#[inline]
pub(crate) const fn align4(len: usize) -> usize {
    (len + 3) & !3
}

/// Append-only word buffer.
#[derive(Clone, Debug, Default)]
pub(crate) struct WordWriter {
    bytes: Vec<u8>,
}

impl WordWriter {
    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub(crate) fn u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn i32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn f32(&mut self, v: f32) {
        self.u32(v.to_bits());
    }

    pub(crate) fn f64(&mut self, v: f64) {
        self.bytes.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    pub(crate) fn bool(&mut self, v: bool) {
        self.u32(u32::from(v));
    }

    pub(crate) fn color(&mut self, c: Rgba8) {
        self.bytes.extend_from_slice(&[c.r, c.g, c.b, c.a]);
    }

    /// Length-prefixed blob.
    pub(crate) fn blob(&mut self, data: &[u8]) {
        self.u32(blob_len(data.len()));
        self.padded(data);
    }

    /// Raw bytes followed by zero padding, no length prefix.
    pub(crate) fn padded(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
        self.bytes.resize(align4(self.bytes.len()), 0);
    }

    pub(crate) fn affine(&mut self, m: Affine) {
        for c in m.as_coeffs() {
            self.f64(c);
        }
    }
}

/// Blob lengths are capped well below `u32::MAX` before they reach the writer.
#[expect(
    clippy::cast_possible_truncation,
    reason = "callers never produce blobs above MAX_BLOB_LEN"
)]
pub(crate) fn blob_len(len: usize) -> u32 {
    debug_assert!(len <= MAX_BLOB_LEN, "blob of {len} bytes");
    len as u32
}

/// Cursor over a word-aligned byte slice.
#[derive(Clone, Debug)]
pub(crate) struct WordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WordReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Jump to an absolute offset, clamped to the end of the data.
    pub(crate) fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn word(&mut self) -> Result<[u8; 4], DecodeError> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        self.word().map(u32::from_le_bytes)
    }

    pub(crate) fn i32(&mut self) -> Result<i32, DecodeError> {
        self.word().map(i32::from_le_bytes)
    }

    pub(crate) fn f32(&mut self) -> Result<f32, DecodeError> {
        self.u32().map(f32::from_bits)
    }

    pub(crate) fn f64(&mut self) -> Result<f64, DecodeError> {
        let b = self.take(8)?;
        let mut w = [0_u8; 8];
        w.copy_from_slice(b);
        Ok(f64::from_bits(u64::from_le_bytes(w)))
    }

    pub(crate) fn bool(&mut self) -> Result<bool, DecodeError> {
        self.u32().map(|v| v != 0)
    }

    pub(crate) fn color(&mut self) -> Result<Rgba8, DecodeError> {
        let [r, g, b, a] = self.word()?;
        Ok(Rgba8 { r, g, b, a })
    }

    /// Element count that must be backed by at least `min_item_bytes` per element.
    pub(crate) fn count(&mut self, min_item_bytes: usize) -> Result<usize, DecodeError> {
        let n = self.u32()? as usize;
        let needed = n.saturating_mul(min_item_bytes);
        if needed > self.remaining() {
            return Err(DecodeError::Truncated {
                needed,
                available: self.remaining(),
            });
        }
        Ok(n)
    }

    pub(crate) fn blob(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.u32()? as usize;
        if len > MAX_BLOB_LEN {
            return Err(DecodeError::BlobTooLarge(len));
        }
        self.padded(len)
    }

    pub(crate) fn padded(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let with_pad = self.take(align4(len))?;
        Ok(&with_pad[..len])
    }

    pub(crate) fn affine(&mut self) -> Result<Affine, DecodeError> {
        let mut c = [0.0; 6];
        for v in &mut c {
            *v = self.f64()?;
        }
        Ok(Affine::new(c))
    }
}
