// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use crate::playback::PlaybackState;

/// Byte-level corruption found while decoding an instruction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The instruction ends past the end of the available bytes.
    #[error("truncated payload: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the decoder tried to read.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },
    /// Header carries an opcode this reader does not know.
    #[error("unknown draw opcode {0}")]
    UnknownDrawOp(u8),
    /// Paint instruction contains an unknown paint opcode.
    #[error("unknown paint opcode {0}")]
    UnknownPaintOp(u8),
    /// An enumerated field holds an out-of-range value.
    #[error("invalid {what} value {value}")]
    InvalidValue {
        /// Field being decoded.
        what: &'static str,
        /// Raw value found.
        value: u32,
    },
    /// A handle refers to a resource that was never defined.
    #[error("undefined {kind} handle {handle}")]
    UndefinedHandle {
        /// Resource table.
        kind: &'static str,
        /// Handle found.
        handle: u32,
    },
    /// A definition arrived with a handle other than the next one in sequence.
    #[error("{kind} definition out of order: expected handle {expected}, found {found}")]
    DefinitionOrder {
        /// Resource table.
        kind: &'static str,
        /// Next handle the reader expected.
        expected: u32,
        /// Handle carried by the instruction.
        found: u32,
    },
    /// An effect was placed into a paint slot of a different kind.
    #[error("effect of kind {found} placed in slot {slot}")]
    SlotMismatch {
        /// Slot index named by the instruction.
        slot: u8,
        /// Slot index the effect belongs to.
        found: u8,
    },
    /// A blob length exceeds what the stream format allows.
    #[error("blob length {0} out of range")]
    BlobTooLarge(usize),
}

impl DecodeError {
    pub(crate) fn invalid(what: &'static str, value: u32) -> Self {
        Self::InvalidValue { what, value }
    }

    pub(crate) fn undefined(kind: &'static str, handle: u32) -> Self {
        Self::UndefinedHandle { kind, handle }
    }
}

/// Errors reported by a playback session.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// An instruction could not be decoded. The reader is now [`PlaybackState::Failed`].
    #[error("corrupt instruction at byte {offset}: {source}")]
    Corrupt {
        /// Byte offset of the instruction header within the buffer passed to playback.
        offset: usize,
        /// What was wrong with it.
        #[source]
        source: DecodeError,
    },
    /// Save nesting went past the configured bound.
    #[error("save depth exceeded the limit of {limit}")]
    SaveDepthExceeded {
        /// Configured maximum.
        limit: usize,
    },
    /// Playback was requested after the session ended.
    #[error("playback session already ended ({0:?})")]
    Terminated(PlaybackState),
}

/// A bitmap could not be duplicated.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapError {
    /// Pixel layout has no copy routine.
    #[error("pixel format {0:?} cannot be copied")]
    UnsupportedFormat(crate::bitmap::PixelFormat),
    /// Width, height and row stride do not fit the storage.
    #[error("bitmap geometry does not fit its pixel storage")]
    Geometry,
}

/// A recording configuration was rejected.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The spatial index lives only in memory and cannot travel with a cross-process stream.
    #[error("clipped-playback optimization cannot be combined with cross-process recording")]
    IndexNotSerializable,
    /// Block size must be at least one instruction header.
    #[error("minimum block size {0} is smaller than one instruction word")]
    BlockTooSmall(usize),
}
