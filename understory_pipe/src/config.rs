// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording and playback configuration.

use std::sync::Arc;

use understory_bbh::RTreeConfig;

use crate::error::ConfigError;
use crate::typeface::FontRegistry;

bitflags::bitflags! {
    /// How the consumer of a stream relates to its producer.
    ///
    /// The low four bits travel in the stream's `ReportFlags` instruction.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RecordFlags: u8 {
        /// The consumer lives in another process.
        const CROSS_PROCESS = 1 << 0;
        /// The consumer can read producer memory, so bitmaps go through the shared heap even
        /// when crossing processes.
        const SHARED_ADDRESS_SPACE = 1 << 1;
        /// Build a spatial index so playback can skip instructions outside the viewport.
        const OPTIMIZE_FOR_CLIPPED_PLAYBACK = 1 << 2;
    }
}

impl RecordFlags {
    /// Bitmaps are serialized into the stream rather than placed in the shared heap.
    pub fn flattens_bitmaps(self) -> bool {
        self.contains(Self::CROSS_PROCESS) && !self.contains(Self::SHARED_ADDRESS_SPACE)
    }

    /// The heap may keep references to immutable bitmaps instead of copying them.
    pub fn shallow_heap(self) -> bool {
        !self.contains(Self::CROSS_PROCESS)
    }
}

/// Default minimum size of a block requested from a controller.
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 16 * 1024;

/// Default device extent; the largest coordinate the rasterizer accepts.
pub const DEFAULT_DEVICE_SIZE: u32 = 32767;

/// Settings for a recording surface.
#[derive(Clone, Debug)]
pub struct RecordConfig {
    /// Producer/consumer relationship.
    pub flags: RecordFlags,
    /// Smallest block the writer asks its controller for.
    pub min_block_size: usize,
    /// Device width; the initial clip is `0..width`.
    pub device_width: u32,
    /// Device height; the initial clip is `0..height`.
    pub device_height: u32,
    /// Fan-out of the spatial index built for clipped playback.
    pub rtree: RTreeConfig,
    /// Registry that same-process typefaces are published to.
    pub fonts: Arc<FontRegistry>,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            flags: RecordFlags::empty(),
            min_block_size: DEFAULT_MIN_BLOCK_SIZE,
            device_width: DEFAULT_DEVICE_SIZE,
            device_height: DEFAULT_DEVICE_SIZE,
            rtree: RTreeConfig::default(),
            fonts: Arc::new(FontRegistry::new()),
        }
    }
}

impl RecordConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stream flags.
    pub fn with_flags(mut self, flags: RecordFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the minimum block size.
    pub fn with_min_block_size(mut self, bytes: usize) -> Self {
        self.min_block_size = bytes;
        self
    }

    /// Set the device extent.
    pub fn with_device_size(mut self, width: u32, height: u32) -> Self {
        self.device_width = width;
        self.device_height = height;
        self
    }

    /// Set the spatial index fan-out.
    pub fn with_rtree(mut self, rtree: RTreeConfig) -> Self {
        self.rtree = rtree;
        self
    }

    /// Share a font registry with consumers.
    pub fn with_fonts(mut self, fonts: Arc<FontRegistry>) -> Self {
        self.fonts = fonts;
        self
    }

    /// Check that the settings can be honored together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flags.contains(RecordFlags::CROSS_PROCESS)
            && self
                .flags
                .contains(RecordFlags::OPTIMIZE_FOR_CLIPPED_PLAYBACK)
        {
            return Err(ConfigError::IndexNotSerializable);
        }
        if self.min_block_size < 4 {
            return Err(ConfigError::BlockTooSmall(self.min_block_size));
        }
        Ok(())
    }
}

/// Default bound on save nesting during playback.
pub const DEFAULT_MAX_SAVE_DEPTH: usize = 1024;

/// Settings for a playback session.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Registry that typeface definitions are resolved through.
    pub fonts: Arc<FontRegistry>,
    /// Deepest save nesting accepted before the stream is treated as hostile.
    pub max_save_depth: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fonts: Arc::new(FontRegistry::new()),
            max_save_depth: DEFAULT_MAX_SAVE_DEPTH,
        }
    }
}

impl PlaybackConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve typefaces through `fonts`.
    pub fn with_fonts(mut self, fonts: Arc<FontRegistry>) -> Self {
        self.fonts = fonts;
        self
    }

    /// Set the save nesting bound.
    pub fn with_max_save_depth(mut self, depth: usize) -> Self {
        self.max_save_depth = depth;
        self
    }
}
