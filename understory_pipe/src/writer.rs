// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flow-controlled block writer.
//!
//! The writer never allocates stream memory itself. It asks a [`PipeController`] for blocks
//! and reports every run of bytes it finishes writing. A controller that refuses a block
//! closes the writer for good: later writes are dropped silently and the stream simply ends
//! early. The producer-side API therefore never fails.

use crate::op::{DrawOp, Header};

/// Consumer side of a pipe, as seen by the producer.
pub trait PipeController {
    /// Hand over a block of at least `min_size` bytes, or `None` to stop the stream.
    ///
    /// The length of the returned buffer is the room granted. A shorter buffer than requested
    /// is treated like a refusal.
    fn request_block(&mut self, min_size: usize) -> Option<Vec<u8>>;

    /// Bytes written since the last notification, in stream order.
    fn notify_written(&mut self, bytes: &[u8]);
}

impl<C: PipeController + ?Sized> PipeController for &mut C {
    fn request_block(&mut self, min_size: usize) -> Option<Vec<u8>> {
        (**self).request_block(min_size)
    }

    fn notify_written(&mut self, bytes: &[u8]) {
        (**self).notify_written(bytes);
    }
}

/// Writes instructions into controller-provided blocks.
#[derive(Debug)]
pub struct BlockWriter<C> {
    controller: C,
    block: Vec<u8>,
    used: usize,
    notified: usize,
    min_block_size: usize,
    done: bool,
    total_written: usize,
}

impl<C: PipeController> BlockWriter<C> {
    /// Writer that asks for blocks of at least `min_block_size` bytes.
    pub fn new(controller: C, min_block_size: usize) -> Self {
        Self {
            controller,
            block: Vec::new(),
            used: 0,
            notified: 0,
            min_block_size,
            done: false,
            total_written: 0,
        }
    }

    /// Make sure `n` more bytes fit.
    ///
    /// Pending bytes are reported before a new block is requested. Returns `false` once the
    /// controller has refused a block, and forever after.
    pub fn ensure_capacity(&mut self, n: usize) -> bool {
        if self.done {
            return false;
        }
        if self.block.len() - self.used >= n {
            return true;
        }
        self.notify();
        let wanted = n.max(self.min_block_size);
        match self.controller.request_block(wanted) {
            Some(block) if block.len() >= n => {
                self.block = block;
                self.used = 0;
                self.notified = 0;
                true
            }
            granted => {
                tracing::warn!(
                    requested = wanted,
                    granted = granted.map_or(0, |b| b.len()),
                    written = self.total_written,
                    "controller refused a block; closing the pipe"
                );
                self.done = true;
                self.block = Vec::new();
                self.used = 0;
                self.notified = 0;
                false
            }
        }
    }

    /// Append `bytes` as one unit. Returns `false` and writes nothing if they do not fit.
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        if !self.ensure_capacity(bytes.len()) {
            return false;
        }
        self.block[self.used..self.used + bytes.len()].copy_from_slice(bytes);
        self.used += bytes.len();
        self.total_written += bytes.len();
        true
    }

    /// Report bytes written since the last notification.
    pub fn notify(&mut self) {
        if self.used > self.notified {
            self.controller
                .notify_written(&self.block[self.notified..self.used]);
            self.notified = self.used;
        }
    }

    /// Terminate the stream with a `Done` instruction if it is still open.
    pub fn finish(&mut self) {
        if self.done {
            return;
        }
        self.write(&Header::new(DrawOp::Done).encode().to_le_bytes());
        self.notify();
        self.done = true;
    }

    /// Returns `true` once the stream is closed, by refusal or by [`finish`](Self::finish).
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes accepted so far.
    pub fn total_written(&self) -> usize {
        self.total_written
    }

    /// The controller.
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// The controller, mutably.
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }
}

/// Controller that collects the stream into memory.
///
/// Block size and count can be capped to simulate a consumer that stalls.
#[derive(Clone, Debug, Default)]
pub struct MemoryController {
    stream: Vec<u8>,
    block_size: Option<usize>,
    max_blocks: Option<usize>,
    blocks_granted: usize,
    notifications: usize,
}

impl MemoryController {
    /// Controller that grants every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant exactly `bytes` per block, whatever is requested.
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = Some(bytes);
        self
    }

    /// Refuse every request after `n` blocks.
    pub fn with_max_blocks(mut self, n: usize) -> Self {
        self.max_blocks = Some(n);
        self
    }

    /// Everything notified so far.
    pub fn bytes(&self) -> &[u8] {
        &self.stream
    }

    /// Take the collected bytes, leaving the controller empty.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.stream)
    }

    /// Number of blocks handed out.
    pub fn blocks_granted(&self) -> usize {
        self.blocks_granted
    }

    /// Number of notifications received.
    pub fn notifications(&self) -> usize {
        self.notifications
    }
}

impl PipeController for MemoryController {
    fn request_block(&mut self, min_size: usize) -> Option<Vec<u8>> {
        if self.max_blocks.is_some_and(|max| self.blocks_granted >= max) {
            return None;
        }
        self.blocks_granted += 1;
        Some(vec![0; self.block_size.unwrap_or(min_size)])
    }

    fn notify_written(&mut self, bytes: &[u8]) {
        self.notifications += 1;
        self.stream.extend_from_slice(bytes);
    }
}
