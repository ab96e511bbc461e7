// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Capture backend trait - frame source abstraction for the burst pipeline.

use std::io;

/// Handle to one frame held out of a backend's pool.
///
/// Tokens are only meaningful to the backend that issued them and only
/// between `rx_burst` and `release`.
pub type FrameToken = u32;

/// Frame source for [`BurstReceiver`](crate::capture::BurstReceiver).
///
/// Implemented by:
/// - `AfPacketBackend`: AF_PACKET mmap ring on Linux, kernel-shared frames
/// - `HeapBackend`: heap-buffer pool for tests and synthetic replay
///
/// Every token returned by `rx_burst` MUST be released exactly once. The
/// frame bytes behind a token stay valid until its release and must not be
/// read after; backends recycle the buffer to the kernel or the free list
/// at that point.
pub trait CaptureBackend {
    /// Fetch up to `max` ready frames without blocking.
    ///
    /// Appends tokens to `out` and returns how many were added. Zero means
    /// the ring is currently empty, not end of stream.
    ///
    /// # Errors
    ///
    /// Propagates device errors; an empty ring is not an error.
    fn rx_burst(&mut self, max: usize, out: &mut Vec<FrameToken>) -> io::Result<usize>;

    /// Raw bytes of a held frame, starting at the Ethernet header.
    fn frame(&self, token: FrameToken) -> &[u8];

    /// Return a frame to the pool.
    ///
    /// # Errors
    ///
    /// Rejects tokens that are not currently held (double release).
    fn release(&mut self, token: FrameToken) -> Result<(), &'static str>;
}
