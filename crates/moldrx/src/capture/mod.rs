// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Raw-frame capture path for the multicast feed.
//!
//! Bypasses the UDP socket stack: a capture backend hands out whole
//! link-layer frames, [`FrameFilter`] dissects them, and feed payloads are
//! decoded in place with zero copies. Frames are pool-owned; the pipeline
//! returns every frame to its pool before the burst ends.
//!
//! # Modules
//!
//! - `backend` - frame source trait shared by all backends
//! - `afpacket` - AF_PACKET TPACKET_V2 mmap ring (Linux)
//! - `heap` - heap-buffer pool for tests and replay
//! - `frame` - Ethernet/IPv4/UDP dissection and feed filtering
//! - `burst` - the burst receive pipeline

/// AF_PACKET TPACKET_V2 mmap ring backend.
#[cfg(target_os = "linux")]
pub mod afpacket;
/// Frame source trait shared by all backends.
pub mod backend;
/// Burst receive pipeline over a capture backend.
pub mod burst;
/// Ethernet/IPv4/UDP dissection and feed filtering.
pub mod frame;
/// Heap-buffer pool backend for tests and replay.
pub mod heap;

#[cfg(target_os = "linux")]
pub use afpacket::AfPacketBackend;
pub use backend::{CaptureBackend, FrameToken};
pub use burst::{BurstReceiver, CaptureStats};
pub use frame::{FrameClass, FrameFilter, SkipReason};
pub use heap::HeapBackend;
