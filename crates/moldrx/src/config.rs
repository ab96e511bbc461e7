// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! moldrx global configuration - single source of truth.
//!
//! This module centralizes feed addressing and receive-path sizing constants.
//! **Never hardcode these elsewhere!** Wire-format offsets live next to the
//! codec in [`crate::protocol::header`]; everything operational lives here.

use std::net::Ipv4Addr;

// =======================================================================
// Feed Addressing
// Vendor feeds announce a multicast group + UDP port pair; these are the
// defaults used by the tools when none is given on the command line.
// =======================================================================

/// Default multicast group carrying the feed (239.1.1.1)
pub const MULTICAST_IP: [u8; 4] = [239, 1, 1, 1];

/// String version of [`MULTICAST_IP`] (for CLI defaults and parsing)
pub const MULTICAST_GROUP: &str = "239.1.1.1";

/// Default UDP port the feed is published on
pub const MULTICAST_PORT: u16 = 9000;

/// Default multicast group as a typed address
#[must_use]
pub fn default_group() -> Ipv4Addr {
    Ipv4Addr::from(MULTICAST_IP)
}

// =======================================================================
// Socket Receiver (Pipeline A)
// =======================================================================

/// Receive buffer capacity in bytes.
///
/// Sized to the maximum MoldUDP64 datagram the feed emits. Oversized
/// datagrams truncate per normal datagram semantics; the decoder then
/// reports the truncation.
pub const RECV_BUFFER_SIZE: usize = 1400;

/// Readiness-poll timeout for the cancellable receive loop (milliseconds).
///
/// `UdpReceiver::run` wakes at least this often to check its cancel token.
pub const RECV_POLL_INTERVAL_MS: u64 = 1;

// =======================================================================
// Burst Capture (Pipeline B)
// =======================================================================

/// Maximum frames pulled from the capture backend per poll call
pub const BURST_SIZE: usize = 32;

/// Idle back-off between empty polls in `BurstReceiver::run` (microseconds).
///
/// Keeps a dedicated polling loop from pinning a core at 100% when the
/// feed is quiet. Set to 0 for pure busy-polling.
pub const BURST_IDLE_BACKOFF_US: u64 = 50;

/// Bytes per RX ring frame slot (holds one full Ethernet frame + ring header)
pub const RING_FRAME_SIZE: usize = 2048;

/// Bytes per RX ring block (must be a page multiple holding whole frames)
pub const RING_BLOCK_SIZE: usize = 4096;

/// Number of RX ring blocks.
///
/// 512 blocks x 2 frames/block = 1024 frame slots (2 MiB ring), matching
/// the receive ring depth the feed was originally provisioned with.
pub const RING_BLOCK_COUNT: usize = 512;

/// Total RX ring frame slots (derived)
pub const RING_FRAME_COUNT: usize = RING_BLOCK_COUNT * (RING_BLOCK_SIZE / RING_FRAME_SIZE);

// =======================================================================
// Heap Pool (portable backend, tests and benches)
// =======================================================================

/// Default slot count for `HeapBackend` pools
pub const HEAP_POOL_CAPACITY: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_geometry_consistent() {
        // Blocks must hold an integral number of frames
        assert_eq!(RING_BLOCK_SIZE % RING_FRAME_SIZE, 0);
        assert_eq!(RING_FRAME_COUNT, 1024);
    }

    #[test]
    fn test_default_group_is_multicast() {
        assert!(default_group().is_multicast());
        assert_eq!(default_group().to_string(), MULTICAST_GROUP);
    }

    #[test]
    fn test_recv_buffer_covers_max_datagram() {
        assert!(RECV_BUFFER_SIZE >= 1400);
    }
}
