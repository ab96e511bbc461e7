// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MoldUDP64 protocol implementation
//!
//! This module contains the wire-level pieces of the feed handler:
//! - Header codec: packet header and message header, explicit offsets
//! - Zero-copy packet decoding with a lazy message iterator
//! - Packet assembly for the feed tool and for tests

pub mod decode;
pub mod encode;
pub mod header;

// Re-export commonly used items
pub use decode::{decode, Message, Messages, MoldPacket, Truncation};
pub use encode::{build_packet, heartbeat, EncodeError, PacketBuilder};
pub use header::{
    MessageHeader, PacketHeader, MESSAGE_HEADER_LEN, PACKET_HEADER_LEN, SESSION_LEN,
};
