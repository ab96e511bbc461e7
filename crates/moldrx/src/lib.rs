// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # moldrx - MoldUDP64 market-data feed handler
//!
//! A pure Rust receive path for MoldUDP64, the sequenced-datagram framing
//! used by ITCH-style market-data feeds. Decodes multicast packets into
//! per-message views without copying, over either a plain UDP socket or a
//! kernel-shared AF_PACKET ring.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::Ipv4Addr;
//! use moldrx::{Result, UdpReceiver};
//!
//! fn main() -> Result<()> {
//!     let mut receiver = UdpReceiver::new(Ipv4Addr::new(239, 1, 1, 1), 9000, None)?;
//!
//!     loop {
//!         receiver.receive_and_process(|from, packet| {
//!             let Ok(packet) = packet else { return };
//!             for message in packet.messages().flatten() {
//!                 println!(
//!                     "{} seq={} idx={} {} bytes (from {})",
//!                     packet.header().session_str(),
//!                     packet.header().sequence_number,
//!                     message.index,
//!                     message.data.len(),
//!                     from,
//!                 );
//!             }
//!         })?;
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                        Application                           |
//! |        handler(session, sequence, index, message)            |
//! +--------------------------------------------------------------+
//! |                     Shared decoder                           |
//! |   protocol::decode -> MoldPacket -> Messages (zero-copy)     |
//! +------------------------------+-------------------------------+
//! |     Socket pipeline          |       Capture pipeline        |
//! |  UdpReceiver (socket2/mio)   |  BurstReceiver over a         |
//! |  kernel UDP + group join     |  CaptureBackend (AF_PACKET    |
//! |                              |  mmap ring / heap pool)       |
//! +------------------------------+-------------------------------+
//! ```
//!
//! Both pipelines funnel into the one decode routine; they differ only in
//! where the bytes come from and who owns the buffers.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`UdpReceiver`] | Multicast feed receiver over a plain UDP socket |
//! | [`BurstReceiver`] | Zero-copy feed receiver over raw captured frames |
//! | [`MoldPacket`] | Decoded view of one datagram, lazily iterable |
//! | [`PacketBuilder`] | Feed-side packet assembly |
//! | [`CancelToken`] | Cooperative shutdown for the receive loops |
//!
//! ## Modules Overview
//!
//! - [`protocol`] - header codec, packet decoding, packet assembly
//! - [`transport`] - UDP sockets and multicast membership
//! - [`capture`] - raw-frame path: backends, dissection, burst pipeline
//! - [`config`] - feed addressing and buffer geometry

/// Cooperative cancellation for the receive loops.
pub mod cancel;
/// Raw-frame capture path (backends, dissection, burst pipeline).
pub mod capture;
/// Feed addressing, buffer sizes, and ring geometry.
pub mod config;
/// Error taxonomy and crate-wide `Result`.
pub mod error;
/// MoldUDP64 wire protocol (header codec, decoding, assembly).
pub mod protocol;
/// Socket transport (UDP receiver/sender, multicast membership).
pub mod transport;

pub use cancel::CancelToken;
pub use capture::{BurstReceiver, CaptureBackend, CaptureStats, FrameFilter, HeapBackend};
#[cfg(target_os = "linux")]
pub use capture::AfPacketBackend;
pub use error::{Error, Result};
pub use protocol::{
    decode, Message, Messages, MoldPacket, PacketBuilder, PacketHeader, Truncation,
};
pub use transport::{Datagram, SocketStats, UdpReceiver, UdpSender};
