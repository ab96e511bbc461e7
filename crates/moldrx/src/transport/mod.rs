// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket transport for the multicast feed.
//!
//! Manages UDP sockets and multicast group membership. This is the portable
//! receive path; the raw-capture path lives in [`crate::capture`].
//!
//! # Modules
//!
//! - `udp` - feed receiver and sender over plain UDP sockets
//! - `multicast` - multicast group joining and interface discovery
//!
//! # Example
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use moldrx::transport::UdpReceiver;
//!
//! let mut receiver = UdpReceiver::new(Ipv4Addr::new(239, 1, 1, 1), 9000, None).unwrap();
//! let datagram = receiver.recv().unwrap();
//! println!("{} bytes from {}", datagram.data.len(), datagram.from);
//! ```

/// Multicast group management and interface discovery.
pub mod multicast;
/// Feed receiver and sender over plain UDP sockets.
pub mod udp;

pub use multicast::{get_multicast_interfaces, get_primary_interface_ip, join_group};
pub use udp::{Datagram, SocketStats, UdpReceiver, UdpSender};
