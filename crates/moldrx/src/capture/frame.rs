// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ethernet/IPv4/UDP frame dissection for the capture pipeline.
//!
//! Raw capture delivers whole link-layer frames; [`FrameFilter`] walks the
//! three headers with explicit offsets and either yields the UDP payload or
//! says why the frame is not ours. Every offset is bounds-checked: a frame
//! cut short anywhere is a [`SkipReason::Runt`], never a panic.

use std::fmt;
use std::net::Ipv4Addr;

/// Ethernet header size (bytes, untagged)
pub const ETH_HEADER_LEN: usize = 14;

/// EtherType for IPv4
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// IPv4 protocol number for UDP
pub const IPV4_PROTO_UDP: u8 = 17;

/// Minimum IPv4 header size (bytes, IHL 5)
pub const IPV4_MIN_HEADER_LEN: usize = 20;

/// UDP header size (bytes)
pub const UDP_HEADER_LEN: usize = 8;

/// Why a frame was not handed to the decoder.
///
/// None of these are errors; on a promiscuous or multi-group NIC most
/// traffic is expected to fall into one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Frame too short for the headers it implies
    Runt,
    /// EtherType is not IPv4
    NotIpv4,
    /// IP protocol is not UDP
    NotUdp,
    /// Destination IP differs from the configured group
    OtherGroup,
    /// UDP destination port differs from the configured port
    OtherPort,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::Runt => "runt frame",
            SkipReason::NotIpv4 => "not IPv4",
            SkipReason::NotUdp => "not UDP",
            SkipReason::OtherGroup => "other group",
            SkipReason::OtherPort => "other port",
        };
        f.write_str(label)
    }
}

/// Classification result for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameClass<'a> {
    /// Frame belongs to the feed; the UDP payload, borrowed from the frame
    Feed(&'a [u8]),
    /// Frame is not ours
    Skipped(SkipReason),
}

/// Feed membership filter over raw frames.
///
/// Membership is destination-IP equality against the configured group plus
/// UDP destination-port equality. IGMP state is not consulted: on a NIC
/// subscribed to several groups, frames for the others arrive here and are
/// dropped by the address compare alone.
#[derive(Clone, Copy, Debug)]
pub struct FrameFilter {
    group: Ipv4Addr,
    port: u16,
}

impl FrameFilter {
    /// Filter for `group:port`.
    #[must_use]
    pub fn new(group: Ipv4Addr, port: u16) -> Self {
        Self { group, port }
    }

    /// The group this filter accepts.
    #[must_use]
    pub fn group(&self) -> Ipv4Addr {
        self.group
    }

    /// The UDP port this filter accepts.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Classify one frame, starting at the Ethernet header.
    ///
    /// The returned payload spans from the end of the UDP header to the end
    /// of the UDP-declared length. Link-layer padding past that is not part
    /// of the datagram and is excluded.
    #[must_use]
    pub fn classify<'a>(&self, frame: &'a [u8]) -> FrameClass<'a> {
        if frame.len() < ETH_HEADER_LEN {
            return FrameClass::Skipped(SkipReason::Runt);
        }
        let ethertype = u16::from_be_bytes([frame[12], frame[13]]);
        if ethertype != ETHERTYPE_IPV4 {
            return FrameClass::Skipped(SkipReason::NotIpv4);
        }

        let ip = &frame[ETH_HEADER_LEN..];
        if ip.len() < IPV4_MIN_HEADER_LEN {
            return FrameClass::Skipped(SkipReason::Runt);
        }
        if ip[9] != IPV4_PROTO_UDP {
            return FrameClass::Skipped(SkipReason::NotUdp);
        }
        let dst = Ipv4Addr::new(ip[16], ip[17], ip[18], ip[19]);
        if dst != self.group {
            return FrameClass::Skipped(SkipReason::OtherGroup);
        }

        // Header length nibble is in 32-bit words; options push the UDP
        // header back
        let ihl = usize::from(ip[0] & 0x0F) * 4;
        if ihl < IPV4_MIN_HEADER_LEN || ip.len() < ihl + UDP_HEADER_LEN {
            return FrameClass::Skipped(SkipReason::Runt);
        }

        let udp = &ip[ihl..];
        let dst_port = u16::from_be_bytes([udp[2], udp[3]]);
        if dst_port != self.port {
            return FrameClass::Skipped(SkipReason::OtherPort);
        }

        let udp_len = usize::from(u16::from_be_bytes([udp[4], udp[5]]));
        if udp_len < UDP_HEADER_LEN || udp.len() < udp_len {
            return FrameClass::Skipped(SkipReason::Runt);
        }

        FrameClass::Feed(&udp[UDP_HEADER_LEN..udp_len])
    }
}
