// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast group management and interface discovery.
//!
//! Handles joining the feed's multicast group and discovering which local
//! interfaces can carry it.

use std::io;
use std::net::{Ipv4Addr, UdpSocket};

/// Join the feed multicast group.
///
/// With an explicit `iface` the join happens on that interface only. Without
/// one, the group is joined on ALL non-loopback interfaces; exchanges do not
/// document which NIC carries the feed, and joining everywhere is the only
/// configuration-free way to receive it.
pub fn join_group(
    socket: &UdpSocket,
    group: Ipv4Addr,
    iface: Option<Ipv4Addr>,
) -> io::Result<Ipv4Addr> {
    if let Some(iface) = iface {
        socket.join_multicast_v4(&group, &iface)?;
        log::debug!("[MCAST] join_multicast_v4({}) on interface {}", group, iface);
        socket.set_multicast_loop_v4(true)?;
        let _ = socket.set_multicast_ttl_v4(1);
        return Ok(iface);
    }

    let interfaces = get_multicast_interfaces()?;

    if interfaces.is_empty() {
        log::debug!(
            "[MCAST] WARNING: No suitable interfaces found for multicast, using UNSPECIFIED"
        );
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        log::debug!("[MCAST] join_multicast_v4({}) on UNSPECIFIED", group);
    } else {
        for iface in &interfaces {
            match socket.join_multicast_v4(&group, iface) {
                Ok(()) => {
                    log::debug!("[MCAST] join_multicast_v4({}) on interface {}", group, iface);
                }
                Err(e) if e.raw_os_error() == Some(98) => {
                    // EADDRINUSE (98) Linux: already joined on same physical NIC
                    log::debug!(
                        "[MCAST] join_multicast_v4({}) on {} - already joined, skipping",
                        group,
                        iface
                    );
                }
                Err(e) => {
                    // Non-fatal: skip interfaces that can't join multicast
                    log::debug!(
                        "[MCAST] join_multicast_v4({}) on {} failed (non-fatal): {}",
                        group,
                        iface,
                        e
                    );
                }
            }
        }
    }

    socket.set_multicast_loop_v4(true)?;
    log::debug!("[MCAST] multicast loop enabled");
    let _ = socket.set_multicast_ttl_v4(1);

    // Return first interface for reporting (or UNSPECIFIED if none)
    Ok(interfaces.first().copied().unwrap_or(Ipv4Addr::UNSPECIFIED))
}

/// Get all non-loopback IPv4 interfaces suitable for multicast.
///
/// - Linux: parses `ip -4 addr show` output
/// - Windows/other: uses `local_ip_address` crate
pub fn get_multicast_interfaces() -> io::Result<Vec<Ipv4Addr>> {
    // Try env var override first (for testing/debugging)
    if let Ok(var) = std::env::var("MOLDRX_MULTICAST_IF") {
        if let Ok(addr) = var.parse::<Ipv4Addr>() {
            log::debug!("[MCAST] Using MOLDRX_MULTICAST_IF override: {}", addr);
            return Ok(vec![addr]);
        }
    }

    get_multicast_interfaces_platform()
}

/// Linux: parse `ip -4 addr show` to discover interfaces.
/// Falls back to `local_ip_address` crate if `ip` command is unavailable (e.g. Docker).
#[cfg(target_os = "linux")]
fn get_multicast_interfaces_platform() -> io::Result<Vec<Ipv4Addr>> {
    use std::process::Command;

    let output = match Command::new("ip").args(["-4", "addr", "show"]).output() {
        Ok(o) => o,
        Err(_) => {
            log::debug!("[MCAST] 'ip' command not found, using local_ip_address crate");
            return get_multicast_interfaces_crate();
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut interfaces = Vec::new();

    for line in stdout.lines() {
        if line.contains("127.0.0.1") || line.contains("host lo") {
            continue;
        }
        if let Some(inet_part) = line.trim().strip_prefix("inet ") {
            if let Some(addr_str) = inet_part.split('/').next() {
                if let Ok(addr) = addr_str.trim().parse::<Ipv4Addr>() {
                    interfaces.push(addr);
                }
            }
        }
    }

    Ok(interfaces)
}

/// Windows/other: use `local_ip_address` crate for interface discovery.
#[cfg(not(target_os = "linux"))]
fn get_multicast_interfaces_platform() -> io::Result<Vec<Ipv4Addr>> {
    get_multicast_interfaces_crate()
}

/// Portable interface discovery via `local_ip_address` crate.
fn get_multicast_interfaces_crate() -> io::Result<Vec<Ipv4Addr>> {
    use std::net::IpAddr;

    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(ifs) => ifs,
        Err(e) => {
            log::debug!("[MCAST] Failed to list network interfaces: {}", e);
            return Ok(vec![]);
        }
    };

    let mut addrs = Vec::new();
    for (_name, ip) in interfaces {
        if let IpAddr::V4(ipv4) = ip {
            if !ipv4.is_loopback() {
                addrs.push(ipv4);
            }
        }
    }

    log::debug!(
        "[MCAST] Discovered {} non-loopback interfaces (portable)",
        addrs.len()
    );
    Ok(addrs)
}

/// Get primary interface IP address (the one used for default route).
///
/// Used by the feed tool to report which NIC outgoing packets leave on.
pub fn get_primary_interface_ip() -> io::Result<Ipv4Addr> {
    let interfaces = get_multicast_interfaces()?;

    if let Some(&ip) = interfaces.first() {
        log::debug!("[MCAST] Using primary interface IP: {}", ip);
        return Ok(ip);
    }

    log::debug!("[MCAST] WARNING: No suitable interface found, using UNSPECIFIED");
    Ok(Ipv4Addr::UNSPECIFIED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_discovery_does_not_fail() {
        // Discovery must degrade to an empty list, never to an Err, so that
        // join_group can fall back to UNSPECIFIED.
        let interfaces = get_multicast_interfaces().expect("discovery never errors");
        for iface in &interfaces {
            assert!(!iface.is_loopback(), "loopback must be filtered out");
        }
    }

    #[test]
    #[ignore = "requires UDP socket, flaky in CI"]
    fn test_join_group_on_loopback_capable_host() {
        let socket = UdpSocket::bind("0.0.0.0:0").expect("bind ephemeral");
        let iface = join_group(&socket, Ipv4Addr::new(239, 1, 1, 1), None)
            .expect("join should succeed on a host with any interface");
        let _ = iface;
    }
}
