// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AF_PACKET capture backend with a TPACKET_V2 mmap ring (Linux only).
//!
//! The kernel writes whole link-layer frames into a ring of fixed-size
//! slots mapped into our address space; ownership of each slot moves
//! kernel -> user and back through the slot's status word, so the receive
//! path itself makes no syscalls at all.
//!
//! # Slot Lifecycle
//!
//! 1. Kernel fills a slot, stores `TP_STATUS_USER`
//! 2. `rx_burst` sees the status, hands the slot index out as a token
//! 3. The consumer reads the frame bytes in place
//! 4. `release` stores `TP_STATUS_KERNEL`, returning the slot
//!
//! Needs CAP_NET_RAW. Frames longer than the slot are truncated by the
//! kernel (`tp_snaplen < tp_len`); at 2048-byte slots that only affects
//! jumbo frames, which the feed does not use.

use std::ffi::CString;
use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{fence, Ordering};

use crate::config::{RING_BLOCK_COUNT, RING_BLOCK_SIZE, RING_FRAME_COUNT, RING_FRAME_SIZE};
use crate::error::{Error, Result};

use super::backend::{CaptureBackend, FrameToken};

// Linux constants and structs not in stable libc
mod linux_consts {
    pub const TPACKET_V2: libc::c_int = 1;
    pub const PACKET_RX_RING: libc::c_int = 5;
    pub const PACKET_VERSION: libc::c_int = 10;

    pub const TP_STATUS_KERNEL: u32 = 0;
    pub const TP_STATUS_USER: u32 = 1;

    /// Ring geometry request (PACKET_RX_RING), kernel's `tpacket_req`.
    #[repr(C)]
    pub struct TpacketReq {
        pub tp_block_size: u32,
        pub tp_block_nr: u32,
        pub tp_frame_size: u32,
        pub tp_frame_nr: u32,
    }

    /// Per-slot header, kernel's `tpacket2_hdr`.
    #[repr(C)]
    pub struct Tpacket2Hdr {
        pub tp_status: u32,
        pub tp_len: u32,
        pub tp_snaplen: u32,
        pub tp_mac: u16,
        pub tp_net: u16,
        pub tp_sec: u32,
        pub tp_nsec: u32,
        pub tp_vlan_tci: u16,
        pub tp_vlan_tpid: u16,
        pub tp_padding: [u8; 4],
    }
}

/// Capture the error, close the socket, wrap as a setup failure.
fn setup_fail(fd: libc::c_int, what: &str, err: io::Error) -> Error {
    // SAFETY: fd is a valid descriptor from socket(2); error path, fd is
    // not used again
    unsafe { libc::close(fd) };
    Error::InterfaceInit(format!("{what}: {err}"))
}

/// AF_PACKET mmap ring implementing [`CaptureBackend`].
///
/// Construction performs the whole device bring-up (socket, ring
/// allocation, mapping, bind, promiscuous mode); dropping the backend
/// unmaps the ring and closes the socket.
pub struct AfPacketBackend {
    fd: libc::c_int,
    ring: *mut u8,
    ring_len: usize,
    frame_count: u32,
    frames_per_block: u32,
    /// Next slot index to examine for TP_STATUS_USER
    cursor: u32,
    /// Slots currently handed out as tokens
    held: Vec<bool>,
    iface: String,
}

// SAFETY: the ring pointer refers to this process's own private mapping and
// is touched only through &self/&mut self; slot handoff against the kernel
// is ordered by the volatile status accesses plus fences. Moving the sole
// owner to another thread is fine. (No Sync: concurrent use needs &mut.)
unsafe impl Send for AfPacketBackend {}

impl AfPacketBackend {
    /// Open `iface` for raw capture and map the receive ring.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InterfaceInit`] when the interface does not exist,
    /// the process lacks CAP_NET_RAW, or the ring cannot be allocated.
    pub fn new(iface: &str) -> Result<Self> {
        let c_iface = CString::new(iface)
            .map_err(|_| Error::InterfaceInit(format!("interface name {iface:?} contains NUL")))?;

        // SAFETY: c_iface is a valid NUL-terminated string; returns 0 when
        // the name resolves to no device
        let if_index = unsafe { libc::if_nametoindex(c_iface.as_ptr()) };
        if if_index == 0 {
            return Err(Error::InterfaceInit(format!("interface {iface} not found")));
        }

        // Protocol goes on the wire order side of the API, per packet(7)
        // SAFETY: plain socket(2) call, return value checked below
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                i32::from((libc::ETH_P_ALL as u16).to_be()),
            )
        };
        if fd < 0 {
            let err = io::Error::last_os_error();
            return Err(Error::InterfaceInit(format!(
                "socket(AF_PACKET): {err} (CAP_NET_RAW required)"
            )));
        }

        let version = linux_consts::TPACKET_V2;
        // SAFETY: fd is valid; &version points at a c_int and the length
        // matches
        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_PACKET,
                linux_consts::PACKET_VERSION,
                &version as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(setup_fail(
                fd,
                "setsockopt(PACKET_VERSION)",
                io::Error::last_os_error(),
            ));
        }

        let req = linux_consts::TpacketReq {
            tp_block_size: RING_BLOCK_SIZE as u32,
            tp_block_nr: RING_BLOCK_COUNT as u32,
            tp_frame_size: RING_FRAME_SIZE as u32,
            tp_frame_nr: RING_FRAME_COUNT as u32,
        };
        // SAFETY: fd is valid; req is a fully initialized repr(C) struct
        // matching the kernel's tpacket_req and the length matches
        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_PACKET,
                linux_consts::PACKET_RX_RING,
                &req as *const linux_consts::TpacketReq as *const libc::c_void,
                mem::size_of::<linux_consts::TpacketReq>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(setup_fail(
                fd,
                "setsockopt(PACKET_RX_RING)",
                io::Error::last_os_error(),
            ));
        }

        let ring_len = RING_BLOCK_SIZE * RING_BLOCK_COUNT;
        // SAFETY:
        // - First argument is null, letting the kernel choose the address
        // - ring_len matches the geometry the kernel accepted above
        // - PROT_READ | PROT_WRITE and MAP_SHARED are required for a
        //   packet ring (status words are written from both sides)
        // - fd is valid; offset 0 maps the whole ring
        // - MAP_FAILED is checked below
        let ring = unsafe {
            libc::mmap(
                ptr::null_mut(),
                ring_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ring == libc::MAP_FAILED {
            return Err(setup_fail(fd, "mmap(ring)", io::Error::last_os_error()));
        }
        let ring = ring.cast::<u8>();

        // SAFETY: zeroed sockaddr_ll is a valid all-default value; the
        // three fields that matter are set right after
        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::c_ushort;
        addr.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
        addr.sll_ifindex = if_index as libc::c_int;
        // SAFETY: fd is valid; addr is initialized and the length matches
        // sockaddr_ll
        let ret = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            // SAFETY: ring/ring_len come from the successful mmap above
            unsafe {
                libc::munmap(ring.cast::<libc::c_void>(), ring_len);
            }
            return Err(setup_fail(fd, "bind(sockaddr_ll)", err));
        }

        // Promiscuous mode widens capture beyond the NIC's own filters.
        // Refusal is survivable: multicast the NIC is subscribed to still
        // arrives.
        // SAFETY: zeroed packet_mreq is valid; ifindex/type set below
        let mut mreq: libc::packet_mreq = unsafe { mem::zeroed() };
        mreq.mr_ifindex = if_index as libc::c_int;
        mreq.mr_type = libc::PACKET_MR_PROMISC as libc::c_ushort;
        // SAFETY: fd is valid; mreq is initialized and the length matches
        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_PACKET,
                libc::PACKET_ADD_MEMBERSHIP,
                &mreq as *const libc::packet_mreq as *const libc::c_void,
                mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            log::warn!(
                "[RING] promiscuous mode refused on {} ({}), relying on NIC filters",
                iface,
                io::Error::last_os_error()
            );
        }

        log::info!(
            "[RING] AF_PACKET ring mapped iface={} frames={} frame_size={}",
            iface,
            RING_FRAME_COUNT,
            RING_FRAME_SIZE
        );

        Ok(Self {
            fd,
            ring,
            ring_len,
            frame_count: RING_FRAME_COUNT as u32,
            frames_per_block: (RING_BLOCK_SIZE / RING_FRAME_SIZE) as u32,
            cursor: 0,
            held: vec![false; RING_FRAME_COUNT],
            iface: iface.to_string(),
        })
    }

    /// Interface this ring captures from.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.iface
    }

    /// Total slots in the ring.
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Base address of one slot. Slots do not straddle blocks.
    fn slot_ptr(&self, index: u32) -> *mut u8 {
        debug_assert!(index < self.frame_count);
        let block = (index / self.frames_per_block) as usize;
        let within = (index % self.frames_per_block) as usize;
        let offset = block * RING_BLOCK_SIZE + within * RING_FRAME_SIZE;
        // SAFETY: offset < ring_len for every index < frame_count
        unsafe { self.ring.add(offset) }
    }
}

impl CaptureBackend for AfPacketBackend {
    fn rx_burst(&mut self, max: usize, out: &mut Vec<FrameToken>) -> io::Result<usize> {
        let mut added = 0;
        while added < max {
            let index = self.cursor;
            if self.held[index as usize] {
                // Consumer still owns this slot; the ring is effectively full
                break;
            }

            let hdr = self.slot_ptr(index).cast::<linux_consts::Tpacket2Hdr>();
            // SAFETY: hdr points at a slot header inside the live mapping;
            // the volatile read pairs with the kernel's status store
            let status = unsafe { ptr::read_volatile(ptr::addr_of!((*hdr).tp_status)) };
            if status & linux_consts::TP_STATUS_USER == 0 {
                break; // ring drained
            }
            // Frame contents were written before the status flip; order the
            // reads behind it
            fence(Ordering::Acquire);

            self.held[index as usize] = true;
            out.push(index);
            self.cursor = (index + 1) % self.frame_count;
            added += 1;
        }
        Ok(added)
    }

    fn frame(&self, token: FrameToken) -> &[u8] {
        debug_assert!(
            self.held[token as usize],
            "use after release: slot {token} is not held"
        );
        let base = self.slot_ptr(token);
        let hdr = base.cast::<linux_consts::Tpacket2Hdr>();
        // SAFETY: the slot is held, so the kernel does not touch it; header
        // fields were published before TP_STATUS_USER
        let (mac, snaplen) = unsafe { ((*hdr).tp_mac, (*hdr).tp_snaplen) };

        let start = usize::from(mac);
        let len = (snaplen as usize).min(RING_FRAME_SIZE.saturating_sub(start));
        // SAFETY: start + len stays inside this slot; the slice lives no
        // longer than &self
        unsafe { std::slice::from_raw_parts(base.add(start), len) }
    }

    fn release(&mut self, token: FrameToken) -> std::result::Result<(), &'static str> {
        let id = token as usize;
        if id >= self.held.len() || !self.held[id] {
            return Err("double release detected");
        }
        self.held[id] = false;

        // All our reads of the slot precede the handoff
        fence(Ordering::Release);
        let hdr = self.slot_ptr(token).cast::<linux_consts::Tpacket2Hdr>();
        // SAFETY: slot header in the live mapping; the volatile store gives
        // the slot back to the kernel
        unsafe {
            ptr::write_volatile(
                ptr::addr_of_mut!((*hdr).tp_status),
                linux_consts::TP_STATUS_KERNEL,
            );
        }
        Ok(())
    }
}

impl Drop for AfPacketBackend {
    fn drop(&mut self) {
        // SAFETY: ring/ring_len come from the successful mmap in new() and
        // Drop runs once; fd is closed after the mapping is gone
        unsafe {
            libc::munmap(self.ring.cast::<libc::c_void>(), self.ring_len);
            libc::close(self.fd);
        }
        log::debug!("[RING] AF_PACKET ring released iface={}", self.iface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_interface_rejected() {
        // if_nametoindex runs before the socket call, so this fails the
        // same way with or without CAP_NET_RAW
        let err = AfPacketBackend::new("moldrx-nonexistent0")
            .err()
            .expect("unknown interface must be rejected");
        assert!(matches!(err, Error::InterfaceInit(_)));
        assert!(err.to_string().contains("moldrx-nonexistent0"));
    }

    #[test]
    fn test_nul_in_interface_name_rejected() {
        let err = AfPacketBackend::new("eth\0zero")
            .err()
            .expect("NUL in the name must be rejected");
        assert!(matches!(err, Error::InterfaceInit(_)));
    }

    #[test]
    #[ignore = "requires CAP_NET_RAW"]
    fn test_ring_setup_on_loopback() {
        let mut backend = AfPacketBackend::new("lo").expect("ring setup on lo");
        assert_eq!(backend.frame_count(), RING_FRAME_COUNT as u32);
        assert_eq!(backend.interface(), "lo");

        // Empty ring drains to zero immediately
        let mut burst = Vec::new();
        let n = backend.rx_burst(8, &mut burst).expect("burst");
        assert_eq!(burst.len(), n);
        for token in burst {
            backend.release(token).expect("release");
        }
        // Drop unmaps the ring and closes the socket
    }
}
