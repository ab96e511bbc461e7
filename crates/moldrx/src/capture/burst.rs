// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Burst receive pipeline over a capture backend.
//!
//! Polls the backend for up to [`BURST_SIZE`] frames at a time, dissects
//! each one in place, and runs feed payloads through the same decoder the
//! socket pipeline uses. Every fetched frame is released back to its pool
//! before the burst ends, on every path: filtered, truncated, decoded, or
//! handler-inspected.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::{BURST_IDLE_BACKOFF_US, BURST_SIZE};
use crate::error::{Error, Result};
use crate::protocol::{self, MoldPacket, Truncation};

use super::backend::{CaptureBackend, FrameToken};
use super::frame::{FrameClass, FrameFilter};

/// Capture-side counters. Plain fields, updated from the burst path only.
#[derive(Clone, Copy, Debug, Default)]
pub struct CaptureStats {
    /// Frames fetched from the backend
    pub frames_received: u64,
    /// Frames dropped by the dissection filter
    pub frames_filtered: u64,
    /// Feed datagrams handed to the decoder
    pub packets_received: u64,
    /// Feed datagrams whose packet header failed to decode
    pub packets_invalid: u64,
    /// Feed payload bytes seen
    pub bytes_received: u64,
}

/// Zero-copy feed receiver over raw frames.
///
/// Generic over the frame source: the AF_PACKET ring in production,
/// [`HeapBackend`](crate::capture::HeapBackend) in tests and replay.
pub struct BurstReceiver<B: CaptureBackend> {
    backend: B,
    filter: FrameFilter,
    /// Token scratch space, reused across bursts
    burst: Vec<FrameToken>,
    stats: CaptureStats,
}

impl<B: CaptureBackend> BurstReceiver<B> {
    /// Attach a filter for `group:port` to an opened backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGroup`] if `group` is not in 224.0.0.0/4.
    pub fn new(backend: B, group: Ipv4Addr, port: u16) -> Result<Self> {
        if !group.is_multicast() {
            return Err(Error::InvalidGroup(group.to_string()));
        }
        Ok(Self {
            backend,
            filter: FrameFilter::new(group, port),
            burst: Vec::with_capacity(BURST_SIZE),
            stats: CaptureStats::default(),
        })
    }

    /// Fetch one burst, decode in place, release everything.
    ///
    /// Returns the number of frames fetched; zero means the ring was empty.
    /// The handler runs once per feed datagram, while the frame is still
    /// held, and sees either the packet view or the header-level
    /// truncation.
    ///
    /// # Errors
    ///
    /// Propagates backend device errors. Filtered frames and decode
    /// failures are not errors.
    pub fn receive_and_process<F>(&mut self, mut handler: F) -> Result<usize>
    where
        F: FnMut(std::result::Result<MoldPacket<'_>, Truncation>),
    {
        let Self {
            backend,
            filter,
            burst,
            stats,
        } = self;

        burst.clear();
        backend.rx_burst(BURST_SIZE, burst)?;

        for &token in burst.iter() {
            {
                let frame = backend.frame(token);
                stats.frames_received += 1;

                match filter.classify(frame) {
                    FrameClass::Feed(payload) => {
                        stats.packets_received += 1;
                        stats.bytes_received += payload.len() as u64;

                        let decoded = protocol::decode(payload);
                        if decoded.is_err() {
                            stats.packets_invalid += 1;
                        }
                        handler(decoded);
                    }
                    FrameClass::Skipped(reason) => {
                        stats.frames_filtered += 1;
                        log::trace!("[BURST] frame skipped: {}", reason);
                    }
                }
            }

            // The frame goes back even when the handler never ran
            if let Err(e) = backend.release(token) {
                log::error!("[BURST] release failed for token {}: {}", token, e);
            }
        }

        Ok(burst.len())
    }

    /// Capture loop with cooperative shutdown.
    ///
    /// Spins on [`receive_and_process`](BurstReceiver::receive_and_process),
    /// backing off briefly whenever the ring is empty so an idle feed does
    /// not pin a core. Returns `Ok(())` on cancellation.
    ///
    /// # Errors
    ///
    /// Propagates backend device errors.
    pub fn run<F>(&mut self, cancel: &CancelToken, mut handler: F) -> Result<()>
    where
        F: FnMut(std::result::Result<MoldPacket<'_>, Truncation>),
    {
        log::debug!(
            "[BURST] capture loop started group={}",
            self.multicast_address()
        );

        while !cancel.is_cancelled() {
            let fetched = self.receive_and_process(&mut handler)?;
            if fetched == 0 {
                thread::sleep(Duration::from_micros(BURST_IDLE_BACKOFF_US));
            }
        }

        log::debug!(
            "[BURST] capture loop stopped frames={} filtered={} packets={}",
            self.stats.frames_received,
            self.stats.frames_filtered,
            self.stats.packets_received
        );
        Ok(())
    }

    /// The group:port the filter accepts.
    #[must_use]
    pub fn multicast_address(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.filter.group()), self.filter.port())
    }

    /// Capture-side counters.
    #[must_use]
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// The underlying frame source.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the frame source (replay injection).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::testing::{feed_frame, frame_with};
    use crate::capture::frame::{ETHERTYPE_IPV4, IPV4_PROTO_UDP};
    use crate::capture::heap::HeapBackend;
    use crate::protocol::build_packet;

    const GROUP: Ipv4Addr = Ipv4Addr::new(239, 1, 1, 1);
    const PORT: u16 = 9000;

    fn receiver(capacity: usize) -> BurstReceiver<HeapBackend> {
        let backend = HeapBackend::new(capacity, 2048).expect("pool creation");
        BurstReceiver::new(backend, GROUP, PORT).expect("valid group")
    }

    #[test]
    fn test_rejects_unicast_group() {
        let backend = HeapBackend::new(4, 2048).expect("pool creation");
        let err = BurstReceiver::new(backend, Ipv4Addr::new(10, 1, 2, 3), PORT)
            .err()
            .expect("unicast address must be rejected");
        assert!(matches!(err, Error::InvalidGroup(_)));
    }

    #[test]
    fn test_decodes_feed_frames_in_order() {
        let mut rx = receiver(8);

        let first = build_packet("ABC", 42, &[b"FOO", b"BARZ"]).expect("packet builds");
        let second = build_packet("ABC", 44, &[b"QUX"]).expect("packet builds");
        rx.backend_mut()
            .inject(&feed_frame(GROUP, PORT, &first))
            .expect("inject");
        rx.backend_mut()
            .inject(&feed_frame(GROUP, PORT, &second))
            .expect("inject");

        let mut seen: Vec<(String, u64, u16, Vec<u8>)> = Vec::new();
        let fetched = rx
            .receive_and_process(|packet| {
                let packet = packet.expect("well-formed packets decode");
                for message in packet.messages() {
                    let message = message.expect("no truncation");
                    seen.push((
                        packet.header().session_str().into_owned(),
                        packet.header().sequence_number,
                        message.index,
                        message.data.to_vec(),
                    ));
                }
            })
            .expect("burst");

        assert_eq!(fetched, 2);
        assert_eq!(
            seen,
            vec![
                ("ABC       ".to_string(), 42, 0, b"FOO".to_vec()),
                ("ABC       ".to_string(), 42, 1, b"BARZ".to_vec()),
                ("ABC       ".to_string(), 44, 0, b"QUX".to_vec()),
            ]
        );

        let stats = rx.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_filtered, 0);
        assert_eq!(stats.packets_received, 2);
        assert_eq!(stats.packets_invalid, 0);
    }

    #[test]
    fn test_foreign_frames_filtered_without_decode() {
        let mut rx = receiver(8);
        let packet = build_packet("ABC", 1, &[b"KEEP"]).expect("packet builds");

        // One frame per discard path, then one of ours
        let ipv6 = frame_with(0x86DD, IPV4_PROTO_UDP, GROUP, 5, PORT, 12, b"FEED");
        let tcp = frame_with(ETHERTYPE_IPV4, 6, GROUP, 5, PORT, 12, b"FEED");
        let other_group = feed_frame(Ipv4Addr::new(239, 1, 1, 9), PORT, &packet);
        let other_port = feed_frame(GROUP, PORT + 7, &packet);
        let runt = vec![0xAA; 9];
        let ours = feed_frame(GROUP, PORT, &packet);

        for frame in [&ipv6, &tcp, &other_group, &other_port, &runt, &ours] {
            rx.backend_mut().inject(frame).expect("inject");
        }

        let mut decoded = 0;
        rx.receive_and_process(|packet| {
            decoded += 1;
            assert!(packet.is_ok());
        })
        .expect("burst");

        assert_eq!(decoded, 1, "only our frame reaches the decoder");
        let stats = rx.stats();
        assert_eq!(stats.frames_received, 6);
        assert_eq!(stats.frames_filtered, 5);
        assert_eq!(stats.packets_received, 1);
    }

    #[test]
    fn test_every_frame_released() {
        let mut rx = receiver(8);
        let packet = build_packet("ABC", 1, &[b"X"]).expect("packet builds");

        // Mix of ours, foreign, and garbage; all must return to the pool
        rx.backend_mut()
            .inject(&feed_frame(GROUP, PORT, &packet))
            .expect("inject");
        rx.backend_mut()
            .inject(&feed_frame(GROUP, PORT + 1, &packet))
            .expect("inject");
        rx.backend_mut()
            .inject(&feed_frame(GROUP, PORT, &[0u8; 5]))
            .expect("inject");

        rx.receive_and_process(|_| {}).expect("burst");

        assert_eq!(rx.backend().available(), rx.backend().capacity());
        assert_eq!(rx.backend().queued(), 0);
    }

    #[test]
    fn test_burst_size_caps_one_call() {
        let mut rx = receiver(64);
        let packet = build_packet("ABC", 1, &[b"N"]).expect("packet builds");
        let frame = feed_frame(GROUP, PORT, &packet);

        for _ in 0..(BURST_SIZE + 8) {
            rx.backend_mut().inject(&frame).expect("inject");
        }

        assert_eq!(rx.receive_and_process(|_| {}).expect("burst 1"), BURST_SIZE);
        assert_eq!(rx.receive_and_process(|_| {}).expect("burst 2"), 8);
        assert_eq!(rx.receive_and_process(|_| {}).expect("burst 3"), 0);
    }

    #[test]
    fn test_truncated_payload_reaches_handler_as_error() {
        let mut rx = receiver(4);

        // 10 bytes of UDP payload: too short for a packet header
        rx.backend_mut()
            .inject(&feed_frame(GROUP, PORT, &[0xAB; 10]))
            .expect("inject");

        let mut outcomes = Vec::new();
        rx.receive_and_process(|packet| outcomes.push(packet.err()))
            .expect("burst");

        assert_eq!(outcomes, vec![Some(Truncation::PacketHeader { len: 10 })]);
        assert_eq!(rx.stats().packets_invalid, 1);
        // Invalid datagrams still release their frame
        assert_eq!(rx.backend().available(), rx.backend().capacity());
    }

    #[test]
    fn test_heartbeats_flow_through() {
        let mut rx = receiver(4);
        let hb = crate::protocol::heartbeat("IDLE", 500);
        rx.backend_mut()
            .inject(&feed_frame(GROUP, PORT, &hb))
            .expect("inject");

        let mut heartbeats = 0;
        rx.receive_and_process(|packet| {
            if packet.expect("heartbeat decodes").is_heartbeat() {
                heartbeats += 1;
            }
        })
        .expect("burst");
        assert_eq!(heartbeats, 1);
    }

    #[test]
    fn test_run_returns_on_cancel() {
        let mut rx = receiver(4);
        let cancel = CancelToken::new();
        cancel.cancel();

        // Pre-cancelled token: the loop must exit before the first burst
        rx.run(&cancel, |_| {}).expect("run returns cleanly");
        assert_eq!(rx.stats().frames_received, 0);
    }
}
