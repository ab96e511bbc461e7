// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP transport for the multicast feed.
//!
//! Consolidates socket construction, multicast configuration, and the
//! receive loop. [`UdpReceiver`] is the socket pipeline: one blocking
//! datagram socket, one reusable receive buffer, straight into the shared
//! decoder. [`UdpSender`] is the matching transmit side used by the feed
//! tool.

use crate::cancel::CancelToken;
use crate::config::{RECV_BUFFER_SIZE, RECV_POLL_INTERVAL_MS};
use crate::error::{Error, Result};
use crate::protocol::{self, MoldPacket, Truncation};
use crate::transport::multicast::join_group;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

/// One received datagram, borrowed from the receiver's buffer.
///
/// Valid until the next call that touches the receiver.
#[derive(Debug)]
pub struct Datagram<'a> {
    /// Datagram payload as delivered by the kernel
    pub data: &'a [u8],
    /// Sender address as reported by `recvfrom`
    pub from: SocketAddr,
}

/// Receive-side counters. Plain fields, updated from the receive path only.
#[derive(Clone, Copy, Debug, Default)]
pub struct SocketStats {
    /// Datagrams delivered by the kernel
    pub packets_received: u64,
    /// Datagrams whose packet header failed to decode
    pub packets_invalid: u64,
    /// Payload bytes delivered by the kernel
    pub bytes_received: u64,
}

// ============================================================================
// Receiver
// ============================================================================

/// Multicast feed receiver over a plain UDP socket.
///
/// Construction binds, joins the group, and allocates the receive buffer;
/// every fallible step happens in [`new`](UdpReceiver::new) so that the
/// receive path itself only surfaces transport errors.
pub struct UdpReceiver {
    socket: UdpSocket,
    group: Ipv4Addr,
    port: u16,
    iface: Ipv4Addr,
    buf: Vec<u8>,
    stats: SocketStats,
}

impl UdpReceiver {
    /// Bind to `0.0.0.0:port` and join `group`, optionally on a specific
    /// interface.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidGroup`] if `group` is not in 224.0.0.0/4
    /// - [`Error::BindFailed`] if the socket cannot be created or bound
    ///   (port in use without reuse, insufficient permission)
    /// - [`Error::MulticastJoinFailed`] if the group join is refused
    pub fn new(group: Ipv4Addr, port: u16, iface: Option<Ipv4Addr>) -> Result<Self> {
        if !group.is_multicast() {
            return Err(Error::InvalidGroup(group.to_string()));
        }

        // SO_REUSEADDR so several receivers can watch the same feed port.
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| Error::BindFailed(format!("socket create: {e}")))?;
        socket2
            .set_reuse_address(true)
            .map_err(|e| Error::BindFailed(format!("SO_REUSEADDR: {e}")))?;

        let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        socket2
            .bind(&bind_addr.into())
            .map_err(|e| Error::BindFailed(format!("{bind_addr}: {e}")))?;
        log::debug!("[UDP] receiver bind addr={} group={}", bind_addr, group);

        let socket: UdpSocket = socket2.into();
        let iface = join_group(&socket, group, iface)
            .map_err(|e| Error::MulticastJoinFailed(format!("{group}: {e}")))?;
        log::debug!("[UDP] joined group={} iface={}", group, iface);

        Ok(Self {
            socket,
            group,
            port,
            iface,
            buf: vec![0u8; RECV_BUFFER_SIZE],
            stats: SocketStats::default(),
        })
    }

    /// Receive one datagram, blocking until it arrives.
    ///
    /// There is no timeout here: a silent feed blocks this call
    /// indefinitely. Callers that need responsive shutdown use
    /// [`run`](UdpReceiver::run) instead.
    ///
    /// # Errors
    ///
    /// Propagates socket errors; whether to retry or abort is the caller's
    /// call.
    pub fn recv(&mut self) -> Result<Datagram<'_>> {
        let (len, from) = self.socket.recv_from(&mut self.buf)?;
        self.stats.packets_received += 1;
        self.stats.bytes_received += len as u64;
        Ok(Datagram {
            data: &self.buf[..len],
            from,
        })
    }

    /// Receive one datagram and run it through the decoder, blocking.
    ///
    /// The handler sees either a decoded packet view or the header-level
    /// truncation; mid-packet truncation surfaces later, from the packet's
    /// message iterator.
    ///
    /// # Errors
    ///
    /// Propagates socket errors. Decode failures are NOT errors here; they
    /// are handed to the handler and counted.
    pub fn receive_and_process<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(SocketAddr, std::result::Result<MoldPacket<'_>, Truncation>),
    {
        let (len, from) = self.socket.recv_from(&mut self.buf)?;
        self.stats.packets_received += 1;
        self.stats.bytes_received += len as u64;

        let decoded = protocol::decode(&self.buf[..len]);
        if decoded.is_err() {
            self.stats.packets_invalid += 1;
        }
        handler(from, decoded);
        Ok(())
    }

    /// Receive loop with cooperative shutdown.
    ///
    /// Polls the socket with a 1ms timeout so the cancel token is observed
    /// even when the feed goes quiet, then drains every datagram the kernel
    /// has queued before polling again. Returns `Ok(())` on cancellation.
    ///
    /// # Errors
    ///
    /// Propagates socket errors other than `Interrupted`.
    pub fn run<F>(&mut self, cancel: &CancelToken, mut handler: F) -> Result<()>
    where
        F: FnMut(SocketAddr, std::result::Result<MoldPacket<'_>, Truncation>),
    {
        self.socket.set_nonblocking(true)?;

        let mut poll = Poll::new()?;
        let mut events = Events::with_capacity(16);

        // mio needs ownership for registration; clone, both handles share
        // the one kernel socket
        let socket_clone = self.socket.try_clone()?;
        let mut mio_socket = mio::net::UdpSocket::from_std(socket_clone);

        const SOCKET_TOKEN: Token = Token(0);
        poll.registry()
            .register(&mut mio_socket, SOCKET_TOKEN, Interest::READABLE)?;
        log::debug!("[UDP] receive loop started group={}:{}", self.group, self.port);

        let run_result = 'outer: loop {
            if cancel.is_cancelled() {
                break 'outer Ok(());
            }

            if let Err(e) = poll.poll(&mut events, Some(Duration::from_millis(RECV_POLL_INTERVAL_MS)))
            {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                break 'outer Err(Error::from(e));
            }

            for event in events.iter() {
                if event.token() != SOCKET_TOKEN {
                    continue;
                }

                // Drain all queued datagrams (edge-triggered style)
                loop {
                    let (len, from) = match mio_socket.recv_from(&mut self.buf) {
                        Ok(result) => result,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => break 'outer Err(Error::from(e)),
                    };

                    self.stats.packets_received += 1;
                    self.stats.bytes_received += len as u64;

                    let decoded = protocol::decode(&self.buf[..len]);
                    if decoded.is_err() {
                        self.stats.packets_invalid += 1;
                    }
                    handler(from, decoded);
                }
            }
        };

        // Put the socket back the way recv() expects it
        let _ = self.socket.set_nonblocking(false);
        log::debug!(
            "[UDP] receive loop stopped packets={} invalid={}",
            self.stats.packets_received,
            self.stats.packets_invalid
        );
        run_result
    }

    /// The group:port this receiver is subscribed to.
    #[must_use]
    pub fn multicast_address(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.group), self.port)
    }

    /// Interface the group was joined on (UNSPECIFIED when joined on all).
    #[must_use]
    pub fn interface(&self) -> Ipv4Addr {
        self.iface
    }

    /// Local socket address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive-side counters.
    #[must_use]
    pub fn stats(&self) -> SocketStats {
        self.stats
    }
}

// ============================================================================
// Sender
// ============================================================================

/// Multicast feed transmitter.
///
/// Binds an ephemeral socket and sends every datagram to one group:port.
pub struct UdpSender {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpSender {
    /// Create a sender for `group:port`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidGroup`] if `group` is not in 224.0.0.0/4
    /// - [`Error::BindFailed`] if the ephemeral bind fails
    pub fn new(group: Ipv4Addr, port: u16) -> Result<Self> {
        if !group.is_multicast() {
            return Err(Error::InvalidGroup(group.to_string()));
        }

        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| Error::BindFailed(format!("0.0.0.0:0: {e}")))?;
        log::debug!("[UDP] sender bound, dest={}:{}", group, port);

        Ok(Self {
            socket,
            dest: SocketAddr::new(IpAddr::V4(group), port),
        })
    }

    /// Send one datagram to the group. Returns bytes sent.
    ///
    /// # Errors
    ///
    /// Propagates socket errors.
    pub fn send(&self, datagram: &[u8]) -> Result<usize> {
        Ok(self.socket.send_to(datagram, self.dest)?)
    }

    /// Set the multicast TTL (1 keeps the feed on the local segment).
    pub fn set_multicast_ttl(&self, ttl: u32) -> io::Result<()> {
        self.socket.set_multicast_ttl_v4(ttl)
    }

    /// Enable or disable loopback of our own datagrams.
    pub fn set_multicast_loopback(&self, enabled: bool) -> io::Result<()> {
        self.socket.set_multicast_loop_v4(enabled)
    }

    /// The group:port this sender transmits to.
    #[must_use]
    pub fn multicast_address(&self) -> SocketAddr {
        self.dest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_rejects_unicast_group() {
        let err = UdpReceiver::new(Ipv4Addr::new(192, 168, 1, 10), 9000, None)
            .err()
            .expect("unicast address must be rejected");
        assert!(matches!(err, Error::InvalidGroup(_)));
        assert!(err.to_string().contains("192.168.1.10"));
    }

    #[test]
    fn test_sender_rejects_unicast_group() {
        let err = UdpSender::new(Ipv4Addr::new(10, 0, 0, 1), 9000)
            .err()
            .expect("unicast address must be rejected");
        assert!(matches!(err, Error::InvalidGroup(_)));
    }

    #[test]
    fn test_sender_destination() {
        let sender = UdpSender::new(Ipv4Addr::new(239, 1, 1, 1), 9000).expect("sender setup");
        assert_eq!(
            sender.multicast_address(),
            "239.1.1.1:9000".parse().expect("valid addr")
        );
    }

    #[test]
    #[ignore = "requires UDP socket, flaky in CI"]
    fn test_loopback_end_to_end() {
        let group = Ipv4Addr::new(239, 88, 77, 66);
        let port = 47123;

        let mut receiver = UdpReceiver::new(group, port, None).expect("receiver setup");
        let cancel = CancelToken::new();
        let (tx, rx) = std::sync::mpsc::channel();

        let worker_cancel = cancel.clone();
        let worker = std::thread::spawn(move || {
            receiver
                .run(&worker_cancel, |_from, packet| {
                    if let Ok(packet) = packet {
                        for message in packet.messages().flatten() {
                            let _ = tx.send((
                                packet.header().sequence_number,
                                message.index,
                                message.data.to_vec(),
                            ));
                        }
                    }
                })
                .expect("run exits cleanly");
        });

        let sender = UdpSender::new(group, port).expect("sender setup");
        sender.set_multicast_loopback(true).expect("loopback on");
        let datagram =
            crate::protocol::build_packet("LOOP", 7, &[b"PING"]).expect("packet builds");

        // Re-send until the join settles; the first datagrams can be lost
        let mut received = None;
        for _ in 0..50 {
            sender.send(&datagram).expect("send");
            if let Ok(item) = rx.recv_timeout(Duration::from_millis(100)) {
                received = Some(item);
                break;
            }
        }
        cancel.cancel();
        worker.join().expect("worker joins");

        let (seq, index, data) = received.expect("datagram must loop back");
        assert_eq!(seq, 7);
        assert_eq!(index, 0);
        assert_eq!(data, b"PING");
    }
}
