// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MoldUDP64 packet assembly.
//!
//! [`PacketBuilder`] appends message blocks behind a packet header and
//! patches the message count on [`finish`](PacketBuilder::finish). Used by
//! the feed tool and by tests that need wire-exact datagrams.

use std::fmt;

use super::header::{PacketHeader, PACKET_HEADER_LEN};

/// A message cannot be framed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// Message payload exceeds the 16-bit length field
    MessageTooLong {
        /// Rejected payload length
        len: usize,
    },
    /// Packet already holds 65535 messages
    TooManyMessages,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::MessageTooLong { len } => {
                write!(f, "message of {len} bytes exceeds the u16 length field")
            }
            EncodeError::TooManyMessages => {
                write!(f, "packet already holds 65535 messages")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Incremental MoldUDP64 packet builder.
///
/// # Examples
///
/// ```
/// use moldrx::protocol::PacketBuilder;
///
/// let mut builder = PacketBuilder::new("ABC", 42);
/// builder.push(b"FOO").unwrap();
/// builder.push(b"BARZ").unwrap();
/// let datagram = builder.finish();
/// assert_eq!(datagram.len(), 20 + 2 + 3 + 2 + 4);
/// ```
#[derive(Clone, Debug)]
pub struct PacketBuilder {
    buf: Vec<u8>,
    count: u16,
}

impl PacketBuilder {
    /// Start a packet. `sequence_number` is the sequence of the first
    /// message that will be pushed.
    #[must_use]
    pub fn new(session: &str, sequence_number: u64) -> Self {
        let header = PacketHeader::new(session, sequence_number, 0);
        Self {
            buf: header.encode().to_vec(),
            count: 0,
        }
    }

    /// Append one message block.
    ///
    /// # Errors
    ///
    /// Fails when `payload` does not fit the 2-byte length field or when
    /// the packet is already at 65535 messages. The packet is unchanged on
    /// failure.
    pub fn push(&mut self, payload: &[u8]) -> Result<(), EncodeError> {
        let len = u16::try_from(payload.len())
            .map_err(|_| EncodeError::MessageTooLong { len: payload.len() })?;
        if self.count == u16::MAX {
            return Err(EncodeError::TooManyMessages);
        }

        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(payload);
        self.count += 1;
        Ok(())
    }

    /// Messages pushed so far.
    #[must_use]
    pub fn message_count(&self) -> u16 {
        self.count
    }

    /// Wire size of the packet as built so far (bytes).
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True until the first message is pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Finalize: patch the message count into the header and return the
    /// datagram. A builder finished without any pushes yields a heartbeat.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.buf[PACKET_HEADER_LEN - 2..PACKET_HEADER_LEN]
            .copy_from_slice(&self.count.to_be_bytes());
        self.buf
    }
}

/// Build a packet from a slice of message payloads in one call.
///
/// # Errors
///
/// Same conditions as [`PacketBuilder::push`].
pub fn build_packet(
    session: &str,
    sequence_number: u64,
    payloads: &[&[u8]],
) -> Result<Vec<u8>, EncodeError> {
    let mut builder = PacketBuilder::new(session, sequence_number);
    for payload in payloads {
        builder.push(payload)?;
    }
    Ok(builder.finish())
}

/// Encode a heartbeat: a bare header with message count 0.
#[must_use]
pub fn heartbeat(session: &str, sequence_number: u64) -> [u8; PACKET_HEADER_LEN] {
    PacketHeader::new(session, sequence_number, 0).encode()
}
