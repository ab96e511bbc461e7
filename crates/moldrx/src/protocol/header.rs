// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MoldUDP64 header codec (packet header + message header).
//!
//! Both headers are fixed-size, big-endian wire structures. The codec works
//! on explicit byte offsets into caller-owned buffers; nothing here depends
//! on in-memory struct layout and nothing allocates.

use std::borrow::Cow;

use super::Truncation;

/// Packet header size on the wire (bytes)
pub const PACKET_HEADER_LEN: usize = 20;

/// Message header size on the wire (bytes)
pub const MESSAGE_HEADER_LEN: usize = 2;

/// Session identifier field size (bytes)
pub const SESSION_LEN: usize = 10;

// Field offsets inside the packet header
const SESSION_OFFSET: usize = 0;
const SEQUENCE_OFFSET: usize = 10;
const COUNT_OFFSET: usize = 18;

/// MoldUDP64 packet header.
///
/// # Wire Format
///
/// ```text
/// 0                   1
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |        session (10 bytes ASCII)       |
/// +---------------+-----------------------+
/// |    sequence_number (u64, big-endian)  |
/// +---------------+-----------------------+
/// | message_count |  (u16, big-endian)
/// +---------------+
/// ```
///
/// `session` is space-padded, not NUL-terminated; consumers that want the
/// bare identifier must trim trailing spaces themselves. `sequence_number`
/// is the sequence of the FIRST message block in the packet;
/// `message_count` is the number of message blocks that follow the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    /// Session identifier, exactly 10 bytes, space-padded ASCII
    pub session: [u8; SESSION_LEN],
    /// Sequence number of the first message block in the packet
    pub sequence_number: u64,
    /// Number of message blocks following this header
    pub message_count: u16,
}

impl PacketHeader {
    /// Build a header from a session string.
    ///
    /// Sessions shorter than 10 bytes are right-padded with ASCII space
    /// (0x20). Sessions longer than 10 bytes are silently truncated to 10 -
    /// that is the vendor behavior on the wire and is kept as-is.
    #[must_use]
    pub fn new(session: &str, sequence_number: u64, message_count: u16) -> Self {
        let mut padded = [b' '; SESSION_LEN];
        let bytes = session.as_bytes();
        let n = bytes.len().min(SESSION_LEN);
        padded[..n].copy_from_slice(&bytes[..n]);

        Self {
            session: padded,
            sequence_number,
            message_count,
        }
    }

    /// Decode a packet header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Truncation::PacketHeader`] if fewer than 20 bytes are
    /// available.
    pub fn decode(buf: &[u8]) -> Result<Self, Truncation> {
        if buf.len() < PACKET_HEADER_LEN {
            return Err(Truncation::PacketHeader { len: buf.len() });
        }

        let mut session = [0u8; SESSION_LEN];
        session.copy_from_slice(&buf[SESSION_OFFSET..SESSION_OFFSET + SESSION_LEN]);

        let mut seq = [0u8; 8];
        seq.copy_from_slice(&buf[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 8]);

        let count = u16::from_be_bytes([buf[COUNT_OFFSET], buf[COUNT_OFFSET + 1]]);

        Ok(Self {
            session,
            sequence_number: u64::from_be_bytes(seq),
            message_count: count,
        })
    }

    /// Encode the header into its 20-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; PACKET_HEADER_LEN] {
        let mut buf = [0u8; PACKET_HEADER_LEN];
        buf[SESSION_OFFSET..SESSION_OFFSET + SESSION_LEN].copy_from_slice(&self.session);
        buf[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 8]
            .copy_from_slice(&self.sequence_number.to_be_bytes());
        buf[COUNT_OFFSET..COUNT_OFFSET + 2].copy_from_slice(&self.message_count.to_be_bytes());
        buf
    }

    /// Session as text, exactly 10 characters including trailing padding.
    ///
    /// The wire allows arbitrary bytes here; non-UTF-8 content is replaced
    /// lossily.
    #[must_use]
    pub fn session_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.session)
    }
}

/// MoldUDP64 message header: the 2-byte length prefix of one message block.
///
/// `message_length` counts the bytes of the block that immediately follows,
/// excluding the header itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    /// Length of the message block that follows (bytes)
    pub message_length: u16,
}

impl MessageHeader {
    /// Decode a message header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Truncation::MessageHeader`] if fewer than 2 bytes are
    /// available. The reported index is 0; the packet iterator substitutes
    /// the real message index when it hits this mid-packet.
    pub fn decode(buf: &[u8]) -> Result<Self, Truncation> {
        if buf.len() < MESSAGE_HEADER_LEN {
            return Err(Truncation::MessageHeader {
                index: 0,
                remaining: buf.len(),
            });
        }
        Ok(Self {
            message_length: u16::from_be_bytes([buf[0], buf[1]]),
        })
    }

    /// Encode the header into its 2-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; MESSAGE_HEADER_LEN] {
        self.message_length.to_be_bytes()
    }
}
