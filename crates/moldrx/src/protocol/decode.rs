// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Zero-copy MoldUDP64 packet decoding.
//!
//! [`decode`] validates the 20-byte packet header and hands back a
//! [`MoldPacket`] view over the datagram. Message blocks are walked lazily
//! by [`Messages`]; each item borrows its payload straight from the input
//! buffer, so nothing is copied and nothing allocates.
//!
//! Both receive paths (the socket receiver and the burst capture path)
//! funnel into this one function. There is exactly one framing walk in the
//! crate.

use std::fmt;

use super::header::{PacketHeader, MESSAGE_HEADER_LEN, PACKET_HEADER_LEN};

// ============================================================================
// Truncation errors
// ============================================================================

/// A datagram ended before the structure it announced.
///
/// Truncation is recoverable: it poisons the current packet only, and the
/// messages decoded before the cut are still valid. Receivers count it and
/// move on to the next datagram.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truncation {
    /// Fewer than 20 bytes; no packet header could be read
    PacketHeader {
        /// Bytes actually available
        len: usize,
    },
    /// A message header was announced but fewer than 2 bytes remain
    MessageHeader {
        /// Index of the message that could not be read
        index: u16,
        /// Bytes remaining in the buffer
        remaining: usize,
    },
    /// A message header declared more payload than the buffer holds
    MessageBody {
        /// Index of the message that could not be read
        index: u16,
        /// Length the header declared
        declared: u16,
        /// Bytes actually remaining after the header
        remaining: usize,
    },
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Truncation::PacketHeader { len } => {
                write!(f, "truncated packet header: {len} of {PACKET_HEADER_LEN} bytes")
            }
            Truncation::MessageHeader { index, remaining } => write!(
                f,
                "truncated header of message {index}: {remaining} of {MESSAGE_HEADER_LEN} bytes"
            ),
            Truncation::MessageBody {
                index,
                declared,
                remaining,
            } => write!(
                f,
                "truncated body of message {index}: {remaining} of {declared} bytes"
            ),
        }
    }
}

impl std::error::Error for Truncation {}

// ============================================================================
// Packet view
// ============================================================================

/// Decoded view over one MoldUDP64 datagram.
///
/// Borrows the input buffer; must not outlive it. Heartbeats decode like any
/// other packet, they just carry zero messages.
#[derive(Clone, Copy, Debug)]
pub struct MoldPacket<'a> {
    header: PacketHeader,
    body: &'a [u8],
}

/// One message block inside a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message<'a> {
    /// Position of this message within its packet, starting at 0.
    ///
    /// The message's own sequence number is `header.sequence_number + index`.
    pub index: u16,
    /// Message payload, borrowed from the datagram buffer
    pub data: &'a [u8],
}

/// Decode one datagram.
///
/// # Errors
///
/// Returns [`Truncation::PacketHeader`] if `datagram` is shorter than 20
/// bytes. Truncation inside the message area is reported later, by the
/// [`Messages`] iterator, so that the messages before the cut are not lost.
pub fn decode(datagram: &[u8]) -> Result<MoldPacket<'_>, Truncation> {
    let header = PacketHeader::decode(datagram)?;
    Ok(MoldPacket {
        header,
        body: &datagram[PACKET_HEADER_LEN..],
    })
}

impl<'a> MoldPacket<'a> {
    /// The decoded packet header.
    #[must_use]
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    /// True when the packet carries no messages.
    ///
    /// Senders emit these periodically so receivers can tell an idle feed
    /// from a dead one.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.header.message_count == 0
    }

    /// Iterate over the message blocks.
    ///
    /// The iterator yields exactly `message_count` messages for a
    /// well-formed packet. On a truncated packet it yields the intact
    /// messages first, then one `Err`, then ends; it never resumes past an
    /// error.
    #[must_use]
    pub fn messages(&self) -> Messages<'a> {
        Messages {
            body: self.body,
            offset: 0,
            index: 0,
            count: self.header.message_count,
            done: false,
        }
    }
}

// ============================================================================
// Message iterator
// ============================================================================

/// Lazy walk over the message blocks of one packet.
///
/// Created by [`MoldPacket::messages`].
#[derive(Clone, Debug)]
pub struct Messages<'a> {
    body: &'a [u8],
    offset: usize,
    index: u16,
    count: u16,
    done: bool,
}

impl<'a> Iterator for Messages<'a> {
    type Item = Result<Message<'a>, Truncation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.index >= self.count {
            self.done = true;
            return None;
        }

        let remaining = self.body.len() - self.offset;
        if remaining < MESSAGE_HEADER_LEN {
            self.done = true;
            return Some(Err(Truncation::MessageHeader {
                index: self.index,
                remaining,
            }));
        }

        let declared = u16::from_be_bytes([self.body[self.offset], self.body[self.offset + 1]]);
        self.offset += MESSAGE_HEADER_LEN;

        let remaining = self.body.len() - self.offset;
        if remaining < declared as usize {
            self.done = true;
            return Some(Err(Truncation::MessageBody {
                index: self.index,
                declared,
                remaining,
            }));
        }

        let data = &self.body[self.offset..self.offset + declared as usize];
        self.offset += declared as usize;

        let message = Message {
            index: self.index,
            data,
        };
        self.index += 1;
        Some(Ok(message))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        // Upper bound only: truncation can end the walk early
        (0, Some(usize::from(self.count - self.index)))
    }
}
