// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for receiver construction and transport failures.
//!
//! Setup errors are fatal: they surface at construction and the receiver is
//! never handed out. Runtime I/O errors propagate out of the receive calls;
//! whether to retry or abort is the driving loop's decision. Malformed feed
//! data is NOT an error - it is reported per-packet as a
//! [`crate::protocol::Truncation`] and the loop keeps running.

use std::io;

/// Errors returned by moldrx receivers and senders.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Setup Errors (fatal at construction)
    // ========================================================================
    /// The configured group address is not IPv4 multicast.
    InvalidGroup(String),
    /// Failed to bind the feed socket to its local address.
    BindFailed(String),
    /// Failed to join the multicast group.
    MulticastJoinFailed(String),
    /// Capture interface bring-up failed (socket, ring, mmap or bind).
    InterfaceInit(String),

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// I/O error from the underlying transport.
    IoError(io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Setup
            Error::InvalidGroup(addr) => {
                write!(f, "Invalid multicast group: {} (expected 224.0.0.0/4)", addr)
            }
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::MulticastJoinFailed(msg) => write!(f, "Multicast join failed: {}", msg),
            Error::InterfaceInit(msg) => write!(f, "Capture interface init failed: {}", msg),
            // Runtime
            Error::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e)
    }
}

/// Convenient alias for API results using the crate `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
