// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fuzz target for the MoldUDP64 packet decoder.
//!
//! Feeds arbitrary bytes through `decode()` and drains the message
//! iterator. The decoder must never panic or read out of bounds no
//! matter how the header and length prefixes lie about the payload.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = moldrx::protocol::decode(data) {
        let header = packet.header();
        let _ = header.session_str();
        let _ = packet.is_heartbeat();
        for message in packet.messages() {
            match message {
                Ok(msg) => {
                    // Touch the payload so slicing bugs surface.
                    let _ = msg.data.len();
                    let _ = msg.index;
                }
                Err(_) => break,
            }
        }
    }
});
