// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fuzz target for the raw-frame classifier.
//!
//! Runs the Ethernet/IPv4/UDP dissector over arbitrary bytes and, when
//! a frame survives filtering, pushes the extracted payload through the
//! MoldUDP64 decoder. Covers the full capture path: runt handling, IHL
//! arithmetic, UDP length clamping, and payload slicing.

#![no_main]

use std::net::Ipv4Addr;

use libfuzzer_sys::fuzz_target;
use moldrx::capture::{FrameClass, FrameFilter};

fuzz_target!(|data: &[u8]| {
    let filter = FrameFilter::new(Ipv4Addr::new(239, 1, 1, 1), 9000);
    match filter.classify(data) {
        FrameClass::Feed(payload) => {
            if let Ok(packet) = moldrx::protocol::decode(payload) {
                for message in packet.messages() {
                    if message.is_err() {
                        break;
                    }
                }
            }
        }
        FrameClass::Skipped(reason) => {
            let _ = reason.to_string();
        }
    }
});
