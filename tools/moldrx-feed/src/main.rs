// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! moldrx-feed - Publish a synthetic MoldUDP64 feed
//!
//! Sends paced packets with deterministic payloads so receivers can be
//! eyeballed or soak-tested without exchange connectivity. Sequence numbers
//! advance by the message count of each packet, the way a real feed's do.

use clap::Parser;
use colored::*;
use moldrx::config::{MULTICAST_GROUP, MULTICAST_PORT};
use moldrx::protocol::PacketBuilder;
use moldrx::{CancelToken, UdpSender};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// Publish a synthetic MoldUDP64 multicast feed
#[derive(Parser, Debug)]
#[command(name = "moldrx-feed")]
#[command(version)]
#[command(about = "Publish a synthetic MoldUDP64 multicast feed for testing")]
struct Args {
    /// Multicast group to send to
    #[arg(short, long, default_value = MULTICAST_GROUP)]
    group: Ipv4Addr,

    /// UDP port of the feed
    #[arg(short, long, default_value_t = MULTICAST_PORT)]
    port: u16,

    /// Session identifier (at most 10 bytes; padded on the wire)
    #[arg(short, long, default_value = "MOLDTEST")]
    session: String,

    /// First sequence number
    #[arg(long, default_value = "1")]
    seq: u64,

    /// Packets per second
    #[arg(short, long, default_value = "10")]
    rate: u32,

    /// Stop after N packets (0 = unlimited)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Messages per packet (0 = send heartbeats only)
    #[arg(short, long, default_value = "2")]
    messages: u16,

    /// Payload bytes per message
    #[arg(long, default_value = "40")]
    payload_size: u16,

    /// Multicast TTL
    #[arg(long, default_value = "1")]
    ttl: u32,

    /// Loop datagrams back to local receivers
    #[arg(long)]
    loopback: bool,

    /// Quiet mode - no per-packet output
    #[arg(short, long)]
    quiet: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.no_color || !is_tty() {
        colored::control::set_override(false);
    }

    if let Err(e) = run_feed(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_feed(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.rate == 0 {
        return Err("rate must be at least 1 packet/s".into());
    }

    let cancel = CancelToken::new();
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        ctrlc_cancel.cancel();
    })?;

    let sender = UdpSender::new(args.group, args.port)?;
    sender.set_multicast_ttl(args.ttl)?;
    sender.set_multicast_loopback(args.loopback)?;

    if !args.quiet {
        let source = moldrx::transport::get_primary_interface_ip().unwrap_or(Ipv4Addr::UNSPECIFIED);
        eprintln!(
            "{} {} {} via {} (session={}, {} msg/pkt, {} pkt/s)",
            ">>>".green().bold(),
            "Feeding".bold(),
            sender.multicast_address().to_string().cyan(),
            source,
            args.session.cyan(),
            args.messages,
            args.rate,
        );
        eprintln!("{}", "Press Ctrl+C to stop".dimmed());
        eprintln!();
    }

    let interval = Duration::from_secs(1) / args.rate;
    let mut next_send = Instant::now();
    let mut seq = args.seq;
    let mut sent = 0u64;
    let mut bytes = 0u64;

    while !cancel.is_cancelled() {
        if args.count > 0 && sent >= args.count {
            break;
        }

        let mut builder = PacketBuilder::new(&args.session, seq);
        for index in 0..args.messages {
            let payload = synth_payload(seq + u64::from(index), args.payload_size);
            builder.push(&payload)?;
        }
        let datagram = builder.finish();

        bytes += sender.send(&datagram)? as u64;
        sent += 1;

        if !args.quiet {
            if args.messages == 0 {
                println!("{} seq={}", "heartbeat".dimmed(), seq);
            } else {
                println!(
                    "sent seq={}..{} ({} bytes)",
                    seq.to_string().yellow(),
                    seq + u64::from(args.messages) - 1,
                    datagram.len(),
                );
            }
        }

        // Heartbeats carry the next expected sequence and do not advance it
        seq += u64::from(args.messages);

        next_send += interval;
        let now = Instant::now();
        if next_send > now {
            std::thread::sleep(next_send - now);
        } else {
            // Fell behind; resynchronize instead of bursting to catch up
            next_send = now;
        }
    }

    if !args.quiet {
        eprintln!(
            "\n{} Sent {} packet(s), {} bytes, final seq={}",
            "---".dimmed(),
            sent,
            bytes,
            seq,
        );
    }

    Ok(())
}

/// Deterministic payload: printable preamble, then a cycling fill.
fn synth_payload(seq: u64, size: u16) -> Vec<u8> {
    let mut payload = format!("MSG {seq:010}").into_bytes();
    payload.truncate(size as usize);
    let mut fill = 0u8;
    while payload.len() < size as usize {
        payload.push(b'A' + (fill % 26));
        fill = fill.wrapping_add(1);
    }
    payload
}

fn is_tty() -> bool {
    #[cfg(unix)]
    unsafe {
        libc::isatty(libc::STDOUT_FILENO) != 0
    }
    #[cfg(not(unix))]
    true
}
