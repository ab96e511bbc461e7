// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! moldrx-capture - Print a MoldUDP64 feed captured from a raw ring
//!
//! Same output as moldrx-listen, but the frames come from an AF_PACKET
//! mmap ring instead of a UDP socket, so the kernel's UDP stack is never
//! involved. Needs CAP_NET_RAW (or root) and Linux.

use clap::Parser;
use colored::*;
use moldrx::config::{MULTICAST_GROUP, MULTICAST_PORT};
use std::net::Ipv4Addr;

/// Capture a MoldUDP64 feed from an AF_PACKET ring
#[derive(Parser, Debug)]
#[command(name = "moldrx-capture")]
#[command(version)]
#[command(about = "Capture a MoldUDP64 feed from an AF_PACKET mmap ring (Linux)")]
struct Args {
    /// Network interface to capture from (e.g. eth0)
    iface: String,

    /// Multicast group to accept
    #[arg(short, long, default_value = MULTICAST_GROUP)]
    group: Ipv4Addr,

    /// UDP port of the feed
    #[arg(short, long, default_value_t = MULTICAST_PORT)]
    port: u16,

    /// Stop after N data packets (0 = unlimited; heartbeats don't count)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Print per-message payload previews
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - no header, no heartbeats, no summary
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

    if let Err(e) = run_capture(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(target_os = "linux")]
fn run_capture(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    use chrono::Local;
    use moldrx::{AfPacketBackend, BurstReceiver, CancelToken};

    let cancel = CancelToken::new();
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        ctrlc_cancel.cancel();
    })?;

    let backend = AfPacketBackend::new(&args.iface)?;
    let mut receiver = BurstReceiver::new(backend, args.group, args.port)?;

    if !args.quiet {
        eprintln!(
            "{} {} {} on {} (ring capture)",
            ">>>".green().bold(),
            "Capturing".bold(),
            receiver.multicast_address().to_string().cyan(),
            args.iface.cyan(),
        );
        eprintln!("{}", "Press Ctrl+C to stop".dimmed());
        eprintln!();
    }

    let mut data_packets = 0u64;
    let mut messages = 0u64;
    let mut heartbeats = 0u64;
    let mut truncated = 0u64;

    let max_packets = args.count;
    let stop = cancel.clone();
    let run_result = receiver.run(&cancel, |packet| {
        let timestamp = Local::now().format("%H:%M:%S%.6f");

        match packet {
            Ok(packet) if packet.is_heartbeat() => {
                heartbeats += 1;
                if !args.quiet {
                    println!(
                        "{} {} session={} seq={}",
                        format!("[{}]", timestamp).dimmed(),
                        "heartbeat".dimmed(),
                        packet.header().session_str().trim_end(),
                        packet.header().sequence_number,
                    );
                }
            }
            Ok(packet) => {
                data_packets += 1;
                println!(
                    "{} session={} seq={} count={}",
                    format!("[{}]", timestamp).dimmed(),
                    packet.header().session_str().trim_end().cyan(),
                    packet.header().sequence_number.to_string().yellow(),
                    packet.header().message_count,
                );

                for message in packet.messages() {
                    match message {
                        Ok(message) => {
                            messages += 1;
                            if args.verbose {
                                println!(
                                    "  #{} {} ({} bytes)",
                                    message.index,
                                    preview(message.data),
                                    message.data.len(),
                                );
                            }
                        }
                        Err(t) => {
                            truncated += 1;
                            eprintln!("  {}: {}", "Warning".yellow(), t);
                        }
                    }
                }

                if max_packets > 0 && data_packets >= max_packets {
                    stop.cancel();
                }
            }
            Err(t) => {
                truncated += 1;
                eprintln!("{}: {}", "Warning".yellow(), t);
            }
        }
    });

    if !args.quiet {
        let stats = receiver.stats();
        eprintln!(
            "\n{} {} frame(s): {} filtered, {} feed packet(s), {} heartbeat(s), {} message(s), {} truncated",
            "---".dimmed(),
            stats.frames_received,
            stats.frames_filtered,
            stats.packets_received,
            heartbeats,
            messages,
            truncated,
        );
    }

    run_result?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run_capture(_args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    Err("AF_PACKET capture requires Linux; use moldrx-listen instead".into())
}

/// First bytes as hex, abbreviated.
#[cfg(target_os = "linux")]
fn preview(data: &[u8]) -> String {
    let hex: String = data
        .iter()
        .take(16)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if data.len() > 16 {
        format!("{} ...", hex)
    } else {
        hex
    }
}

fn is_tty() -> bool {
    #[cfg(unix)]
    unsafe {
        libc::isatty(libc::STDOUT_FILENO) != 0
    }
    #[cfg(not(unix))]
    true
}
