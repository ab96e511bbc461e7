// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! moldrx-listen - Print a MoldUDP64 multicast feed in real-time
//!
//! Like `tcpdump` for the feed, but decoded: one line per packet, one
//! indented line per message.

use chrono::Local;
use clap::Parser;
use colored::*;
use moldrx::config::{MULTICAST_GROUP, MULTICAST_PORT};
use moldrx::{CancelToken, UdpReceiver};
use std::net::Ipv4Addr;

/// Listen to a MoldUDP64 multicast feed
#[derive(Parser, Debug)]
#[command(name = "moldrx-listen")]
#[command(version)]
#[command(about = "Listen to a MoldUDP64 multicast feed and print the message stream")]
struct Args {
    /// Multicast group to join
    #[arg(short, long, default_value = MULTICAST_GROUP)]
    group: Ipv4Addr,

    /// UDP port of the feed
    #[arg(short, long, default_value_t = MULTICAST_PORT)]
    port: u16,

    /// Interface address to join on (default: all non-loopback interfaces)
    #[arg(short, long)]
    iface: Option<Ipv4Addr>,

    /// Stop after N data packets (0 = unlimited; heartbeats don't count)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Hex-dump every message payload
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

    if let Err(e) = run_listen(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_listen(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancelToken::new();
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        ctrlc_cancel.cancel();
    })?;

    let mut receiver = UdpReceiver::new(args.group, args.port, args.iface)?;

    if !args.quiet {
        eprintln!(
            "{} {} {} (iface={})",
            ">>>".green().bold(),
            "Listening on".bold(),
            receiver.multicast_address().to_string().cyan(),
            args.iface
                .map_or_else(|| "all".to_string(), |i| i.to_string()),
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
    let run_result = receiver.run(&cancel, |from, packet| {
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
                    "{} session={} seq={} count={} ({})",
                    format!("[{}]", timestamp).dimmed(),
                    packet.header().session_str().trim_end().cyan(),
                    packet.header().sequence_number.to_string().yellow(),
                    packet.header().message_count,
                    from,
                );

                for message in packet.messages() {
                    match message {
                        Ok(message) => {
                            messages += 1;
                            if args.verbose {
                                println!("  #{} ({} bytes)", message.index, message.data.len());
                                print_hex_dump(message.data);
                            } else {
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
                eprintln!("{}: {} (from {})", "Warning".yellow(), t, from);
            }
        }
    });

    if !args.quiet {
        let stats = receiver.stats();
        eprintln!(
            "\n{} Received {} packet(s): {} data, {} heartbeat(s), {} message(s), {} truncated",
            "---".dimmed(),
            stats.packets_received,
            data_packets,
            heartbeats,
            messages,
            truncated,
        );
    }

    run_result?;
    Ok(())
}

/// First bytes as hex, abbreviated.
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

fn print_hex_dump(data: &[u8]) {
    for (i, chunk) in data.chunks(16).enumerate() {
        print!("  {:04x}  ", i * 16);

        for (j, byte) in chunk.iter().enumerate() {
            if j == 8 {
                print!(" ");
            }
            print!("{:02x} ", byte);
        }

        for j in chunk.len()..16 {
            if j == 8 {
                print!(" ");
            }
            print!("   ");
        }

        print!(" |");
        for byte in chunk {
            print!(
                "{}",
                if *byte >= 0x20 && *byte < 0x7f {
                    *byte as char
                } else {
                    '.'
                }
            );
        }
        println!("|");
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
