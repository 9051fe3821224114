//! `pdvtest`: the command-line entry point. Parses arguments and the
//! configuration file, wires the conductor's packet I/O and clock
//! collaborators, runs the test, and prints each active direction's report.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use pdvtest::cli::Args;
use pdvtest::conductor::{self, DirectionConfig};
use pdvtest::config::{self, RunConfig};
use pdvtest::error::PdvError;
use pdvtest::evaluator::EvaluationReport;
use pdvtest::portio::{Clock, PacketPort, TscClock};
use pdvtest::sender::SenderConfig;

fn build_direction_configs(
    args: &Args,
    cfg: &RunConfig,
) -> (Option<DirectionConfig>, Option<DirectionConfig>) {
    let global_timeout_ms = args.global_timeout as u64;

    let forward = cfg.forward.then(|| DirectionConfig {
        sender: SenderConfig {
            ipv6_frame_size: args.ipv6_frame_size,
            ipv4_frame_size: args.ipv4_frame_size(),
            frame_rate: args.frame_rate,
            duration: args.duration,
            n: args.n,
            m: args.m,
            num_dest_nets: cfg.num_dest_nets_forward,
            ip_version: cfg.forward_ip_version,
            dst_mac: cfg.dut_mac,
            src_mac: cfg.tester_mac,
            src_ipv4: cfg.tester_ipv4,
            dst_ipv4: cfg.dut_ipv4,
            src_ipv6: cfg.tester_ipv6,
            dst_ipv6: cfg.dut_ipv6,
            src_bg: cfg.background_tester_ipv6,
            dst_bg: cfg.background_dut_ipv6,
        },
        global_timeout_ms,
        frame_timeout_ms: args.frame_timeout,
        sender_core: cfg.forward_sender_core,
        receiver_core: cfg.forward_receiver_core,
    });

    let reverse = cfg.reverse.then(|| DirectionConfig {
        sender: SenderConfig {
            ipv6_frame_size: args.ipv6_frame_size,
            ipv4_frame_size: args.ipv4_frame_size(),
            frame_rate: args.frame_rate,
            duration: args.duration,
            n: args.n,
            m: args.m,
            num_dest_nets: cfg.num_dest_nets_reverse,
            ip_version: cfg.reverse_ip_version,
            dst_mac: cfg.tester_mac,
            src_mac: cfg.dut_mac,
            src_ipv4: cfg.dut_ipv4,
            dst_ipv4: cfg.tester_ipv4,
            src_ipv6: cfg.dut_ipv6,
            dst_ipv6: cfg.tester_ipv6,
            src_bg: cfg.background_dut_ipv6,
            dst_bg: cfg.background_tester_ipv6,
        },
        global_timeout_ms,
        frame_timeout_ms: args.frame_timeout,
        sender_core: cfg.reverse_sender_core,
        receiver_core: cfg.reverse_receiver_core,
    });

    (forward, reverse)
}

fn run() -> Result<(), PdvError> {
    let args = Args::parse();
    args.validate()?;

    let text = std::fs::read_to_string(&args.config)
        .map_err(|e| PdvError::Configuration(format!("reading {:?}: {e}", args.config)))?;
    let cfg = config::parse(&text)?;

    let (forward_dir, reverse_dir) = build_direction_configs(&args, &cfg);

    // No DPDK-backed `PacketPort` ships in this repository (see DESIGN.md):
    // the engine is generic over the trait boundary, but wiring a real
    // poll-mode driver's TX/RX queues in here is left to a deployment. The
    // clock is real hardware-cycle timing; the port is the `ChannelPort`
    // loopback, the same test double the engine's own tests use, so this
    // binary runs end-to-end without talking to a NIC.
    let clock: Arc<dyn Clock> = Arc::new(TscClock::new());

    let forward = forward_dir.map(|dir_cfg| {
        let (a, b): (Arc<pdvtest::portio::ChannelPort>, Arc<pdvtest::portio::ChannelPort>) =
            pdvtest::portio::ChannelPort::pair(4096);
        (dir_cfg, a as Arc<dyn PacketPort>, b as Arc<dyn PacketPort>)
    });
    let reverse = reverse_dir.map(|dir_cfg| {
        let (a, b): (Arc<pdvtest::portio::ChannelPort>, Arc<pdvtest::portio::ChannelPort>) =
            pdvtest::portio::ChannelPort::pair(4096);
        (dir_cfg, a as Arc<dyn PacketPort>, b as Arc<dyn PacketPort>)
    });

    let results = conductor::conduct(forward, reverse, clock)?;

    for result in &results {
        match &result.report {
            EvaluationReport::FullPdv {
                dmin_ms,
                dmax_ms,
                d999_ms,
                pdv_ms,
                frames_lost,
                num_corrected,
                ..
            } => println!(
                "{}: Dmin={:.3}ms Dmax={:.3}ms D99.9={:.3}ms PDV={:.3}ms lost={} corrected={}",
                result.side, dmin_ms, dmax_ms, d999_ms, pdv_ms, frames_lost, num_corrected,
            ),
            EvaluationReport::LateFrameCounting {
                frames_received,
                frames_lost,
                num_corrected,
                ..
            } => println!(
                "{}: received={} lost={} corrected={}",
                result.side, frames_received, frames_lost, num_corrected,
            ),
        }
    }

    let json = serde_json::to_string_pretty(
        &results.iter().map(|r| &r.report).collect::<Vec<_>>(),
    )
    .expect("report is always serializable");
    println!("{json}");

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("pdvtest: {e}");
            ExitCode::FAILURE
        }
    }
}
