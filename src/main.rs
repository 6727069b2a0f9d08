use rafale::errors::Error;
use rafale::inject::{self, FrameAddrs, TransportSink, UdpSink, WireSink};
use rafale::schedule::{self, PacingPlan, SendStats};
use rafale::snmp::{self, RequestKind, SnmpParams};
use rafale::stats::Stats;
use rafale::tls::TlsRecord;

mod cmd;

use clap::Parser;
use rand_core::SeedableRng;
use rand_pcg::Pcg32;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cmd::Args::parse();

    // First Ctrl-C asks the loops to stop at their next tick, second aborts
    let cancel = Arc::new(AtomicBool::new(false));
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        if !c.load(Ordering::Relaxed) {
            log::warn!("Stopping the traffic loops, please wait");
            c.store(true, Ordering::Relaxed);
        } else {
            log::warn!("Ending immediately");
            process::abort();
        }
    })
    .expect("Error setting Ctrl-C handler");

    let monitor = Arc::new(Stats::default());
    let monitoring = Arc::new(AtomicBool::new(true));
    let monitor_handle = {
        let monitor = Arc::clone(&monitor);
        let monitoring = Arc::clone(&monitoring);
        let builder = thread::Builder::new().name("monitoring".into());
        builder
            .spawn(move || rafale::stats::run(monitor, monitoring))
            .unwrap()
    };

    let outcome = match args.command {
        cmd::Command::Snmp(snmp_args) => run_snmp(snmp_args, &monitor, &cancel),
        cmd::Command::Tls(tls_args) => run_tls(tls_args, &monitor, &cancel),
    };

    monitoring.store(false, Ordering::Relaxed);
    monitor_handle.join().unwrap();

    match outcome {
        Ok(()) => log::info!("All traffic loops finished"),
        Err(e) => {
            log::error!("{e}");
            process::exit(1);
        }
    }
}

/// Spawns one named send loop owning its plan, packet and sink.
fn spawn_loop(
    name: String,
    plan: PacingPlan,
    packet: Vec<u8>,
    mut sink: impl TransportSink + 'static,
    monitor: Arc<Stats>,
    cancel: Arc<AtomicBool>,
) -> thread::JoinHandle<SendStats> {
    let builder = thread::Builder::new().name(format!("send-{name}"));
    builder
        .spawn(move || schedule::run(&name, &plan, &packet, &mut sink, &monitor, &cancel))
        .unwrap()
}

fn join_loops(loops: Vec<thread::JoinHandle<SendStats>>) {
    for handle in loops {
        match handle.join() {
            Ok(stats) => log::debug!("loop finished: {stats:?}"),
            Err(_) => log::error!("a traffic loop panicked"),
        }
    }
}

fn run_snmp(
    args: cmd::SnmpArgs,
    monitor: &Arc<Stats>,
    cancel: &Arc<AtomicBool>,
) -> Result<(), Error> {
    let dest: SocketAddr = format!("{}:{}", args.dest, args.port)
        .to_socket_addrs()
        .map_err(|e| Error::TransportOpen(format!("{}:{}: {e}", args.dest, args.port)))?
        .next()
        .ok_or_else(|| Error::TransportOpen(format!("cannot resolve {}", args.dest)))?;

    let params = SnmpParams {
        version: args.version,
        community: args.community,
        v3_user: args.v3_user,
        v3_sec_level: args.v3_sec_level,
        v3_auth_proto: args.v3_auth_proto,
        v3_auth_pass: args.v3_auth_pass,
        v3_priv_proto: args.v3_priv_proto,
        v3_priv_pass: args.v3_priv_pass,
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    log::info!("Generating with seed {seed}");

    let selected = [
        (args.get, RequestKind::Get),
        (args.getnext, RequestKind::GetNext),
        (args.set, RequestKind::Set),
        (args.trap, RequestKind::Trap),
        (args.getbulk, RequestKind::GetBulk),
        (args.inform, RequestKind::Inform),
        (args.report, RequestKind::Report),
    ];

    let mut loops = vec![];
    for (i, kind) in selected
        .into_iter()
        .filter_map(|(on, kind)| on.then_some(kind))
        .enumerate()
    {
        // every loop gets its own RNG stream so runs stay reproducible
        // whatever the kind selection
        let mut rng = Pcg32::seed_from_u64(seed.wrapping_add(i as u64));
        let name = kind.to_string();
        let packet = match snmp::synthesize(kind, &params, &mut rng) {
            Ok(packet) => packet,
            Err(e) => {
                log::error!("[{name}] {e}");
                continue;
            }
        };
        let plan = match PacingPlan::resolve(packet.len(), args.rate, args.duration, args.count) {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("[{name}] {e}");
                continue;
            }
        };
        let sink = match UdpSink::open(dest) {
            Ok(sink) => sink,
            Err(e) => {
                log::error!("[{name}] {e}");
                continue;
            }
        };
        loops.push(spawn_loop(
            name,
            plan,
            packet,
            sink,
            Arc::clone(monitor),
            Arc::clone(cancel),
        ));
    }
    join_loops(loops);
    Ok(())
}

fn run_tls(
    args: cmd::TlsArgs,
    monitor: &Arc<Stats>,
    cancel: &Arc<AtomicBool>,
) -> Result<(), Error> {
    let dst_ip: Ipv4Addr = args
        .dest
        .parse()
        .map_err(|_| Error::TransportOpen(format!("not an IPv4 address: {}", args.dest)))?;
    let (src_mac, src_ip) = inject::interface_ipv4(&args.iface)?;
    let addrs = FrameAddrs {
        src_mac,
        dst_mac: inject::DST_MAC,
        src_ip,
        dst_ip,
        dst_port: args.port,
    };

    let mut loops = vec![];
    for content_type in args.types {
        let name = format!("type-{content_type}");
        let record = TlsRecord::build(content_type);
        let frame = match inject::tcp_frame(&record, &addrs) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("[{name}] {e}");
                continue;
            }
        };
        let plan = match PacingPlan::resolve(frame.len(), args.rate, args.duration, args.count) {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("[{name}] {e}");
                continue;
            }
        };
        let sink = match WireSink::open(&args.iface) {
            Ok(sink) => sink,
            Err(e) => {
                log::error!("[{name}] {e}");
                continue;
            }
        };
        loops.push(spawn_loop(
            name,
            plan,
            frame,
            sink,
            Arc::clone(monitor),
            Arc::clone(cancel),
        ));
    }
    join_loops(loops);
    Ok(())
}
