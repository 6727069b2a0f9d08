//! Bitrate pacing: reconcile a target rate with a duration or packet count
//! into a fixed send schedule, then drive it against a transport sink.

use crate::errors::Error;
use crate::inject::TransportSink;
use crate::stats::Stats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Pacing parameters for one traffic loop, derived once from the serialized
/// packet length and never recomputed mid-run.
#[derive(Debug, Clone, PartialEq)]
pub struct PacingPlan {
    pub packet_size: usize,
    pub pps: f64,
    pub interval: Duration,
    pub total_packets: u64,
    pub total_duration: Duration,
}

impl PacingPlan {
    /// Computes the pacing plan for a packet of `packet_size` bytes sent at
    /// `rate_kbps`, bounded by a duration, a packet count, or both.
    ///
    /// When both bounds are given they are taken at face value with no
    /// cross-derivation; the send loop stops at whichever is reached first.
    pub fn resolve(
        packet_size: usize,
        rate_kbps: f64,
        duration: Option<Duration>,
        count: Option<u64>,
    ) -> Result<PacingPlan, Error> {
        let pps = (rate_kbps * 1000.0) / (8.0 * packet_size as f64);
        if !(pps > 0.0) {
            return Err(Error::InvalidRate(format!(
                "{rate_kbps} kbps over {packet_size}-byte packets gives {pps:.2} pps"
            )));
        }
        let (total_packets, total_duration) = match (duration, count) {
            (Some(d), None) => ((pps * d.as_secs_f64()).floor() as u64, d),
            (None, Some(c)) => (c, Duration::from_secs_f64(c as f64 / pps)),
            (Some(d), Some(c)) => (c, d),
            (None, None) => {
                return Err(Error::InvalidRate(
                    "a duration or a packet count is required".to_string(),
                ))
            }
        };
        let interval = Duration::from_secs_f64(1.0 / pps);
        if interval.is_zero() {
            // A zero tick would degenerate into a busy loop.
            return Err(Error::InvalidRate(format!(
                "tick interval for {pps:.2} pps is below timer resolution"
            )));
        }
        Ok(PacingPlan {
            packet_size,
            pps,
            interval,
            total_packets,
            total_duration,
        })
    }
}

/// Outcome of one finished traffic loop.
#[derive(Debug, Clone, Default)]
pub struct SendStats {
    pub sent: u64,
    pub write_errors: u64,
    pub elapsed: Duration,
    pub actual_kbps: f64,
}

/// Sends `packet` through `sink` once per tick until the plan's packet count
/// or duration is exhausted, or cancellation is requested.
///
/// The tick receiver is the only suspension point; the thread blocks between
/// fires. Write failures are counted and logged but never end the loop.
pub fn run(
    name: &str,
    plan: &PacingPlan,
    packet: &[u8],
    sink: &mut dyn TransportSink,
    monitor: &Stats,
    cancel: &AtomicBool,
) -> SendStats {
    log::info!(
        "[{name}] start pps={:.2} packets={} duration={:?} size={}B",
        plan.pps,
        plan.total_packets,
        plan.total_duration,
        plan.packet_size
    );
    let ticker = crossbeam_channel::tick(plan.interval);
    let mut sent: u64 = 0;
    let mut write_errors: u64 = 0;
    let start = Instant::now();
    while ticker.recv().is_ok() {
        if sent >= plan.total_packets
            || start.elapsed() > plan.total_duration
            || cancel.load(Ordering::Relaxed)
        {
            break;
        }
        match sink.send(packet) {
            Ok(()) => {
                sent += 1;
                monitor.count(packet.len());
            }
            Err(e) => {
                write_errors += 1;
                log::error!("[{name}] send failed: {e}");
            }
        }
    }
    let elapsed = start.elapsed();
    let actual_kbps = (sent * plan.packet_size as u64 * 8) as f64 / (elapsed.as_secs_f64() * 1000.0);
    log::info!("[{name}] done sent={sent} errors={write_errors} elapsed={elapsed:?} actual={actual_kbps:.2}kbps");
    SendStats {
        sent,
        write_errors,
        elapsed,
        actual_kbps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct RecordingSink {
        sent: Vec<Vec<u8>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Self {
            RecordingSink { sent: vec![], fail }
        }
    }

    impl TransportSink for RecordingSink {
        fn send(&mut self, packet: &[u8]) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "sink down"));
            }
            self.sent.push(packet.to_vec());
            Ok(())
        }
    }

    #[test]
    fn resolve_from_duration() {
        // 1000 kbps over 125-byte packets is exactly 1000 pps
        let plan =
            PacingPlan::resolve(125, 1000.0, Some(Duration::from_secs(2)), None).unwrap();
        assert_eq!(plan.pps, 1000.0);
        assert_eq!(plan.total_packets, 2000);
        assert_eq!(plan.total_duration, Duration::from_secs(2));
        assert_eq!(plan.interval, Duration::from_millis(1));
    }

    #[test]
    fn resolve_from_count() {
        let plan = PacingPlan::resolve(125, 1000.0, None, Some(500)).unwrap();
        assert_eq!(plan.total_packets, 500);
        let implied = plan.total_duration.as_secs_f64();
        assert!((implied - 0.5).abs() < 1e-9);
    }

    #[test]
    fn resolve_takes_both_bounds_at_face_value() {
        let plan = PacingPlan::resolve(
            125,
            1000.0,
            Some(Duration::from_secs(60)),
            Some(10),
        )
        .unwrap();
        assert_eq!(plan.total_packets, 10);
        assert_eq!(plan.total_duration, Duration::from_secs(60));
    }

    #[test]
    fn resolve_rejects_nonpositive_rates() {
        for rate in [0.0, -5.0] {
            let err = PacingPlan::resolve(125, rate, None, Some(1)).unwrap_err();
            assert!(matches!(err, Error::InvalidRate(_)));
        }
    }

    #[test]
    fn resolve_requires_a_bound() {
        let err = PacingPlan::resolve(125, 1000.0, None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidRate(_)));
    }

    #[test]
    fn resolve_fails_fast_on_subnanosecond_ticks() {
        // 10 Tbps over 1-byte packets: the tick truncates to zero
        let err = PacingPlan::resolve(1, 1e10, None, Some(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidRate(_)));
    }

    #[test]
    fn run_stops_at_the_packet_count() {
        let plan = PacingPlan::resolve(
            125,
            1000.0,
            Some(Duration::from_secs(10)),
            Some(5),
        )
        .unwrap();
        let packet = vec![0xAB; 125];
        let mut sink = RecordingSink::new(false);
        let monitor = Stats::default();
        let cancel = AtomicBool::new(false);
        let stats = run("test", &plan, &packet, &mut sink, &monitor, &cancel);
        assert_eq!(stats.sent, 5);
        assert_eq!(stats.write_errors, 0);
        assert_eq!(sink.sent.len(), 5);
        assert!(sink.sent.iter().all(|p| p == &packet));
        assert!(stats.sent <= plan.total_packets);
    }

    #[test]
    fn run_stops_at_the_duration() {
        let plan = PacingPlan::resolve(
            125,
            1000.0,
            Some(Duration::from_millis(30)),
            Some(100_000),
        )
        .unwrap();
        let packet = vec![0u8; 125];
        let mut sink = RecordingSink::new(false);
        let monitor = Stats::default();
        let cancel = AtomicBool::new(false);
        let stats = run("test", &plan, &packet, &mut sink, &monitor, &cancel);
        assert!(stats.sent < 100_000);
        assert!(stats.elapsed >= Duration::from_millis(30));
        // the loop may overshoot by at most the tick granularity, plus slack
        // for scheduler jitter
        assert!(
            stats.elapsed < plan.total_duration + 10 * plan.interval + Duration::from_millis(100)
        );
    }

    #[test]
    fn run_swallows_write_errors() {
        let plan = PacingPlan::resolve(
            125,
            1000.0,
            Some(Duration::from_millis(20)),
            Some(3),
        )
        .unwrap();
        let packet = vec![0u8; 125];
        let mut sink = RecordingSink::new(true);
        let monitor = Stats::default();
        let cancel = AtomicBool::new(false);
        let stats = run("test", &plan, &packet, &mut sink, &monitor, &cancel);
        // failed writes never count as sent, and never abort the loop
        assert_eq!(stats.sent, 0);
        assert!(stats.write_errors >= 1);
        assert!(stats.elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn run_honors_cancellation() {
        let plan =
            PacingPlan::resolve(125, 1000.0, Some(Duration::from_secs(10)), None).unwrap();
        let packet = vec![0u8; 125];
        let mut sink = RecordingSink::new(false);
        let monitor = Stats::default();
        let cancel = AtomicBool::new(true);
        let stats = run("test", &plan, &packet, &mut sink, &monitor, &cancel);
        assert_eq!(stats.sent, 0);
        assert!(stats.elapsed < Duration::from_secs(1));
    }
}
