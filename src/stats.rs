use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Aggregate counters over every running traffic loop. Each loop still owns
/// its private SendStats; this is only for live monitoring.
pub struct Stats {
    pub start_time: Instant,
    packets_counter: Mutex<u64>,
    bytes_counter: Mutex<u64>,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            start_time: Instant::now(),
            packets_counter: Mutex::default(),
            bytes_counter: Mutex::default(),
        }
    }
}

impl Stats {
    pub fn count(&self, bytes: usize) {
        let mut pc = self.packets_counter.lock().unwrap();
        *pc += 1;
        let mut bc = self.bytes_counter.lock().unwrap();
        *bc += bytes as u64;
    }

    pub fn totals(&self) -> (u64, u64) {
        let pc = *self.packets_counter.lock().unwrap();
        let bc = *self.bytes_counter.lock().unwrap();
        (pc, bc)
    }
}

/// Periodically logs the aggregate throughput until `running` is cleared.
pub fn run(stats: Arc<Stats>, running: Arc<AtomicBool>) {
    loop {
        thread::sleep(Duration::new(5, 0));
        let (pc, bc) = stats.totals();
        let throughput = 8. * (bc as f64)
            / Instant::now().duration_since(stats.start_time).as_secs_f64()
            / 1_000_000.;
        if throughput < 1. {
            log::info!("{pc} sent packets ({:.2} kbps)", throughput * 1000.);
        } else if throughput < 1000. {
            log::info!("{pc} sent packets ({throughput:.2} Mbps)");
        } else {
            log::info!("{pc} sent packets ({:.2} Gbps)", throughput / 1000.);
        }
        if !running.load(Ordering::Relaxed) {
            break;
        }
    }
}
