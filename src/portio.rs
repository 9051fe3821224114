//! The external I/O collaborators spec.md treats as out of the core's
//! scope: a poll-mode packet I/O interface and a monotonic hardware cycle
//! counter. This module defines the trait boundary the rest of the engine
//! is generic over, plus a `crossbeam_channel`-backed loopback test double
//! used by the integration tests in [`crate::conductor`].

use std::sync::Arc;

/// An owned packet buffer. `free()` in spec.md's external interface is
/// implicit here: Rust's ownership means the buffer is returned to the
/// allocator (or simply dropped) when it goes out of scope, so
/// `PacketPort` has no explicit `free` method (see DESIGN.md).
pub type PortBuf = Vec<u8>;

/// A poll-mode packet I/O port: `alloc`/`tx_burst`/`rx_burst`, matching
/// spec.md §6's External I/O Dependency. A production implementation would
/// wrap a DPDK-style poll-mode driver; [`ChannelPort`] is a software
/// loopback used for tests.
pub trait PacketPort: Send + Sync {
    /// Allocate a new, zeroed buffer sized to hold one frame.
    fn alloc(&self) -> PortBuf;

    /// Attempt to enqueue up to `bufs.len()` buffers for transmission on
    /// `queue`. Returns the number actually accepted; callers must busy-retry
    /// with the remainder (spec §4.3 step 7).
    fn tx_burst(&self, queue: u16, bufs: &mut Vec<PortBuf>) -> usize;

    /// Drain up to `max` received buffers from `queue`. May return fewer
    /// than `max`, including zero.
    fn rx_burst(&self, queue: u16, max: usize) -> Vec<PortBuf>;
}

/// A monotonic hardware cycle counter with known frequency, matching
/// spec.md §6's `tsc()`/`hz`.
pub trait Clock: Send + Sync {
    /// Current cycle count. Must be non-decreasing within one core's
    /// lifetime (spec.md §3 invariant 1).
    fn now_cycles(&self) -> u64;

    /// Cycles per second.
    fn hz(&self) -> u64;
}

/// Production clock backed by `quanta`'s calibrated TSC (x86_64) or
/// monotonic-clock fallback on other architectures — the same raw-cycle /
/// calibrated-frequency pairing DPDK's `rte_rdtsc`/`rte_get_tsc_hz` expose.
pub struct TscClock {
    clock: quanta::Clock,
}

impl TscClock {
    /// Calibrate a new clock. Calibration briefly measures the relationship
    /// between the raw counter and wall time; do this once at startup.
    pub fn new() -> Self {
        TscClock {
            clock: quanta::Clock::new(),
        }
    }
}

impl Default for TscClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TscClock {
    fn now_cycles(&self) -> u64 {
        self.clock.raw()
    }

    fn hz(&self) -> u64 {
        // quanta calibrates raw-counter-ticks-per-wall-time internally;
        // derive cycles/second by converting a large, fixed tick delta.
        const PROBE_TICKS: u64 = 1_000_000_000;
        let elapsed = self.clock.delta(0, PROBE_TICKS);
        let nanos = elapsed.as_nanos().max(1);
        ((PROBE_TICKS as u128 * 1_000_000_000u128) / nanos) as u64
    }
}

/// A software loopback packet port built on bounded MPMC channels, used by
/// integration tests to exercise sender -> receiver -> evaluator without
/// real hardware network I/O.
pub struct ChannelPort {
    tx: crossbeam_channel::Sender<PortBuf>,
    rx: crossbeam_channel::Receiver<PortBuf>,
}

impl ChannelPort {
    /// Build a connected pair: frames sent on `a`'s TX queue arrive on `b`'s
    /// RX queue, and vice versa.
    pub fn pair(capacity: usize) -> (Arc<ChannelPort>, Arc<ChannelPort>) {
        let (tx_ab, rx_ab) = crossbeam_channel::bounded(capacity);
        let (tx_ba, rx_ba) = crossbeam_channel::bounded(capacity);
        (
            Arc::new(ChannelPort { tx: tx_ab, rx: rx_ba }),
            Arc::new(ChannelPort { tx: tx_ba, rx: rx_ab }),
        )
    }
}

impl PacketPort for ChannelPort {
    fn alloc(&self) -> PortBuf {
        Vec::new()
    }

    fn tx_burst(&self, _queue: u16, bufs: &mut Vec<PortBuf>) -> usize {
        let mut accepted = 0;
        while let Some(buf) = bufs.first() {
            if self.tx.try_send(buf.clone()).is_ok() {
                bufs.remove(0);
                accepted += 1;
            } else {
                break;
            }
        }
        accepted
    }

    fn rx_burst(&self, _queue: u16, max: usize) -> Vec<PortBuf> {
        let mut out = Vec::with_capacity(max);
        for _ in 0..max {
            match self.rx.try_recv() {
                Ok(buf) => out.push(buf),
                Err(_) => break,
            }
        }
        out
    }
}

/// A fake clock for deterministic unit tests of pacing logic: cycles advance
/// only when explicitly told to.
pub struct FakeClock {
    cycles: std::sync::atomic::AtomicU64,
    hz: u64,
}

impl FakeClock {
    /// Build a fake clock starting at cycle 0 with the given frequency.
    pub fn new(hz: u64) -> Self {
        FakeClock {
            cycles: std::sync::atomic::AtomicU64::new(0),
            hz,
        }
    }

    /// Advance the fake clock by `delta` cycles.
    pub fn advance(&self, delta: u64) {
        self.cycles.fetch_add(delta, std::sync::atomic::Ordering::SeqCst);
    }

    /// Jump the fake clock directly to `cycles`.
    pub fn set(&self, cycles: u64) {
        self.cycles.store(cycles, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_cycles(&self) -> u64 {
        self.cycles.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn hz(&self) -> u64 {
        self.hz
    }
}

/// Packet pool sizing: the teacher's `Pdv::senderPoolSize` multiplies the
/// throughput-mode pool size by `N` since every rotation copy is held
/// concurrently (spec §5 Resource policy, §9 Template ownership).
pub fn pdv_pool_size(base_pool_size: usize, rotation_depth: usize) -> usize {
    base_pool_size * rotation_depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_port_round_trips_one_frame() {
        let (a, b) = ChannelPort::pair(8);
        let mut bufs = vec![vec![1, 2, 3, 4]];
        let accepted = a.tx_burst(0, &mut bufs);
        assert_eq!(accepted, 1);
        assert!(bufs.is_empty());

        let received = b.rx_burst(0, 8);
        assert_eq!(received, vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn fake_clock_advances_monotonically() {
        let clock = FakeClock::new(1_000_000_000);
        assert_eq!(clock.now_cycles(), 0);
        clock.advance(500);
        assert_eq!(clock.now_cycles(), 500);
        clock.set(1000);
        assert_eq!(clock.now_cycles(), 1000);
    }

    #[test]
    fn pdv_pool_size_scales_by_rotation_depth() {
        assert_eq!(pdv_pool_size(100, 4), 400);
    }
}
