//! Rate-gate pacing: busy-spin until the emission deadline for frame `s`,
//! per spec §4.3 step 6.
//!
//! Kept as a tiny standalone function (rather than inlined into
//! [`crate::sender`]) so the deadline arithmetic can be unit-tested without
//! spinning for real wall-clock time, by driving a [`crate::portio::FakeClock`].

use crate::portio::Clock;

/// Deadline, in cycles, for emitting frame `s` given the run's `start_tsc`,
/// `hz`, and `frame_rate`.
pub fn emission_deadline(start_tsc: u64, s: u64, hz: u64, frame_rate: u32) -> u64 {
    start_tsc + (s * hz) / frame_rate as u64
}

/// Busy-spin on `clock` until its cycle count reaches `deadline`. This is a
/// deliberate, uninterruptible spin: spec §5 requires the sender own its
/// core with no suspension points in the hot loop.
#[inline]
pub fn spin_until(clock: &dyn Clock, deadline: u64) {
    while clock.now_cycles() < deadline {
        std::hint::spin_loop();
    }
}
