//! Error kinds for the tester, grouped per the run's failure taxonomy.
//!
//! Configuration errors are rejected before any core launches. Resource
//! exhaustion, protocol violations, and temporal failures are fatal once a
//! run is underway and abort the owning sender/receiver thread. Negative
//! latencies and lost frames are not represented here at all: they are
//! benign, expected outcomes of a run and are reported as data by
//! [`crate::evaluator`], not as errors.

use thiserror::Error;

/// Side of a bidirectional run a fatal condition occurred on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Left-to-right direction
    Forward,
    /// Right-to-left direction
    Reverse,
}

impl core::fmt::Display for Side {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Side::Forward => write!(f, "Forward"),
            Side::Reverse => write!(f, "Reverse"),
        }
    }
}

/// Top-level error type for configuration, setup, and run failures.
#[derive(Error, Debug)]
pub enum PdvError {
    /// Rejected before any core launches; message mirrors the original
    /// command-line validation text.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A buffer or timestamp array allocation failed.
    #[error("{side}: resource exhaustion: {detail}")]
    ResourceExhaustion {
        /// side of the run the allocation was for
        side: Side,
        /// what failed to allocate
        detail: String,
    },

    /// A received frame carried a counter `>= frames_to_send`; fatal because
    /// writing it would be an out-of-bounds access into `receive_ts`.
    #[error("{side}: protocol violation: frame counter {counter} >= declared frame count {num_frames}")]
    ProtocolViolation {
        /// side of the run the violation was observed on
        side: Side,
        /// offending counter value
        counter: u64,
        /// declared number of frames for the run
        num_frames: u64,
    },

    /// The sender's wall-clock send time exceeded `duration * TOLERANCE`.
    #[error("{side}: sending took {elapsed_seconds:.6}s, exceeding the {limit_seconds:.6}s limit; test is invalid")]
    TemporalFailure {
        /// side of the run that overran
        side: Side,
        /// observed wall time, in seconds
        elapsed_seconds: f64,
        /// tolerated wall time, in seconds
        limit_seconds: f64,
    },
}
