//! PDV Evaluator: turn a `(send_ts, receive_ts)` pair into a latency
//! distribution and an RFC 8219 §12 / RFC 5481 PDV report.
//!
//! Grounded in `evaluatePdv` (`original_source/pdv.c`): two modes selected
//! by whether `frame_timeout` is zero.
//!
//! Both modes build the same signed `latency` array first: a lost frame
//! (`receive_ts[i] == 0`) gets `latency[i] = penalty_tsc` and increments
//! `frames_lost`; an arrived frame gets `receive_ts[i] - send_ts[i]`,
//! clipped to 0 (and `num_corrected` incremented) if negative.
//!
//! - **Late-frame counting** (`frame_timeout > 0`): count
//!   `frames_received = |{ i : latency[i] <= frame_timeout_tsc }|` and report
//!   that alongside `frames_lost`. No sort, no percentiles.
//! - **Full PDV** (`frame_timeout == 0`): sort `latency` (including the
//!   penalty-substituted lost slots), then report Dmin, Dmax, D99.9, and
//!   PDV = D99.9 - Dmin.

use serde::{Deserialize, Serialize};

/// Evaluation result for one direction, shaped by which of spec.md §4.5's
/// two modes produced it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum EvaluationReport {
    /// `frame_timeout > 0`: late-frame counting mode.
    LateFrameCounting {
        /// Frames whose latency (including the penalty substituted for
        /// physically lost frames) was at or under `frame_timeout`.
        frames_received: u64,
        /// Frames never received at all (`receive_ts[i] == 0`).
        frames_lost: u64,
        /// Frames whose raw `receive_ts - send_ts` was negative, clipped to
        /// zero (spec §4.5 "Negative delay").
        num_corrected: u64,
        /// Total frames this run was configured to send.
        frames_sent: u64,
    },
    /// `frame_timeout == 0`: full PDV mode.
    FullPdv {
        /// Minimum one-way delay observed, in milliseconds.
        dmin_ms: f64,
        /// Maximum one-way delay observed, in milliseconds.
        dmax_ms: f64,
        /// 99.9th-percentile one-way delay, in milliseconds (RFC 5481 D99.9).
        d999_ms: f64,
        /// Packet delay variation: `d999_ms - dmin_ms`.
        pdv_ms: f64,
        /// Frames never received at all (`receive_ts[i] == 0`); their
        /// latency is substituted with `penalty` before entering the sort.
        frames_lost: u64,
        /// Frames whose raw `receive_ts - send_ts` was negative, clipped to
        /// zero (spec §4.5 "Negative delay").
        num_corrected: u64,
        /// Total frames this run was configured to send.
        frames_sent: u64,
    },
}

/// Build a report from dense `send_ts`/`receive_ts` arrays (index == frame
/// counter, `0` in `receive_ts` meaning "never arrived"), the run's cycle
/// frequency, `frame_timeout_ms` (`0` selects full-PDV mode), and
/// `penalty_ms` (the latency, in milliseconds, reported for a physically
/// lost frame; conventionally `1000*duration + global_timeout`).
pub fn evaluate(send_ts: &[u64], receive_ts: &[u64], hz: u64, frame_timeout_ms: u64, penalty_ms: u64) -> EvaluationReport {
    assert_eq!(send_ts.len(), receive_ts.len(), "timestamp arrays must be the same length");
    let frames_sent = send_ts.len() as u64;
    let penalty_cycles = (penalty_ms as u128 * hz as u128 / 1000) as u64;

    let mut latencies = Vec::with_capacity(send_ts.len());
    let mut frames_lost = 0_u64;
    let mut num_corrected = 0_u64;

    for (&sent, &received) in send_ts.iter().zip(receive_ts.iter()) {
        if received == 0 {
            frames_lost += 1;
            latencies.push(penalty_cycles);
            continue;
        }
        let raw = received as i128 - sent as i128;
        let raw = if raw < 0 {
            num_corrected += 1;
            0_u64
        } else {
            raw as u64
        };
        latencies.push(raw);
    }

    if frame_timeout_ms != 0 {
        let timeout_cycles = (frame_timeout_ms as u128 * hz as u128 / 1000) as u64;
        let frames_received = latencies.iter().filter(|&&l| l <= timeout_cycles).count() as u64;
        return EvaluationReport::LateFrameCounting {
            frames_received,
            frames_lost,
            num_corrected,
            frames_sent,
        };
    }

    latencies.sort_unstable();

    let dmin = latencies[0];
    let dmax = latencies[latencies.len() - 1];
    // D99.9 index per RFC 5481: the ceiling of 99.9% of the sample count,
    // 1-indexed, converted to a 0-indexed array position.
    let rank = ((latencies.len() as f64) * 0.999).ceil() as usize;
    let rank = rank.max(1).min(latencies.len());
    let d999 = latencies[rank - 1];

    let to_ms = |cycles: u64| 1000.0 * cycles as f64 / hz as f64;

    EvaluationReport::FullPdv {
        dmin_ms: to_ms(dmin),
        dmax_ms: to_ms(dmax),
        d999_ms: to_ms(d999),
        pdv_ms: to_ms(d999 - dmin),
        frames_lost,
        num_corrected,
        frames_sent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HZ: u64 = 1_000_000_000; // 1 cycle == 1 ns, for readable test fixtures

    #[test]
    fn identical_send_and_receive_gives_zero_pdv() {
        let send_ts: Vec<u64> = (0..1000).map(|i| i * 1_000_000).collect();
        let receive_ts = send_ts.clone();
        let report = evaluate(&send_ts, &receive_ts, HZ, 0, 10_000);
        match report {
            EvaluationReport::FullPdv { dmin_ms, dmax_ms, pdv_ms, frames_lost, num_corrected, .. } => {
                assert_eq!(dmin_ms, 0.0);
                assert_eq!(dmax_ms, 0.0);
                assert_eq!(pdv_ms, 0.0);
                assert_eq!(frames_lost, 0);
                assert_eq!(num_corrected, 0);
            }
            EvaluationReport::LateFrameCounting { .. } => panic!("expected full PDV mode"),
        }
    }

    #[test]
    fn lost_frames_are_counted_and_excluded_from_latency() {
        let send_ts: Vec<u64> = (0..10).map(|i| i * 1_000_000).collect();
        let mut receive_ts: Vec<u64> = send_ts.iter().map(|&s| s + 500_000).collect();
        receive_ts[3] = 0;
        receive_ts[7] = 0;

        let report = evaluate(&send_ts, &receive_ts, HZ, 0, 10_000);
        match report {
            EvaluationReport::FullPdv { frames_lost, frames_sent, .. } => {
                assert_eq!(frames_lost, 2);
                assert_eq!(frames_sent, 10);
            }
            EvaluationReport::LateFrameCounting { .. } => panic!("expected full PDV mode"),
        }
    }

    #[test]
    fn negative_delay_is_clipped_and_counted() {
        let send_ts = vec![1_000_000_u64; 4];
        let receive_ts = vec![900_000_u64, 1_100_000, 1_000_000, 950_000];
        let report = evaluate(&send_ts, &receive_ts, HZ, 0, 10_000);
        match report {
            EvaluationReport::FullPdv { num_corrected, dmin_ms, .. } => {
                assert_eq!(num_corrected, 2);
                assert_eq!(dmin_ms, 0.0);
            }
            EvaluationReport::LateFrameCounting { .. } => panic!("expected full PDV mode"),
        }
    }

    #[test]
    fn d999_uses_ceiling_rank_over_sorted_latencies() {
        // 1000 samples, ramping 1..=1000 ms; D99.9 should land at rank
        // ceil(1000*0.999) = 999, i.e. value 999 ms.
        let hz = HZ;
        let send_ts: Vec<u64> = vec![0; 1000];
        let receive_ts: Vec<u64> = (1..=1000u64).map(|ms| ms * hz / 1000).collect();
        let report = evaluate(&send_ts, &receive_ts, hz, 0, 10_000);
        match report {
            EvaluationReport::FullPdv { d999_ms, dmax_ms, dmin_ms, pdv_ms, .. } => {
                assert!((d999_ms - 999.0).abs() < 1e-6);
                assert!((dmax_ms - 1000.0).abs() < 1e-6);
                assert!((dmin_ms - 1.0).abs() < 1e-6);
                assert!((pdv_ms - 998.0).abs() < 1e-6);
            }
            EvaluationReport::LateFrameCounting { .. } => panic!("expected full PDV mode"),
        }
    }

    /// spec.md §8 Scenario 2: half the frames delayed past the timeout but
    /// all physically arriving must show up as *not received*, never as
    /// *lost* — lost means the frame never arrived at all.
    #[test]
    fn late_frame_mode_does_not_count_late_but_arrived_frames_as_lost() {
        let send_ts = vec![0_u64; 2000];
        let receive_ts: Vec<u64> = (0..2000)
            .map(|i| if i % 2 == 0 { HZ / 1000 } else { 100 * HZ / 1000 })
            .collect();
        let report = evaluate(&send_ts, &receive_ts, HZ, 50, 10_000);
        match report {
            EvaluationReport::LateFrameCounting { frames_received, frames_lost, .. } => {
                assert_eq!(frames_received, 1000);
                assert_eq!(frames_lost, 0);
            }
            EvaluationReport::FullPdv { .. } => panic!("expected late-frame counting mode"),
        }
    }

    #[test]
    fn late_frame_mode_still_counts_physically_lost_frames() {
        let send_ts = vec![0_u64; 3];
        // delays: 1ms, 5ms, physically lost (penalty far beyond timeout)
        let receive_ts = vec![HZ / 1000, 5 * HZ / 1000, 0];
        let report = evaluate(&send_ts, &receive_ts, HZ, 10, 10_000);
        match report {
            EvaluationReport::LateFrameCounting { frames_received, frames_lost, frames_sent, .. } => {
                assert_eq!(frames_received, 2);
                assert_eq!(frames_lost, 1);
                assert_eq!(frames_sent, 3);
            }
            EvaluationReport::FullPdv { .. } => panic!("expected late-frame counting mode"),
        }
    }

    #[test]
    fn all_frames_lost_yields_penalty_distribution() {
        let send_ts = vec![0_u64; 5];
        let receive_ts = vec![0_u64; 5];
        let report = evaluate(&send_ts, &receive_ts, HZ, 0, 42);
        match report {
            EvaluationReport::FullPdv { frames_lost, dmin_ms, pdv_ms, .. } => {
                assert_eq!(frames_lost, 5);
                assert!((dmin_ms - 42.0).abs() < 1e-6);
                assert_eq!(pdv_ms, 0.0);
            }
            EvaluationReport::LateFrameCounting { .. } => panic!("expected full PDV mode"),
        }
    }
}
