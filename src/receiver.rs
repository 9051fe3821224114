//! Classifier Receiver: drain bursts from one RX queue, classify each frame
//! by (EtherType, protocol/next-header, magic), and timestamp it at the
//! earliest possible point after arrival.
//!
//! Grounded in `receivePdv` (`original_source/pdv.c`): a polling loop that
//! runs until a fixed deadline past the sender's finish, not until the
//! frame count is reached, because frames can be lost.

use crate::error::{PdvError, Side};
use crate::frame;
use crate::portio::{Clock, PacketPort};

/// Outcome of classifying one received buffer.
enum Classification {
    /// A valid foreground or background test frame for this run, with its
    /// sequence counter.
    TestFrame(u64),
    /// Not one of our test frames (wrong EtherType, protocol, or missing
    /// magic): silently discarded, as real traffic on the wire might not be
    /// ours (spec §4.4 "Classification").
    NotOurs,
}

fn classify(buf: &[u8]) -> Classification {
    if buf.len() < frame::ETH_LEN + 2 {
        return Classification::NotOurs;
    }
    let ethertype = u16::from_be_bytes([buf[12], buf[13]]);

    match ethertype {
        0x0800 => classify_v4(buf),
        0x86DD => classify_v6(buf),
        _ => Classification::NotOurs,
    }
}

fn classify_v4(buf: &[u8]) -> Classification {
    if buf.len() < frame::IPV4_PAYLOAD_OFFSET + 16 {
        return Classification::NotOurs;
    }
    if buf[frame::IPV4_PROTOCOL_OFFSET] != crate::Protocol::Udp as u8 {
        return Classification::NotOurs;
    }
    if &buf[frame::IPV4_PAYLOAD_OFFSET..frame::IPV4_PAYLOAD_OFFSET + 8] != &frame::MAGIC[..] {
        return Classification::NotOurs;
    }
    let counter = u64::from_ne_bytes(
        buf[frame::IPV4_COUNTER_OFFSET..frame::IPV4_COUNTER_OFFSET + 8]
            .try_into()
            .unwrap(),
    );
    Classification::TestFrame(counter)
}

fn classify_v6(buf: &[u8]) -> Classification {
    if buf.len() < frame::IPV6_PAYLOAD_OFFSET + 16 {
        return Classification::NotOurs;
    }
    if buf[frame::IPV6_NEXT_HEADER_OFFSET] != crate::Protocol::Udp as u8 {
        return Classification::NotOurs;
    }
    if &buf[frame::IPV6_PAYLOAD_OFFSET..frame::IPV6_PAYLOAD_OFFSET + 8] != &frame::MAGIC[..] {
        return Classification::NotOurs;
    }
    let counter = u64::from_ne_bytes(
        buf[frame::IPV6_COUNTER_OFFSET..frame::IPV6_COUNTER_OFFSET + 8]
            .try_into()
            .unwrap(),
    );
    Classification::TestFrame(counter)
}

/// Drain `port` until `finish_tsc` (the sender's scheduled finish time plus
/// a grace window, per spec §4.4), timestamping every recognized test frame
/// as early as possible — right after it classifies, not once for the whole
/// burst it arrived in.
///
/// Returns a dense `receive_ts` array indexed by counter, `0` where no frame
/// arrived (spec §3 "Timestamp arrays": an all-zero entry becomes a lost
/// frame in the evaluator). Fails fatally if a frame's counter is
/// `>= num_frames`, since that would be an out-of-bounds write.
pub fn run_receiver(
    port: &dyn PacketPort,
    clock: &dyn Clock,
    finish_tsc: u64,
    num_frames: u64,
    side: Side,
) -> Result<Vec<u64>, PdvError> {
    let mut receive_ts = vec![0_u64; num_frames as usize];
    let mut received = 0_u64;

    const BURST_SIZE: usize = 32;

    loop {
        let bufs = port.rx_burst(0, BURST_SIZE);
        for buf in &bufs {
            match classify(buf) {
                Classification::TestFrame(counter) => {
                    // Timestamp as soon as the frame is recognized as ours,
                    // not once for the whole burst (spec §4.4 step 1).
                    let now = clock.now_cycles();
                    if counter >= num_frames {
                        return Err(PdvError::ProtocolViolation {
                            side,
                            counter,
                            num_frames,
                        });
                    }
                    receive_ts[counter as usize] = now;
                    received += 1;
                }
                Classification::NotOurs => {}
            }
        }

        if clock.now_cycles() >= finish_tsc {
            break;
        }
    }

    tracing::info!(%side, received, num_frames, "receiver finished");

    Ok(receive_ts)
}
